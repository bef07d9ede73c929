//! Conversion between comma separated option text and the option model

use crate::error::{NfsError, Result};
use crate::options::{key_value, validate_flags, ExportFlags, KeyValueOptions, CONFLICTING_FLAGS};

/// Parses an option list such as `rw,sync,anonuid=1000`.
///
/// Conflicting flags are not rejected here; callers validate or merge.
pub fn parse_option_string(text: &str) -> Result<(ExportFlags, KeyValueOptions)> {
    let mut flags = ExportFlags::empty();
    let mut key_values = KeyValueOptions::new();

    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some((key, value)) = token.split_once('=') {
            let (key, value) = key_value(key.trim(), value.trim())?;
            key_values.insert(key, value);
        } else {
            let flag = ExportFlags::from_name(token).ok_or_else(|| NfsError::UnknownFlag {
                name: token.to_string(),
            })?;
            flags.insert(flag);
        }
    }

    Ok((flags, key_values))
}

/// Merges a line's global options with one host's specific options.
///
/// Each side must be valid on its own. For every conflicting pair, a member
/// set on the specific side clears its opposite from the union. Specific
/// key-values replace global ones with the same key. Without specific text
/// the global parse is returned as is.
pub fn merge_options(
    global: &str,
    specific: Option<&str>,
) -> Result<(ExportFlags, KeyValueOptions)> {
    let (global_flags, mut key_values) = parse_option_string(global)?;

    let specific = match specific {
        Some(s) => s,
        None => return Ok((global_flags, key_values)),
    };

    let (specific_flags, specific_pairs) = parse_option_string(specific)?;

    validate_flags(global_flags)?;
    validate_flags(specific_flags)?;

    let mut combined = global_flags | specific_flags;
    for (a, b, _) in CONFLICTING_FLAGS.iter() {
        if specific_flags.intersects(*a) {
            combined.remove(*b);
        }
        if specific_flags.intersects(*b) {
            combined.remove(*a);
        }
    }

    key_values.extend(specific_pairs);
    Ok((combined, key_values))
}

/// Renders flags and key-values as an option list (`rw,sync,anonuid=1000`).
pub fn serialize_options(flags: ExportFlags, key_values: &KeyValueOptions) -> String {
    flags
        .names()
        .into_iter()
        .map(str::to_string)
        .chain(key_values.iter().map(|(k, v)| format!("{}={}", k, v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{OptionKey, OptionValue};

    #[test]
    fn test_parse_empty() {
        let (flags, kv) = parse_option_string("").unwrap();
        assert!(flags.is_empty());
        assert!(kv.is_empty());
    }

    #[test]
    fn test_parse_flags_and_pairs() {
        let (flags, kv) = parse_option_string("rw,sync,anonuid=1000,sec=krb5").unwrap();
        assert_eq!(flags, ExportFlags::RW | ExportFlags::SYNC);
        assert_eq!(kv.get(&OptionKey::AnonUid), Some(&OptionValue::Integer(1000)));
        assert_eq!(
            kv.get(&OptionKey::Sec),
            Some(&OptionValue::Text("krb5".to_string()))
        );
    }

    #[test]
    fn test_parse_unknown_flag() {
        let err = parse_option_string("rw,turbo").unwrap_err();
        assert!(matches!(err, NfsError::UnknownFlag { ref name } if name == "turbo"));
    }

    #[test]
    fn test_parse_unknown_key() {
        assert!(matches!(
            parse_option_string("color=red").unwrap_err(),
            NfsError::UnknownOptionKey { .. }
        ));
    }

    #[test]
    fn test_parse_does_not_validate_conflicts() {
        let (flags, _) = parse_option_string("rw,ro").unwrap();
        assert!(flags.contains(ExportFlags::RW | ExportFlags::RO));
    }

    #[test]
    fn test_merge_specific_overrides_global() {
        let (flags, _) = merge_options("rw", Some("ro")).unwrap();
        assert!(flags.contains(ExportFlags::RO));
        assert!(!flags.contains(ExportFlags::RW));
    }

    #[test]
    fn test_merge_without_specific_is_global_parse() {
        let merged = merge_options("ro,sync", None).unwrap();
        assert_eq!(merged, parse_option_string("ro,sync").unwrap());
    }

    #[test]
    fn test_merge_keeps_unrelated_global_flags() {
        let (flags, _) = merge_options("ro,sync", Some("rw")).unwrap();
        assert_eq!(flags, ExportFlags::RW | ExportFlags::SYNC);
    }

    #[test]
    fn test_merge_every_pair_overrides() {
        for (a, b, _) in CONFLICTING_FLAGS.iter() {
            let global = a.names().join(",");
            let specific = b.names().join(",");
            let (flags, _) = merge_options(&global, Some(&specific)).unwrap();
            assert!(flags.contains(*b));
            assert!(!flags.contains(*a));
        }
    }

    #[test]
    fn test_merge_rejects_invalid_side() {
        assert!(merge_options("rw,ro", Some("sync")).is_err());
        assert!(merge_options("sync", Some("hide,nohide")).is_err());
    }

    #[test]
    fn test_merge_key_values_specific_wins() {
        let (_, kv) = merge_options("anonuid=1,sec=sys", Some("anonuid=2")).unwrap();
        assert_eq!(kv.get(&OptionKey::AnonUid), Some(&OptionValue::Integer(2)));
        assert_eq!(
            kv.get(&OptionKey::Sec),
            Some(&OptionValue::Text("sys".to_string()))
        );
    }

    #[test]
    fn test_serialize() {
        let (flags, kv) = parse_option_string("sync,rw,fsid=7").unwrap();
        assert_eq!(serialize_options(flags, &kv), "rw,sync,fsid=7");
        assert_eq!(
            serialize_options(ExportFlags::empty(), &KeyValueOptions::new()),
            ""
        );
    }
}
