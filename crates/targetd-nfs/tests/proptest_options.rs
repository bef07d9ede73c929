//! Property-based tests for the export option model.

use proptest::prelude::*;

use targetd_nfs::exports_file::parse_export_line;
use targetd_nfs::option_parser::{merge_options, parse_option_string, serialize_options};
use targetd_nfs::options::{
    validate_flags, ExportFlags, KeyValueOptions, OptionKey, OptionValue, CONFLICTING_FLAGS,
    FLAG_TABLE,
};

/// Flag sets holding at most one member of every conflicting pair.
fn conflict_free_flags() -> impl Strategy<Value = ExportFlags> {
    any::<u32>().prop_map(|raw| {
        let mut flags = ExportFlags::empty();
        for (i, (_, flag)) in FLAG_TABLE.iter().enumerate() {
            if raw & (1 << i) != 0 {
                flags.insert(*flag);
            }
        }
        for (a, b, _) in CONFLICTING_FLAGS.iter() {
            if flags.contains(*a | *b) {
                flags.remove(*b);
            }
        }
        flags
    })
}

fn any_key_values() -> impl Strategy<Value = KeyValueOptions> {
    (
        proptest::option::of(0i64..70000),
        proptest::option::of(0i64..70000),
        proptest::option::of(prop_oneof![
            Just("sys"),
            Just("krb5"),
            Just("krb5i"),
            Just("krb5p")
        ]),
        proptest::option::of("[0-9a-f]{1,8}"),
    )
        .prop_map(|(uid, gid, sec, fsid)| {
            let mut kv = KeyValueOptions::new();
            if let Some(uid) = uid {
                kv.insert(OptionKey::AnonUid, OptionValue::Integer(uid));
            }
            if let Some(gid) = gid {
                kv.insert(OptionKey::AnonGid, OptionValue::Integer(gid));
            }
            if let Some(sec) = sec {
                kv.insert(OptionKey::Sec, OptionValue::Text(sec.to_string()));
            }
            if let Some(fsid) = fsid {
                kv.insert(OptionKey::Fsid, OptionValue::Text(fsid));
            }
            kv
        })
}

proptest! {
    #[test]
    fn test_validate_is_identity_without_conflicts(flags in conflict_free_flags()) {
        prop_assert_eq!(validate_flags(flags).unwrap(), flags);
    }

    #[test]
    fn test_every_conflicting_pair_rejected(
        flags in conflict_free_flags(),
        pair in 0usize..CONFLICTING_FLAGS.len(),
    ) {
        let (a, b, message) = CONFLICTING_FLAGS[pair];
        let err = validate_flags(flags | a | b).unwrap_err();
        prop_assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_option_text_roundtrip(flags in conflict_free_flags(), kv in any_key_values()) {
        let text = serialize_options(flags, &kv);
        let (parsed_flags, parsed_kv) = parse_option_string(&text).unwrap();
        prop_assert_eq!(parsed_flags, flags);
        prop_assert_eq!(parsed_kv, kv);
    }

    #[test]
    fn test_bits_roundtrip(flags in conflict_free_flags()) {
        prop_assert_eq!(ExportFlags::from_bits(flags.bits()).unwrap(), flags);
    }

    #[test]
    fn test_merge_specific_side_wins(
        global in conflict_free_flags(),
        specific in conflict_free_flags(),
    ) {
        let (merged, _) = merge_options(
            &serialize_options(global, &KeyValueOptions::new()),
            Some(&serialize_options(specific, &KeyValueOptions::new())),
        )
        .unwrap();

        prop_assert!(merged.contains(specific));
        prop_assert!(validate_flags(merged).is_ok());
        for (a, b, _) in CONFLICTING_FLAGS.iter() {
            if specific.intersects(*a | *b) {
                prop_assert_eq!(merged & (*a | *b), specific & (*a | *b));
            }
        }
    }

    #[test]
    fn test_export_line_roundtrip(
        flags in conflict_free_flags(),
        kv in any_key_values(),
        host in "[a-z][a-z0-9.]{0,15}",
        path in "/[a-zA-Z0-9_ \t\"#'\\\\é()]{1,20}",
    ) {
        let export = targetd_nfs::Export::with_options(&host, &path, flags, kv).unwrap();
        let parsed = parse_export_line(&export.to_line()).unwrap();

        prop_assert_eq!(parsed.len(), 1);
        prop_assert_eq!(&parsed[0], &export);
        prop_assert_eq!(parsed[0].options(), export.options());
    }
}
