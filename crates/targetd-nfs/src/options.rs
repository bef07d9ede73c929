//! NFS export option model: boolean flags and typed key-value options.
//!
//! Both option domains are closed and table driven. Adding a boolean option
//! is one row in [`FLAG_TABLE`]; adding a key-value option is one variant of
//! [`OptionKey`] plus one row in its key table.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

use crate::error::{NfsError, Result};

/// Set of boolean export options, stored as a bitmask.
///
/// The bit values are stable and shared with RPC callers that pass raw
/// masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportFlags(u32);

impl ExportFlags {
    /// `secure`: requests must originate from a port below 1024
    pub const SECURE: Self = Self(0x0000_0001);
    /// `rw`: allow reads and writes
    pub const RW: Self = Self(0x0000_0002);
    /// `ro`: allow only reads
    pub const RO: Self = Self(0x0000_0004);
    /// `sync`: reply only after changes are committed
    pub const SYNC: Self = Self(0x0000_0008);
    /// `async`: reply before changes are committed
    pub const ASYNC: Self = Self(0x0000_0010);
    /// `no_wdelay`: do not delay writes to batch them
    pub const NO_WDELAY: Self = Self(0x0000_0020);
    /// `nohide`: expose filesystems mounted below the export
    pub const NOHIDE: Self = Self(0x0000_0040);
    /// `crossmnt`: clients may cross into child mounts
    pub const CROSSMNT: Self = Self(0x0000_0080);
    /// `no_subtree_check`: disable subtree checking
    pub const NO_SUBTREE_CHECK: Self = Self(0x0000_0100);
    /// `insecure_locks`: skip authorization of lock requests
    pub const INSECURE_LOCKS: Self = Self(0x0000_0200);
    /// `root_squash`: map uid/gid 0 to the anonymous ids
    pub const ROOT_SQUASH: Self = Self(0x0000_0400);
    /// `no_root_squash`: trust root on the client
    pub const NO_ROOT_SQUASH: Self = Self(0x0000_0800);
    /// `all_squash`: map every uid/gid to the anonymous ids
    pub const ALL_SQUASH: Self = Self(0x0000_1000);
    /// `wdelay`: delay writes to batch them
    pub const WDELAY: Self = Self(0x0000_2000);
    /// `hide`: hide filesystems mounted below the export
    pub const HIDE: Self = Self(0x0000_4000);
    /// `insecure`: accept requests from any port
    pub const INSECURE: Self = Self(0x0000_8000);
    /// `no_all_squash`: keep client uids/gids
    pub const NO_ALL_SQUASH: Self = Self(0x0001_0000);

    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every known flag.
    pub fn all() -> Self {
        FLAG_TABLE
            .iter()
            .fold(Self::empty(), |acc, (_, flag)| acc | *flag)
    }

    /// Raw bitmask.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Builds a flag set from a raw mask, rejecting unknown bits.
    pub fn from_bits(bits: u32) -> Result<Self> {
        let unknown = bits & !Self::all().0;
        if unknown != 0 {
            return Err(NfsError::UnknownFlagBits { bits: unknown });
        }
        Ok(Self(bits))
    }

    /// Looks up a flag by its option name (`"rw"`, `"no_root_squash"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        FLAG_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, flag)| *flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`.
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when any bit of `other` is set in `self`.
    pub fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Option names of the set flags, in table order.
    pub fn names(&self) -> Vec<&'static str> {
        FLAG_TABLE
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl BitOr for ExportFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExportFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ExportFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for ExportFlags {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::all().0)
    }
}

impl fmt::Display for ExportFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(","))
    }
}

/// Boolean option names as they appear in exports(5) and `exportfs -v`.
pub const FLAG_TABLE: [(&str, ExportFlags); 17] = [
    ("secure", ExportFlags::SECURE),
    ("rw", ExportFlags::RW),
    ("ro", ExportFlags::RO),
    ("sync", ExportFlags::SYNC),
    ("async", ExportFlags::ASYNC),
    ("no_wdelay", ExportFlags::NO_WDELAY),
    ("nohide", ExportFlags::NOHIDE),
    ("crossmnt", ExportFlags::CROSSMNT),
    ("no_subtree_check", ExportFlags::NO_SUBTREE_CHECK),
    ("insecure_locks", ExportFlags::INSECURE_LOCKS),
    ("root_squash", ExportFlags::ROOT_SQUASH),
    ("all_squash", ExportFlags::ALL_SQUASH),
    ("wdelay", ExportFlags::WDELAY),
    ("hide", ExportFlags::HIDE),
    ("insecure", ExportFlags::INSECURE),
    ("no_root_squash", ExportFlags::NO_ROOT_SQUASH),
    ("no_all_squash", ExportFlags::NO_ALL_SQUASH),
];

/// Mutually exclusive flag pairs and the message reported when both are set.
pub const CONFLICTING_FLAGS: [(ExportFlags, ExportFlags, &str); 6] = [
    (ExportFlags::RW, ExportFlags::RO, "Both RO & RW set"),
    (
        ExportFlags::INSECURE,
        ExportFlags::SECURE,
        "Both INSECURE & SECURE set",
    ),
    (ExportFlags::SYNC, ExportFlags::ASYNC, "Both SYNC & ASYNC set"),
    (ExportFlags::HIDE, ExportFlags::NOHIDE, "Both HIDE & NOHIDE set"),
    (
        ExportFlags::WDELAY,
        ExportFlags::NO_WDELAY,
        "Both WDELAY & NO_WDELAY set",
    ),
    (
        ExportFlags::ROOT_SQUASH,
        ExportFlags::NO_ROOT_SQUASH,
        "Only one option of ROOT_SQUASH, NO_ROOT_SQUASH, can be specified",
    ),
];

/// Returns `flags` unchanged unless it holds both members of a conflicting pair.
pub fn validate_flags(flags: ExportFlags) -> Result<ExportFlags> {
    for (a, b, message) in CONFLICTING_FLAGS.iter() {
        if flags.contains(*a | *b) {
            return Err(NfsError::ConflictingFlags {
                message: message.to_string(),
            });
        }
    }
    Ok(flags)
}

/// Type a key-value option's value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
}

/// Key of a `key=value` export option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    Mountpoint,
    Mp,
    Fsid,
    Refer,
    Replicas,
    AnonUid,
    AnonGid,
    Sec,
}

static KEY_TABLE: [(&str, OptionKey, ValueKind); 8] = [
    ("mountpoint", OptionKey::Mountpoint, ValueKind::Text),
    ("mp", OptionKey::Mp, ValueKind::Text),
    // fsid takes a number, "root" or a uuid
    ("fsid", OptionKey::Fsid, ValueKind::Text),
    ("refer", OptionKey::Refer, ValueKind::Text),
    ("replicas", OptionKey::Replicas, ValueKind::Text),
    ("anonuid", OptionKey::AnonUid, ValueKind::Integer),
    ("anongid", OptionKey::AnonGid, ValueKind::Integer),
    ("sec", OptionKey::Sec, ValueKind::Text),
];

impl OptionKey {
    pub fn from_name(name: &str) -> Option<Self> {
        KEY_TABLE
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, key, _)| *key)
    }

    pub fn name(&self) -> &'static str {
        self.entry().0
    }

    pub fn value_kind(&self) -> ValueKind {
        self.entry().2
    }

    fn entry(&self) -> &'static (&'static str, OptionKey, ValueKind) {
        let index = match self {
            OptionKey::Mountpoint => 0,
            OptionKey::Mp => 1,
            OptionKey::Fsid => 2,
            OptionKey::Refer => 3,
            OptionKey::Replicas => 4,
            OptionKey::AnonUid => 5,
            OptionKey::AnonGid => 6,
            OptionKey::Sec => 7,
        };
        &KEY_TABLE[index]
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a `key=value` export option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Text(String),
    Integer(i64),
}

impl OptionValue {
    /// Parses `raw` according to the value kind of `key`.
    pub fn parse(key: OptionKey, raw: &str) -> Result<Self> {
        match key.value_kind() {
            ValueKind::Text => Ok(OptionValue::Text(raw.to_string())),
            ValueKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(OptionValue::Integer)
                .map_err(|_| NfsError::InvalidOptionValue {
                    key: key.name().to_string(),
                    value: raw.to_string(),
                }),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Text(s) => f.write_str(s),
            OptionValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

/// Typed key-value options, ordered by key.
pub type KeyValueOptions = BTreeMap<OptionKey, OptionValue>;

/// Validates one textual `key`/`value` pair.
pub fn key_value(key: &str, value: &str) -> Result<(OptionKey, OptionValue)> {
    let key = OptionKey::from_name(key).ok_or_else(|| NfsError::UnknownOptionKey {
        key: key.to_string(),
    })?;
    let value = OptionValue::parse(key, value)?;
    Ok((key, value))
}

/// Validates untyped key-value options; `None` or an empty map gives an empty set.
pub fn validate_key_values(raw: Option<&BTreeMap<String, String>>) -> Result<KeyValueOptions> {
    let mut out = KeyValueOptions::new();
    if let Some(raw) = raw {
        for (k, v) in raw {
            let (key, value) = key_value(k, v)?;
            out.insert(key, value);
        }
    }
    Ok(out)
}

/// Security flavours accepted for the `sec=` option.
pub fn security_options() -> &'static [&'static str] {
    &["sys", "krb5", "krb5i", "krb5p"]
}

/// Validated options of a single export.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportOptions {
    flags: ExportFlags,
    key_values: KeyValueOptions,
}

impl ExportOptions {
    /// Creates an option set, rejecting conflicting flags.
    pub fn new(flags: ExportFlags, key_values: KeyValueOptions) -> Result<Self> {
        let flags = validate_flags(flags)?;
        Ok(Self { flags, key_values })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> ExportFlags {
        self.flags
    }

    pub fn key_values(&self) -> &KeyValueOptions {
        &self.key_values
    }

    pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
        self.key_values.get(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.key_values.is_empty()
    }
}

impl fmt::Display for ExportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::option_parser::serialize_options(
            self.flags,
            &self.key_values,
        ))
    }
}
