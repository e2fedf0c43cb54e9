//! Property Flags - Per-property modifiers stored as a compact bit set

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A single named modifier, as written in configuration sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyFlag {
    /// Part of the primary key
    Primary,
    /// Must hold a non-empty value to pass model validation
    Required,
    /// Read-only once the record has been inserted
    NoUpdate,
    /// Null is an allowed value
    UseNull,
    /// Write-once: may only be set while empty
    WriteEmpty,
    /// Excluded from serialization output
    NoArrayOutput,
}

impl PropertyFlag {
    const ALL: [PropertyFlag; 6] = [
        PropertyFlag::Primary,
        PropertyFlag::Required,
        PropertyFlag::NoUpdate,
        PropertyFlag::UseNull,
        PropertyFlag::WriteEmpty,
        PropertyFlag::NoArrayOutput,
    ];

    fn bit(self) -> u8 {
        match self {
            PropertyFlag::Primary => 1,
            PropertyFlag::Required => 1 << 1,
            PropertyFlag::NoUpdate => 1 << 2,
            PropertyFlag::UseNull => 1 << 3,
            PropertyFlag::WriteEmpty => 1 << 4,
            PropertyFlag::NoArrayOutput => 1 << 5,
        }
    }
}

/// Bit set of [`PropertyFlag`]s
///
/// Serialized as the list of flag names so configuration files stay readable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<PropertyFlag>", into = "Vec<PropertyFlag>")]
pub struct PropertyFlags(u8);

impl PropertyFlags {
    pub const NONE: PropertyFlags = PropertyFlags(0);
    pub const PRIMARY: PropertyFlags = PropertyFlags(1);
    pub const REQUIRED: PropertyFlags = PropertyFlags(1 << 1);
    pub const NO_UPDATE: PropertyFlags = PropertyFlags(1 << 2);
    pub const USE_NULL: PropertyFlags = PropertyFlags(1 << 3);
    pub const WRITE_EMPTY: PropertyFlags = PropertyFlags(1 << 4);
    pub const NO_ARRAY_OUTPUT: PropertyFlags = PropertyFlags(1 << 5);

    pub fn contains(&self, other: PropertyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has(&self, flag: PropertyFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn insert(&mut self, other: PropertyFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: PropertyFlags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The individual flags set, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = PropertyFlag> + '_ {
        PropertyFlag::ALL.into_iter().filter(move |flag| self.has(*flag))
    }
}

impl From<PropertyFlag> for PropertyFlags {
    fn from(flag: PropertyFlag) -> Self {
        PropertyFlags(flag.bit())
    }
}

impl From<Vec<PropertyFlag>> for PropertyFlags {
    fn from(flags: Vec<PropertyFlag>) -> Self {
        flags
            .into_iter()
            .fold(PropertyFlags::NONE, |acc, flag| acc | flag.into())
    }
}

impl From<PropertyFlags> for Vec<PropertyFlag> {
    fn from(flags: PropertyFlags) -> Self {
        flags.iter().collect()
    }
}

impl BitOr for PropertyFlags {
    type Output = PropertyFlags;

    fn bitor(self, rhs: PropertyFlags) -> PropertyFlags {
        PropertyFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for PropertyFlags {
    fn bitor_assign(&mut self, rhs: PropertyFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PropertyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_operations() {
        let mut flags = PropertyFlags::PRIMARY | PropertyFlags::REQUIRED;
        assert!(flags.contains(PropertyFlags::PRIMARY));
        assert!(flags.has(PropertyFlag::Required));
        assert!(!flags.has(PropertyFlag::UseNull));

        flags.remove(PropertyFlags::PRIMARY);
        assert!(!flags.has(PropertyFlag::Primary));
        assert!(flags.contains(PropertyFlags::REQUIRED));
    }

    #[test]
    fn test_serializes_as_names() {
        let flags = PropertyFlags::PRIMARY | PropertyFlags::NO_ARRAY_OUTPUT;
        let json = serde_json::to_value(flags).unwrap();
        assert_eq!(json, serde_json::json!(["primary", "no_array_output"]));

        let parsed: PropertyFlags =
            serde_json::from_value(serde_json::json!(["use_null", "write_empty"])).unwrap();
        assert_eq!(parsed, PropertyFlags::USE_NULL | PropertyFlags::WRITE_EMPTY);
    }
}
