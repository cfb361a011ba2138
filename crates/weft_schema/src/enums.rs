//! Enum definitions, including flag-style bitmask enums.
//!
//! A flag-style enum maps each value onto one bit of an `i64` mask. The
//! table is precomputed at definition time so wire decoding is a plain
//! lookup per name and encoding is a single pass over declared values.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// One declared enum value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumValueDef {
    pub name: String,
    pub description: Option<String>,
    /// Explicit bit for flag-style enums; auto-assigned when absent.
    pub bit: Option<i64>,
}

impl EnumValueDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            bit: None,
        }
    }

    /// Assigns an explicit bit value.
    #[must_use]
    pub fn with_bit(mut self, bit: i64) -> Self {
        self.bit = Some(bit);
        self
    }
}

/// Precomputed name-to-bit table for a flag-style enum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagTable {
    by_name: FxHashMap<String, i64>,
    /// Declaration-ordered (name, bit) pairs, used for encoding.
    ordered: Vec<(String, i64)>,
}

impl FlagTable {
    fn build(values: &[EnumValueDef]) -> Self {
        let mut by_name = FxHashMap::default();
        let mut ordered = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            let bit = match value.bit {
                Some(bit) => bit,
                None => {
                    // An i64 mask holds 63 usable bits; past that the shift
                    // would wrap into the sign bit.
                    assert!(
                        i < 63,
                        "flag enum value '{}' at index {i} has no explicit bit; \
                         auto-assignment supports at most 63 values",
                        value.name
                    );
                    1i64 << i
                }
            };
            by_name.insert(value.name.clone(), bit);
            ordered.push((value.name.clone(), bit));
        }
        Self { by_name, ordered }
    }

    /// Returns the bit for a value name.
    #[must_use]
    pub fn bit(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    /// Decodes wire value names into a combined bitmask.
    pub fn decode<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<i64, String> {
        let mut mask = 0i64;
        for name in names {
            let bit = self
                .by_name
                .get(name)
                .ok_or_else(|| format!("unknown enum value '{name}'"))?;
            mask |= bit;
        }
        Ok(mask)
    }

    /// Encodes a bitmask into value names in declaration order.
    #[must_use]
    pub fn encode(&self, mask: i64) -> Vec<String> {
        self.ordered
            .iter()
            .filter(|(_, bit)| *bit != 0 && mask & bit == *bit)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Returns the mask with every declared bit set.
    #[must_use]
    pub fn all_bits(&self) -> i64 {
        self.ordered.iter().fold(0, |acc, (_, bit)| acc | bit)
    }
}

/// Enum type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValueDef>,
    flags: Option<FlagTable>,
}

impl EnumDef {
    /// Creates a plain (non-flag) enum.
    pub fn new(name: impl Into<String>, values: Vec<EnumValueDef>) -> Self {
        Self {
            name: name.into(),
            description: None,
            values,
            flags: None,
        }
    }

    /// Creates a flag-style enum with a precomputed bitmask table.
    ///
    /// # Panics
    ///
    /// Panics when a value past declaration index 62 carries no explicit
    /// bit; values beyond the 63 auto-assignable bits must set one.
    pub fn flags(name: impl Into<String>, values: Vec<EnumValueDef>) -> Self {
        let table = FlagTable::build(&values);
        Self {
            name: name.into(),
            description: None,
            values,
            flags: Some(table),
        }
    }

    /// Returns true if this is a flag-style enum.
    #[must_use]
    pub fn is_flags(&self) -> bool {
        self.flags.is_some()
    }

    /// Returns the flag table for flag-style enums.
    #[must_use]
    pub fn flag_table(&self) -> Option<&FlagTable> {
        self.flags.as_ref()
    }

    /// Returns true if a value name is declared.
    #[must_use]
    pub fn has_value(&self, name: &str) -> bool {
        self.values.iter().any(|v| v.name == name)
    }
}
