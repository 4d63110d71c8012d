//! Transform flags shared by tables and entries.

use std::fmt;
use std::ops::BitOr;

use crate::{Error, Result};

/// Which transforms apply to a table or entry payload.
///
/// On read the payload is decrypted first and decompressed second; on write
/// the order is reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TableFlags(u32);

impl TableFlags {
    /// Stored as-is.
    pub const NONE: Self = Self(0);
    /// Block codec compressed.
    pub const COMPRESSED: Self = Self(0x1);
    /// Keystream encrypted.
    pub const ENCRYPTED: Self = Self(0x2);

    const KNOWN: u32 = Self::COMPRESSED.0 | Self::ENCRYPTED.0;

    /// Validate raw flag bits read from disk.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::KNOWN != 0 {
            return Err(Error::UnsupportedFlagCombination(bits));
        }
        Ok(Self(bits))
    }

    /// Raw bit value.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_compressed(self) -> bool {
        self.contains(Self::COMPRESSED)
    }

    #[inline]
    pub const fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }
}

impl BitOr for TableFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for TableFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_compressed(), self.is_encrypted()) {
            (false, false) => f.write_str("none"),
            (true, false) => f.write_str("compressed"),
            (false, true) => f.write_str("encrypted"),
            (true, true) => f.write_str("compressed|encrypted"),
        }
    }
}
