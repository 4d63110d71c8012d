//! Keystream derivation and the XOR stream cipher.
//!
//! Encrypted tables and entries are XORed against a keystream that is a pure
//! function of the payload's declared (decoded) size and three per-title
//! constants: a truth table, a multiplier and a divisor. The same operation
//! encrypts and decrypts.

use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Secret byte table seeding the keystream.
///
/// Shared and immutable; cloning only bumps a reference count.
#[derive(Clone, PartialEq, Eq)]
pub struct TruthTable(Arc<[u8]>);

impl TruthTable {
    /// Wrap the given table bytes.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for TruthTable {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&[u8]> for TruthTable {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

impl Default for TruthTable {
    fn default() -> Self {
        Self::from(Vec::new())
    }
}

// Key material stays out of logs.
impl fmt::Debug for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TruthTable({} bytes)", self.0.len())
    }
}

/// Per-title decryption constants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyParameters {
    pub multiplier: u64,
    pub divisor: u64,
    pub truth: TruthTable,
}

impl KeyParameters {
    pub fn new(truth: impl Into<TruthTable>, multiplier: u64, divisor: u64) -> Self {
        Self {
            multiplier,
            divisor,
            truth: truth.into(),
        }
    }

    /// Check that the constants can drive a keystream.
    pub fn validate(&self) -> Result<()> {
        if self.truth.is_empty() {
            return Err(Error::InvalidKeyMaterial("truth table is empty".into()));
        }
        if self.divisor == 0 {
            return Err(Error::InvalidKeyMaterial("divisor is zero".into()));
        }
        Ok(())
    }
}

/// A derived keystream.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyStream(Vec<u8>);

impl KeyStream {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyStream({} bytes)", self.0.len())
    }
}

/// Derive the keystream for a payload of `payload_size` decoded bytes.
///
/// Arithmetic wraps at 64 bits. Each step reduces the state modulo the
/// divisor, picks a truth table byte with it and folds in the state's
/// second byte.
pub fn derive_key(payload_size: u32, key: &KeyParameters) -> Result<KeyStream> {
    derive_key_prefix(payload_size, payload_size as usize, key)
}

/// The first `len` bytes of the keystream for `payload_size`, never more
/// than `payload_size` bytes.
pub fn derive_key_prefix(payload_size: u32, len: usize, key: &KeyParameters) -> Result<KeyStream> {
    key.validate()?;

    let len = len.min(payload_size as usize);
    let truth = key.truth.as_bytes();
    let truth_len = truth.len() as u64;
    let mut state = u64::from(payload_size).wrapping_mul(key.multiplier) % key.divisor;

    let mut stream = Vec::with_capacity(len);
    for i in 0..len as u64 {
        let seed = truth[(state % truth_len) as usize];
        stream.push(seed ^ (state >> 8) as u8);

        state = state
            .wrapping_mul(key.multiplier)
            .wrapping_add(i + 1)
            % key.divisor;
    }

    Ok(KeyStream(stream))
}

/// XOR `buffer` with `key` in place, repeating the key when it is shorter.
///
/// An empty key leaves the buffer untouched.
pub fn crypt(buffer: &mut [u8], key: &KeyStream) {
    let key = key.as_bytes();
    if key.is_empty() {
        return;
    }

    for (byte, k) in buffer.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}

/// Derive the keystream for `payload_size` and XOR `buffer` with it.
///
/// Only as much keystream as `buffer` can use is derived, so a bogus
/// declared size costs nothing.
pub fn crypt_sized(buffer: &mut [u8], payload_size: u32, key: &KeyParameters) -> Result<()> {
    let stream = derive_key_prefix(payload_size, buffer.len(), key)?;
    crypt(buffer, &stream);
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn test_key() -> KeyParameters {
        KeyParameters::new(
            (0u8..=255).rev().collect::<Vec<u8>>(),
            0x0000_0001_0000_001B,
            0x0000_0000_7FFF_FFFF,
        )
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        let key = test_key();
        let a = derive_key(64, &key).unwrap();
        let b = derive_key(64, &key).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_derive_key_depends_on_size() {
        let key = test_key();
        let short = derive_key(32, &key).unwrap();
        let long = derive_key(33, &key).unwrap();
        assert_ne!(short.as_bytes(), &long.as_bytes()[..32]);
    }

    #[test]
    fn test_derive_key_zero_size() {
        let stream = derive_key(0, &test_key()).unwrap();
        assert!(stream.is_empty());
    }

    #[test]
    fn test_prefix_matches_full_stream() {
        let key = test_key();
        let full = derive_key(64, &key).unwrap();
        let prefix = derive_key_prefix(64, 16, &key).unwrap();
        assert_eq!(prefix.as_bytes(), &full.as_bytes()[..16]);

        let capped = derive_key_prefix(8, 100, &key).unwrap();
        assert_eq!(capped, derive_key(8, &key).unwrap());
    }

    #[test]
    fn test_crypt_sized_huge_declared_size() {
        let key = test_key();
        let mut buffer = vec![0x5A; 16];
        crypt_sized(&mut buffer, u32::MAX, &key).unwrap();

        let expected = derive_key_prefix(u32::MAX, 16, &key).unwrap();
        let plain: Vec<u8> = expected.as_bytes().iter().map(|k| k ^ 0x5A).collect();
        assert_eq!(buffer, plain);

        crypt_sized(&mut buffer, u32::MAX, &key).unwrap();
        assert_eq!(buffer, [0x5A; 16]);
    }

    #[test]
    fn test_crypt_sized_repeats_short_stream() {
        let key = test_key();
        let stream = derive_key(4, &key).unwrap();
        let mut buffer = vec![0u8; 10];
        crypt_sized(&mut buffer, 4, &key).unwrap();

        let expected: Vec<u8> = stream.as_bytes().iter().cycle().take(10).copied().collect();
        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_invalid_key_material() {
        let empty = KeyParameters::new(Vec::<u8>::new(), 3, 7);
        assert!(matches!(
            derive_key(16, &empty),
            Err(Error::InvalidKeyMaterial(_))
        ));

        let zero_divisor = KeyParameters::new(vec![1, 2, 3], 3, 0);
        assert!(matches!(
            derive_key(16, &zero_divisor),
            Err(Error::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn test_crypt_repeats_short_key() {
        let key = KeyStream(vec![0xFF, 0x00]);
        let mut buffer = vec![0x0F; 5];
        crypt(&mut buffer, &key);
        assert_eq!(buffer, [0xF0, 0x0F, 0xF0, 0x0F, 0xF0]);
    }

    #[test]
    fn test_crypt_empty_key_is_noop() {
        let mut buffer = vec![1, 2, 3];
        crypt(&mut buffer, &KeyStream(Vec::new()));
        assert_eq!(buffer, [1, 2, 3]);
    }

    #[test]
    fn test_truth_table_debug_hides_bytes() {
        let truth = TruthTable::from(vec![0xAA; 4]);
        assert_eq!(format!("{truth:?}"), "TruthTable(4 bytes)");
    }

    proptest! {
        #[test]
        fn crypt_is_involutive(
            data in prop::collection::vec(any::<u8>(), 0..2048),
            truth in prop::collection::vec(any::<u8>(), 1..64),
            multiplier in any::<u64>(),
            divisor in 1u64..=u64::MAX,
        ) {
            let key = KeyParameters::new(truth, multiplier, divisor);
            let stream = derive_key(data.len() as u32, &key).unwrap();

            let mut buffer = data.clone();
            crypt(&mut buffer, &stream);
            crypt(&mut buffer, &stream);
            prop_assert_eq!(buffer, data);
        }
    }
}
