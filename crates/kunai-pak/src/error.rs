//! Error types for the package table crate.

use thiserror::Error;

/// Errors that can occur when decoding packages and their tables.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] kunai_common::Error),

    /// Missing or unusable cipher inputs.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Table header, offsets or strings are inconsistent with the buffer.
    #[error("malformed index: {0}")]
    MalformedIndex(String),

    /// Flags outside {Compressed, Encrypted}.
    #[error("unsupported flag combination: {0:#x}")]
    UnsupportedFlagCombination(u32),

    /// Decoded byte count differs from the declared size.
    #[error("decoded size mismatch: expected {expected}, got {actual}")]
    DecodeSizeMismatch { expected: usize, actual: usize },

    /// Flattened entry index past the loaded tables.
    #[error("entry index {index} out of range ({count} entries)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Block size of zero passed to the encoder.
    #[error("invalid block size: {0}")]
    InvalidBlockSize(u32),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Compression error.
    #[error("compression error: {0}")]
    Compression(String),

    /// File list could not be parsed.
    #[error("file list error: {0}")]
    FileList(String),
}

/// Result type for package operations.
pub type Result<T> = std::result::Result<T, Error>;
