//! Common utilities for Kunai.
//!
//! This crate provides the binary layout helpers shared by the Kunai crates:
//!
//! - [`BinaryReader`] - Bounds-checked little-endian reading from byte slices
//! - [`align`] - Power-of-two alignment helpers used by the chunk formats

mod error;
mod reader;

pub mod align;

pub use error::{Error, Result};
pub use reader::BinaryReader;
