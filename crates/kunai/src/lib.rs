//! Kunai - package table extraction library.
//!
//! This crate provides a unified interface to the Kunai crates.
//!
//! # Crates
//!
//! - [`kunai_common`] - Common utilities (bounds-checked binary reading, alignment)
//! - [`kunai_pak`] - Keystream cipher, chunk codec, ID tables and the package table store
//!
//! # Example
//!
//! ```no_run
//! use kunai::prelude::*;
//!
//! let key = KeyParameters::new(std::fs::read("truth.bin")?, 0x5DEECE66D, 0xFFFF_FFFB);
//! let settings = StoreSettings::new(key).with_tables(["system.tbl"]);
//! let store = PackageTableStore::mount("GameData", settings)?;
//!
//! if store.entry_count() > 0 {
//!     let data = store.read_entry(0)?;
//!     println!("{}: {} bytes", store.filename(0, "bin")?, data.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use kunai_common as common;
pub use kunai_pak as pak;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use kunai_common::BinaryReader;
    pub use kunai_pak::codec::{compress, decompress, DEFAULT_BLOCK_SIZE};
    pub use kunai_pak::{
        FileList, IdTable, IdTableBuilder, IdTableEntry, KeyParameters, PackageTableStore,
        SizeCheck, StoreSettings, TableFlags,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
