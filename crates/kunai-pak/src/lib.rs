//! Package table reader for chunk-compressed, keystream-encrypted archives.
//!
//! Assets are stored in package files indexed by ID tables. Tables and
//! payloads may carry two transforms:
//!
//! - a XOR stream cipher whose keystream is derived from the payload size and
//!   per-title constants ([`crypto`])
//! - a chunked container of stored or deflated blocks ([`codec`])
//!
//! On read the payload is decrypted first and decompressed second.
//!
//! # Example
//!
//! ```no_run
//! use kunai_pak::{KeyParameters, PackageTableStore, StoreSettings};
//!
//! let key = KeyParameters::new(std::fs::read("truth.bin")?, 0x5DEECE66D, 0xFFFF_FFFB);
//! let settings = StoreSettings::new(key).with_tables(["system.tbl", "pkg0.tbl"]);
//! let store = PackageTableStore::mount("GameData", settings)?;
//!
//! for entry in store.iter() {
//!     let name = store.filename(entry.index, "bin")?;
//!     let data = store.read_entry(entry.index)?;
//!     println!("{}: {} bytes", name, data.len());
//! }
//! # Ok::<(), kunai_pak::Error>(())
//! ```

mod builder;
mod error;
mod file_list;
mod flags;
mod settings;
mod store;

pub mod codec;
pub mod crypto;
pub mod table;

pub use builder::{IdTableBuilder, NewEntry};
pub use codec::SizeCheck;
pub use crypto::{KeyParameters, KeyStream, TruthTable};
pub use error::{Error, Result};
pub use file_list::FileList;
pub use flags::TableFlags;
pub use settings::StoreSettings;
pub use store::{PackageTableStore, StoreEntry};
pub use table::{IdTable, IdTableEntry, IdTableHeader};
