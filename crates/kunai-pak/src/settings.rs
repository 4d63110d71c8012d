//! Per-title store configuration.

use crate::codec::SizeCheck;
use crate::crypto::KeyParameters;

/// Everything a [`PackageTableStore`](crate::PackageTableStore) needs to
/// know about a title.
#[derive(Debug, Clone, Default)]
pub struct StoreSettings {
    /// Table files mounted by [`PackageTableStore::mount`](crate::PackageTableStore::mount),
    /// relative to the root.
    pub table_names: Vec<String>,
    /// Keystream constants.
    pub key: KeyParameters,
    /// Policy for decoded size mismatches.
    pub size_check: SizeCheck,
}

impl StoreSettings {
    pub fn new(key: KeyParameters) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    pub fn with_tables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_size_check(mut self, size_check: SizeCheck) -> Self {
        self.size_check = size_check;
        self
    }
}
