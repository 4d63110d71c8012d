//! Package table store.
//!
//! A store mounts any number of ID tables from files under a root directory
//! and addresses all of their entries through one flattened index, in the
//! order the tables were added.

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, trace, warn};

use crate::file_list::FileList;
use crate::settings::StoreSettings;
use crate::table::{self, IdTable, IdTableEntry};
use crate::{Error, Result, TableFlags};

/// One entry seen through the flattened index.
#[derive(Debug, Clone, Copy)]
pub struct StoreEntry<'a> {
    /// Flattened index.
    pub index: usize,
    /// Table holding the entry.
    pub table: &'a IdTable,
    pub entry: &'a IdTableEntry,
}

/// Read-only view over the ID tables of one installation.
pub struct PackageTableStore {
    root: PathBuf,
    settings: StoreSettings,
    tables: Vec<IdTable>,
    entry_count: usize,
    file_list: FileList,
}

impl PackageTableStore {
    /// Create an empty store.
    pub fn new<P: AsRef<Path>>(root: P, settings: StoreSettings) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            settings,
            tables: Vec::new(),
            entry_count: 0,
            file_list: FileList::new(),
        }
    }

    /// Create a store and add every table named in `settings`.
    ///
    /// Table files that do not exist are skipped.
    pub fn mount<P: AsRef<Path>>(root: P, settings: StoreSettings) -> Result<Self> {
        let mut store = Self::new(root, settings);
        let names = store.settings.table_names.clone();

        for name in &names {
            store.add_table(name)?;
        }

        debug!(
            "Mounted {} tables with {} entries from {}",
            store.tables.len(),
            store.entry_count,
            store.root.display()
        );
        Ok(store)
    }

    /// Load, decode and append the table file `name`.
    ///
    /// Returns `false` when the file does not exist.
    pub fn add_table(&mut self, name: &str) -> Result<bool> {
        let path = self.root.join(name);
        if !path.is_file() {
            warn!("Table file {} not found, skipping", path.display());
            return Ok(false);
        }

        let data = fs::read(&path)?;
        let table = IdTable::parse_with(
            &data,
            TableFlags::COMPRESSED | TableFlags::ENCRYPTED,
            &self.settings.key,
            self.settings.size_check,
        )?;

        debug!("Loaded table {} with {} entries", name, table.len());
        self.push_table(table);
        Ok(true)
    }

    /// Append an already parsed table.
    pub fn push_table(&mut self, table: IdTable) {
        self.entry_count += table.len();
        self.tables.push(table);
    }

    /// Replace the file list used by [`PackageTableStore::filename`].
    pub fn set_file_list(&mut self, file_list: FileList) {
        self.file_list = file_list;
    }

    /// Load a file list from disk, returning the number of names.
    pub fn load_file_list<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        self.file_list = FileList::load(path)?;
        Ok(self.file_list.len())
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    #[inline]
    pub fn tables(&self) -> &[IdTable] {
        &self.tables
    }

    #[inline]
    pub fn file_list(&self) -> &FileList {
        &self.file_list
    }

    /// Total number of entries across all tables.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Map a flattened index to `(table index, local index)`.
    pub fn resolve(&self, index: usize) -> Result<(usize, usize)> {
        let mut local = index;
        for (table_index, table) in self.tables.iter().enumerate() {
            if local < table.len() {
                return Ok((table_index, local));
            }
            local -= table.len();
        }

        Err(Error::IndexOutOfRange {
            index,
            count: self.entry_count,
        })
    }

    /// Look up the entry behind a flattened index.
    pub fn get(&self, index: usize) -> Result<StoreEntry<'_>> {
        let (table_index, local) = self.resolve(index)?;
        let table = &self.tables[table_index];
        Ok(StoreEntry {
            index,
            table,
            entry: &table.entries()[local],
        })
    }

    /// Iterate over all entries in flattened order.
    pub fn iter(&self) -> impl Iterator<Item = StoreEntry<'_>> + '_ {
        self.tables
            .iter()
            .flat_map(|table| table.entries().iter().map(move |entry| (table, entry)))
            .enumerate()
            .map(|(index, (table, entry))| StoreEntry {
                index,
                table,
                entry,
            })
    }

    /// Read and decode the payload behind a flattened index.
    pub fn read_entry(&self, index: usize) -> Result<Vec<u8>> {
        let StoreEntry { table, entry, .. } = self.get(index)?;
        let path = self.backing_path(table.path(entry)?);
        trace!("Reading entry {} from {}", index, path.display());

        let file = File::open(&path)?;
        if file.metadata()?.len() == 0 {
            return table::read_entry(&[], entry, &self.settings.key, self.settings.size_check);
        }

        let mmap = unsafe { Mmap::map(&file)? };
        table::read_entry(&mmap, entry, &self.settings.key, self.settings.size_check)
    }

    /// Read many entries in parallel.
    #[cfg(feature = "parallel")]
    pub fn read_parallel(&self, indices: &[usize]) -> Vec<Result<Vec<u8>>> {
        use rayon::prelude::*;

        indices
            .par_iter()
            .map(|&index| self.read_entry(index))
            .collect()
    }

    /// Stable per-entry key: the backing file path and the flattened
    /// index, as `<path>/<index:06>`.
    ///
    /// Entries sharing a package file all share its path, so the index
    /// keeps the key unique. File lists are keyed the same way.
    pub fn entry_key(&self, index: usize) -> Result<String> {
        let StoreEntry { table, entry, .. } = self.get(index)?;
        Ok(format!("{}/{:06}", table.path(entry)?, index))
    }

    /// Name to extract the entry under.
    ///
    /// Prefers the table's original path, then the file list name for the
    /// entry key, then `<entry key>.<ext>`.
    pub fn filename(&self, index: usize, ext: &str) -> Result<String> {
        let StoreEntry { table, entry, .. } = self.get(index)?;

        if let Some(original) = table.original_path(entry)? {
            return Ok(original.to_string());
        }

        let key = self.entry_key(index)?;
        Ok(match self.file_list.get(&key) {
            Some(name) => name.to_string(),
            None => format!("{key}.{ext}"),
        })
    }

    /// Resolve an entry's backing file under the root.
    ///
    /// Separators are normalised and root, prefix, `.` and `..` components
    /// dropped, so the result never leaves the root.
    fn backing_path(&self, relative: &str) -> PathBuf {
        let normalized = relative.replace('\\', "/");

        let mut path = self.root.clone();
        for component in Path::new(&normalized).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }
}

impl std::fmt::Debug for PackageTableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageTableStore")
            .field("root", &self.root)
            .field("tables", &self.tables.len())
            .field("entries", &self.entry_count)
            .finish()
    }
}
