//! Name lookup for entries without an embedded original path.
//!
//! File lists are plain text, one `key,name` pair per line. Blank lines and
//! lines starting with `#` are skipped; a repeated key replaces the earlier
//! name.

use std::fs;
use std::path::Path;

use hashbrown::HashMap;

use crate::{Error, Result};

/// Maps entry paths to human-readable names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileList {
    names: HashMap<String, String>,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a file list from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse file list text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut list = Self::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, name) = line.split_once(',').ok_or_else(|| {
                Error::FileList(format!("line {}: expected `key,name`", number + 1))
            })?;
            list.insert(key.trim(), name.trim());
        }

        Ok(list)
    }

    pub fn insert(&mut self, key: impl Into<String>, name: impl Into<String>) {
        self.names.insert(key.into(), name.into());
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let list = FileList::parse(
            "# pkginfo\n\
             0000/0001.file, chara/c0001.g1m\n\
             \n\
             0000/0002.file,stage/s0001.g1t\n\
             0000/0001.file,chara/c0001_v2.g1m\n",
        )
        .unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.get("0000/0001.file"), Some("chara/c0001_v2.g1m"));
        assert_eq!(list.get("0000/0002.file"), Some("stage/s0001.g1t"));
        assert_eq!(list.get("0000/0003.file"), None);
    }

    #[test]
    fn test_parse_rejects_bare_line() {
        assert!(matches!(
            FileList::parse("ok,name\nbroken"),
            Err(Error::FileList(message)) if message.starts_with("line 2")
        ));
    }
}
