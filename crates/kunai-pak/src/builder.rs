//! ID table and package writer.

use byteorder::{LittleEndian, WriteBytesExt};
use kunai_common::align::pad_to;

use crate::codec::READ_ALIGNMENT;
use crate::crypto::KeyParameters;
use crate::table::{encode_payload, IdTableEntry, IdTableHeader, ENTRY_SIZE, HEADER_SIZE};
use crate::{Error, Result, TableFlags};

/// An entry waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub path: String,
    pub original_path: Option<String>,
    pub data_offset: u32,
    pub compressed_size: u32,
    pub decompressed_size: u32,
    pub flags: TableFlags,
    pub name_hash: u32,
}

/// Assembles a decoded ID table: header, entries, then the string pool.
#[derive(Debug, Clone, Default)]
pub struct IdTableBuilder {
    version: u32,
    entries: Vec<NewEntry>,
}

impl IdTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Append an entry, returning its local index.
    pub fn push(&mut self, entry: NewEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Encode `payload` with `flags`, append it to `package` on a 16-byte
    /// boundary and record an entry pointing at it.
    #[allow(clippy::too_many_arguments)]
    pub fn push_payload(
        &mut self,
        package: &mut Vec<u8>,
        path: &str,
        original_path: Option<&str>,
        payload: &[u8],
        flags: TableFlags,
        key: &KeyParameters,
        block_size: u32,
    ) -> Result<usize> {
        pad_to(package, READ_ALIGNMENT);
        let stored = encode_payload(payload, flags, key, block_size)?;

        let entry = NewEntry {
            path: path.to_string(),
            original_path: original_path.map(str::to_string),
            data_offset: to_u32(package.len(), "package")?,
            compressed_size: to_u32(stored.len(), "payload")?,
            decompressed_size: to_u32(payload.len(), "payload")?,
            flags,
            name_hash: 0,
        };
        package.extend_from_slice(&stored);

        Ok(self.push(entry))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the decoded table bytes.
    pub fn build(&self) -> Result<Vec<u8>> {
        let entry_bytes = self.entries.len() * ENTRY_SIZE;
        let mut strings = Vec::new();
        let mut records = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let path_offset = push_string(&mut strings, entry_bytes, &entry.path)?;
            let original_path_offset = match &entry.original_path {
                Some(path) => push_string(&mut strings, entry_bytes, path)?,
                None => -1,
            };

            records.push(IdTableEntry {
                path_offset,
                original_path_offset,
                data_offset: entry.data_offset,
                compressed_size: entry.compressed_size,
                decompressed_size: entry.decompressed_size,
                flags: entry.flags,
                name_hash: entry.name_hash,
                reserved: 0,
            });
        }

        let mut output = Vec::with_capacity(HEADER_SIZE + entry_bytes + strings.len());
        IdTableHeader {
            entry_offset: HEADER_SIZE as u32,
            entry_count: to_u32(records.len(), "entry count")?,
            version: self.version,
            reserved: 0,
        }
        .write(&mut output)?;

        for record in &records {
            record.write(&mut output)?;
        }
        output.extend_from_slice(&strings);

        Ok(output)
    }

    /// Build the table as stored on disk: the decoded size followed by the
    /// table encoded with `flags`.
    pub fn build_encoded(
        &self,
        flags: TableFlags,
        key: &KeyParameters,
        block_size: u32,
    ) -> Result<Vec<u8>> {
        let table = self.build()?;
        if flags.is_none() {
            return Ok(table);
        }

        let encoded = encode_payload(&table, flags, key, block_size)?;
        let mut output = Vec::with_capacity(encoded.len() + 4);
        output.write_u32::<LittleEndian>(to_u32(table.len(), "table")?)?;
        output.extend_from_slice(&encoded);
        Ok(output)
    }
}

fn push_string(strings: &mut Vec<u8>, base: usize, value: &str) -> Result<i32> {
    if value.as_bytes().contains(&0) {
        return Err(Error::MalformedIndex(format!("string {value:?} contains NUL")));
    }

    let offset = i32::try_from(base + strings.len())
        .map_err(|_| Error::MalformedIndex("string pool too large".into()))?;
    strings.extend_from_slice(value.as_bytes());
    strings.push(0);
    Ok(offset)
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::MalformedIndex(format!("{what} exceeds 4 GiB")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{SizeCheck, DEFAULT_BLOCK_SIZE};
    use crate::table::{read_entry, IdTable};

    fn key() -> KeyParameters {
        KeyParameters::new(vec![0x13, 0x37, 0xC0, 0xDE, 0x42], 0x41C64E6D, 0x7FFF_FFFF)
    }

    #[test]
    fn test_build_and_parse() {
        let mut builder = IdTableBuilder::new().version(2);
        builder.push(NewEntry {
            path: "0000/0001.file".into(),
            original_path: Some("data/chara/c0001.g1m".into()),
            data_offset: 0,
            compressed_size: 16,
            decompressed_size: 32,
            flags: TableFlags::COMPRESSED,
            name_hash: 0xDEADBEEF,
        });

        let flags = TableFlags::COMPRESSED | TableFlags::ENCRYPTED;
        let bytes = builder.build_encoded(flags, &key(), DEFAULT_BLOCK_SIZE).unwrap();
        let table = IdTable::parse(&bytes, flags, &key()).unwrap();

        assert_eq!(table.header().version, 2);
        let entry = table.entries()[0];
        assert_eq!(table.path(&entry).unwrap(), "0000/0001.file");
        assert_eq!(
            table.original_path(&entry).unwrap(),
            Some("data/chara/c0001.g1m")
        );
        assert_eq!(entry.name_hash, 0xDEADBEEF);
        assert_eq!(entry.flags, TableFlags::COMPRESSED);
    }

    #[test]
    fn test_push_payload_aligns_and_reads_back() {
        let mut builder = IdTableBuilder::new();
        let mut package = Vec::new();
        let flags = TableFlags::COMPRESSED | TableFlags::ENCRYPTED;

        let first = vec![0x55u8; 1000];
        let second = b"short".to_vec();
        builder
            .push_payload(&mut package, "pkg", None, &first, flags, &key(), 0x200)
            .unwrap();
        builder
            .push_payload(&mut package, "pkg", None, &second, TableFlags::NONE, &key(), 0x200)
            .unwrap();

        let table = IdTable::from_decoded(builder.build().unwrap()).unwrap();
        assert_eq!(table.entries()[1].data_offset % READ_ALIGNMENT as u32, 0);

        let decoded: Vec<Vec<u8>> = table
            .entries()
            .iter()
            .map(|entry| read_entry(&package, entry, &key(), SizeCheck::Strict).unwrap())
            .collect();
        assert_eq!(decoded, [first, second]);
    }

    #[test]
    fn test_nul_in_path_rejected() {
        let mut builder = IdTableBuilder::new();
        builder.push(NewEntry {
            path: "bad\0path".into(),
            original_path: None,
            data_offset: 0,
            compressed_size: 0,
            decompressed_size: 0,
            flags: TableFlags::NONE,
            name_hash: 0,
        });
        assert!(matches!(builder.build(), Err(Error::MalformedIndex(_))));
    }
}
