//! ID table parsing.
//!
//! An ID table indexes the members of a package. On disk a flagged table is
//! prefixed with its decoded size:
//!
//! ```text
//! [u32 decoded size][encrypted and/or chunk-compressed table]
//! ```
//!
//! The decoded table is a 16-byte header followed, at `entry_offset`, by
//! `entry_count` 32-byte entries. Entry strings live after the entries and
//! are addressed relative to `entry_offset`.

use std::ops::Range;

use byteorder::{LittleEndian, WriteBytesExt};
use kunai_common::BinaryReader;
use tracing::debug;

use crate::codec::{self, SizeCheck};
use crate::crypto::{self, KeyParameters};
use crate::{Error, Result, TableFlags};

/// Size of [`IdTableHeader`] on disk.
pub const HEADER_SIZE: usize = 0x10;

/// Size of one [`IdTableEntry`] on disk.
pub const ENTRY_SIZE: usize = 0x20;

/// ID table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdTableHeader {
    /// Offset of the entry array from the start of the table.
    pub entry_offset: u32,
    /// Number of entries.
    pub entry_count: u32,
    /// Format version, not interpreted.
    pub version: u32,
    pub reserved: u32,
}

impl IdTableHeader {
    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            entry_offset: reader.read_u32()?,
            entry_count: reader.read_u32()?,
            version: reader.read_u32()?,
            reserved: reader.read_u32()?,
        })
    }

    pub fn write(&self, output: &mut Vec<u8>) -> Result<()> {
        output.write_u32::<LittleEndian>(self.entry_offset)?;
        output.write_u32::<LittleEndian>(self.entry_count)?;
        output.write_u32::<LittleEndian>(self.version)?;
        output.write_u32::<LittleEndian>(self.reserved)?;
        Ok(())
    }

    /// Byte range of the entry array, if it can be expressed at all.
    fn entries_range(&self) -> Option<Range<usize>> {
        let start = self.entry_offset as usize;
        let len = (self.entry_count as usize).checked_mul(ENTRY_SIZE)?;
        Some(start..start.checked_add(len)?)
    }
}

/// One ID table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdTableEntry {
    /// Offset of the backing file path, relative to the entry array.
    pub path_offset: i32,
    /// Offset of the developer path, relative to the entry array; negative
    /// when absent.
    pub original_path_offset: i32,
    /// Offset of the payload in the backing file.
    pub data_offset: u32,
    /// Stored payload length.
    pub compressed_size: u32,
    /// Decoded payload length.
    pub decompressed_size: u32,
    /// Transforms applied to the payload.
    pub flags: TableFlags,
    pub name_hash: u32,
    pub reserved: u32,
}

impl IdTableEntry {
    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            path_offset: reader.read_i32()?,
            original_path_offset: reader.read_i32()?,
            data_offset: reader.read_u32()?,
            compressed_size: reader.read_u32()?,
            decompressed_size: reader.read_u32()?,
            flags: TableFlags::from_bits(reader.read_u32()?)?,
            name_hash: reader.read_u32()?,
            reserved: reader.read_u32()?,
        })
    }

    pub fn write(&self, output: &mut Vec<u8>) -> Result<()> {
        output.write_i32::<LittleEndian>(self.path_offset)?;
        output.write_i32::<LittleEndian>(self.original_path_offset)?;
        output.write_u32::<LittleEndian>(self.data_offset)?;
        output.write_u32::<LittleEndian>(self.compressed_size)?;
        output.write_u32::<LittleEndian>(self.decompressed_size)?;
        output.write_u32::<LittleEndian>(self.flags.bits())?;
        output.write_u32::<LittleEndian>(self.name_hash)?;
        output.write_u32::<LittleEndian>(self.reserved)?;
        Ok(())
    }

    #[inline]
    pub fn has_original_path(&self) -> bool {
        self.original_path_offset >= 0
    }

    /// Byte range of the stored payload inside a backing file of
    /// `archive_len` bytes.
    pub fn data_range(&self, archive_len: u64) -> Result<Range<usize>> {
        let start = u64::from(self.data_offset);
        let end = start + u64::from(self.compressed_size);
        if end > archive_len {
            return Err(Error::MalformedIndex(format!(
                "entry data {start:#x}..{end:#x} exceeds archive length {archive_len:#x}"
            )));
        }
        Ok(start as usize..end as usize)
    }
}

/// A decoded ID table.
pub struct IdTable {
    header: IdTableHeader,
    buffer: Vec<u8>,
    entries: Vec<IdTableEntry>,
}

impl IdTable {
    /// Parse a table file, decoding it first unless `flags` is none.
    pub fn parse(data: &[u8], flags: TableFlags, key: &KeyParameters) -> Result<Self> {
        Self::parse_with(data, flags, key, SizeCheck::Strict)
    }

    /// Like [`IdTable::parse`] with an explicit decoded size policy.
    pub fn parse_with(
        data: &[u8],
        flags: TableFlags,
        key: &KeyParameters,
        size_check: SizeCheck,
    ) -> Result<Self> {
        if flags.is_none() {
            return Self::from_decoded(data.to_vec());
        }

        let mut reader = BinaryReader::new(data);
        let size = reader
            .read_u32()
            .map_err(|_| Error::MalformedIndex("missing table size prefix".into()))?;

        let decoded = decode_payload(reader.remaining_bytes(), size, flags, key, size_check)?;
        debug!(
            "Decoded {} table: {} bytes -> {} bytes",
            flags,
            data.len(),
            decoded.len()
        );

        Self::from_decoded(decoded)
    }

    /// Parse a table and check that every entry fits inside a backing file
    /// of `archive_len` bytes.
    pub fn parse_bounded(
        data: &[u8],
        flags: TableFlags,
        key: &KeyParameters,
        archive_len: u64,
    ) -> Result<Self> {
        let table = Self::parse(data, flags, key)?;
        for entry in &table.entries {
            entry.data_range(archive_len)?;
        }
        Ok(table)
    }

    /// Parse an already decoded table buffer.
    pub fn from_decoded(buffer: Vec<u8>) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::MalformedIndex(format!(
                "table of {} bytes is shorter than its header",
                buffer.len()
            )));
        }

        let mut reader = BinaryReader::new(&buffer);
        let header = IdTableHeader::read(&mut reader)?;

        let range = header
            .entries_range()
            .filter(|range| range.end <= buffer.len())
            .ok_or_else(|| {
                Error::MalformedIndex(format!(
                    "{} entries at {:#x} exceed table length {:#x}",
                    header.entry_count,
                    header.entry_offset,
                    buffer.len()
                ))
            })?;

        reader.seek(range.start)?;
        let mut entries = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            entries.push(IdTableEntry::read(&mut reader)?);
        }

        let table = Self {
            header,
            buffer,
            entries,
        };

        for (index, entry) in table.entries.iter().enumerate() {
            table.path(entry).map_err(|e| {
                Error::MalformedIndex(format!("entry {index}: bad path: {e}"))
            })?;
            table.original_path(entry).map_err(|e| {
                Error::MalformedIndex(format!("entry {index}: bad original path: {e}"))
            })?;
        }

        Ok(table)
    }

    #[inline]
    pub fn header(&self) -> &IdTableHeader {
        &self.header
    }

    #[inline]
    pub fn entries(&self) -> &[IdTableEntry] {
        &self.entries
    }

    #[inline]
    pub fn entry(&self, index: usize) -> Option<&IdTableEntry> {
        self.entries.get(index)
    }

    /// The decoded table bytes.
    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the entry's backing file, relative to the package root.
    pub fn path(&self, entry: &IdTableEntry) -> Result<&str> {
        self.string_at(entry.path_offset)
    }

    /// Developer path of the entry, when the table kept one.
    pub fn original_path(&self, entry: &IdTableEntry) -> Result<Option<&str>> {
        if !entry.has_original_path() {
            return Ok(None);
        }
        self.string_at(entry.original_path_offset).map(Some)
    }

    fn string_at(&self, offset: i32) -> Result<&str> {
        let relative = usize::try_from(offset)
            .map_err(|_| Error::MalformedIndex(format!("negative string offset {offset}")))?;
        let absolute = self.header.entry_offset as usize + relative;

        let reader = BinaryReader::new(&self.buffer);
        Ok(reader.cstring_at(absolute)?)
    }
}

impl std::fmt::Debug for IdTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTable")
            .field("header", &self.header)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Decode an entry's payload out of its backing file.
///
/// A zero decoded size yields an empty payload.
pub fn read_entry(
    file: &[u8],
    entry: &IdTableEntry,
    key: &KeyParameters,
    size_check: SizeCheck,
) -> Result<Vec<u8>> {
    let range = entry.data_range(file.len() as u64)?;
    decode_payload(
        &file[range],
        entry.decompressed_size,
        entry.flags,
        key,
        size_check,
    )
}

/// Decrypt, then decompress, a payload of `size` decoded bytes.
pub fn decode_payload(
    data: &[u8],
    size: u32,
    flags: TableFlags,
    key: &KeyParameters,
    size_check: SizeCheck,
) -> Result<Vec<u8>> {
    if size == 0 && flags.is_compressed() {
        return Ok(Vec::new());
    }

    let mut buffer = data.to_vec();

    if flags.is_encrypted() {
        crypto::crypt_sized(&mut buffer, size, key)?;
    }

    if flags.is_compressed() {
        buffer = codec::decompress(&buffer, size as usize, size_check)?;
    }

    Ok(buffer)
}

/// Compress, then encrypt, a payload. Inverse of [`decode_payload`].
pub fn encode_payload(
    data: &[u8],
    flags: TableFlags,
    key: &KeyParameters,
    block_size: u32,
) -> Result<Vec<u8>> {
    let size = u32::try_from(data.len())
        .map_err(|_| Error::Compression(format!("payload of {} bytes is too large", data.len())))?;

    let mut buffer = if flags.is_compressed() && size != 0 {
        codec::compress(data, block_size)?
    } else {
        data.to_vec()
    };

    if flags.is_encrypted() {
        crypto::crypt_sized(&mut buffer, size, key)?;
    }

    Ok(buffer)
}
