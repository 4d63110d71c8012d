//! Chunked block codec.
//!
//! A compressed payload is a sequence of chunks:
//!
//! ```text
//! [u32 size][body][padding]
//! ```
//!
//! A size of at most `0x8000` marks a stored chunk whose body is copied
//! verbatim. Larger sizes mark a compressed chunk: the true body length is
//! `size - 0x8000`, and the body is a 2-byte zlib-style marker (`78 DA`)
//! followed by a raw deflate stream. The reader skips to the next 16-byte
//! boundary after every chunk; the writer pads to 128 bytes.

use std::io::{Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use kunai_common::align::{align_up, pad_to};
use kunai_common::BinaryReader;
use tracing::{debug, trace, warn};

use crate::{Error, Result};

/// Largest size field that still denotes a stored chunk.
pub const STORED_LIMIT: u32 = 0x8000;

/// Offset added to the body length of a compressed chunk.
pub const COMPRESSED_BIAS: u32 = 0x8000;

/// Block size used by [`compress`] when the caller has no preference.
pub const DEFAULT_BLOCK_SIZE: u32 = 0x4000;

/// Blocks up to this many bytes are written stored.
pub const MIN_COMPRESS_LEN: usize = 0x100;

/// Marker preceding every deflate stream.
pub const DEFLATE_MARKER: [u8; 2] = [0x78, 0xDA];

/// Chunk boundary alignment on read.
pub const READ_ALIGNMENT: usize = 0x10;

/// Chunk boundary alignment on write.
pub const WRITE_ALIGNMENT: usize = 0x80;

/// What to do when the decoded length differs from the declared size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeCheck {
    /// Fail with [`Error::DecodeSizeMismatch`].
    #[default]
    Strict,
    /// Log a warning and truncate or zero-fill to the declared size.
    Lenient,
}

/// A single decoded chunk header with a view of its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk<'a> {
    /// Body copied as-is.
    Stored(&'a [u8]),
    /// Raw deflate stream, marker already stripped.
    Deflated(&'a [u8]),
}

impl Chunk<'_> {
    /// Append the chunk's decoded bytes to `output`, returning how many were
    /// written.
    ///
    /// Inflation stops one byte past `limit`, so a caller can tell an
    /// oversized chunk apart without materialising all of it. Stored bodies
    /// are already bounded by the input and copied whole.
    pub fn decode_into(&self, output: &mut Vec<u8>, limit: usize) -> Result<usize> {
        match *self {
            Chunk::Stored(body) => {
                output.extend_from_slice(body);
                Ok(body.len())
            }
            Chunk::Deflated(stream) => {
                let budget = (limit as u64).saturating_add(1);
                DeflateDecoder::new(stream)
                    .take(budget)
                    .read_to_end(output)
                    .map_err(|e| Error::Decompression(e.to_string()))
            }
        }
    }
}

/// Read the chunk starting at `cursor`.
///
/// Returns the chunk and the cursor of the next one, already aligned. The
/// next cursor may lie past the end of `data` when trailing padding was cut.
pub fn read_chunk(data: &[u8], cursor: usize) -> Result<(Chunk<'_>, usize)> {
    let mut reader = BinaryReader::new_at(data, cursor)?;
    let size = reader.read_u32()?;
    let body_start = reader.position();

    let (chunk, body_len) = if size <= STORED_LIMIT {
        let body = reader.read_bytes(size as usize)?;
        (Chunk::Stored(body), size as usize)
    } else {
        let body_len = (size - COMPRESSED_BIAS) as usize;
        if body_len < DEFLATE_MARKER.len() {
            return Err(Error::Decompression(format!(
                "compressed chunk at {cursor:#x} is shorter than its marker"
            )));
        }

        let body = reader.read_bytes(body_len)?;
        if body[..2] != DEFLATE_MARKER {
            trace!("Chunk at {cursor:#x} has marker {:02x}{:02x}", body[0], body[1]);
        }
        (Chunk::Deflated(&body[2..]), body_len)
    };

    Ok((chunk, align_up(body_start + body_len, READ_ALIGNMENT)))
}

/// Iterator over the chunks of a stream.
///
/// Stops after the first error.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Chunks<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    /// Offset of the next chunk.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.data.len() {
            return None;
        }

        match read_chunk(self.data, self.cursor) {
            Ok((chunk, next)) => {
                self.cursor = next;
                Some(Ok(chunk))
            }
            Err(e) => {
                self.cursor = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// Decode a chunk stream whose decoded length is `expected_size`.
///
/// Output never grows much past `expected_size`: in strict mode the first
/// chunk to overshoot fails the decode, in lenient mode the output is cut
/// there and the remaining chunks are ignored.
pub fn decompress(data: &[u8], expected_size: usize, size_check: SizeCheck) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_size.min(data.len()));
    let mut chunk_count = 0usize;

    for chunk in Chunks::new(data) {
        let limit = expected_size.saturating_sub(output.len());
        let written = chunk?.decode_into(&mut output, limit)?;
        trace!("Chunk {chunk_count}: {written} bytes");
        chunk_count += 1;

        if output.len() > expected_size {
            match size_check {
                SizeCheck::Strict => {
                    return Err(Error::DecodeSizeMismatch {
                        expected: expected_size,
                        actual: output.len(),
                    });
                }
                SizeCheck::Lenient => {
                    warn!(
                        "Decoded data overruns expected size {} at chunk {}, truncating",
                        expected_size, chunk_count
                    );
                    output.truncate(expected_size);
                    return Ok(output);
                }
            }
        }
    }

    debug!(
        "Decoded {} chunks: {} bytes -> {} bytes",
        chunk_count,
        data.len(),
        output.len()
    );

    if output.len() != expected_size {
        match size_check {
            SizeCheck::Strict => {
                return Err(Error::DecodeSizeMismatch {
                    expected: expected_size,
                    actual: output.len(),
                });
            }
            SizeCheck::Lenient => {
                warn!(
                    "Decoded size mismatch: expected {}, got {}",
                    expected_size,
                    output.len()
                );
                output.resize(expected_size, 0);
            }
        }
    }

    Ok(output)
}

/// Encode `data` as a chunk stream, `block_size` input bytes per chunk.
pub fn compress(data: &[u8], block_size: u32) -> Result<Vec<u8>> {
    if block_size == 0 {
        return Err(Error::InvalidBlockSize(block_size));
    }

    let mut output = Vec::with_capacity(data.len() / 2 + WRITE_ALIGNMENT);
    let mut chunk_count = 0usize;

    for block in data.chunks(block_size as usize) {
        write_chunk(&mut output, block)?;
        pad_to(&mut output, WRITE_ALIGNMENT);
        chunk_count += 1;
    }

    debug!(
        "Encoded {} chunks: {} bytes -> {} bytes",
        chunk_count,
        data.len(),
        output.len()
    );

    Ok(output)
}

/// Append one chunk holding `block` to `output`, without trailing padding.
///
/// Blocks longer than [`MIN_COMPRESS_LEN`] are deflated, shorter ones are
/// stored.
pub fn write_chunk(output: &mut Vec<u8>, block: &[u8]) -> Result<()> {
    if block.len() <= MIN_COMPRESS_LEN {
        output.write_u32::<LittleEndian>(block.len() as u32)?;
        output.extend_from_slice(block);
        return Ok(());
    }

    let deflated = deflate(block)?;
    let size = u32::try_from(deflated.len() + DEFLATE_MARKER.len())
        .ok()
        .and_then(|len| len.checked_add(COMPRESSED_BIAS))
        .ok_or_else(|| {
            Error::Compression(format!("chunk of {} bytes is too large", deflated.len()))
        })?;

    output.write_u32::<LittleEndian>(size)?;
    output.extend_from_slice(&DEFLATE_MARKER);
    output.extend_from_slice(&deflated);
    Ok(())
}

fn deflate(block: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(block.len()), Compression::best());
    encoder
        .write_all(block)
        .map_err(|e| Error::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| Error::Compression(e.to_string()))
}
