//! Self-describing columnar file format.
//!
//! ```text
//! [0 .. 8 KiB)            header: magic, length-prefixed schema + row count,
//!                         zero-padded (rewritten once at close)
//! [8 KiB .. footer_off)   page stream
//! [footer_off .. EOF)     fixed 32 KiB footer: version, features,
//!                         page index, metadata, checksum
//! ```
//!
//! The header region is a fixed reservation so the writer can finalize the
//! row count in place without shifting any page. Schemas that do not
//! serialize within the reservation are rejected up front.
//!
//! # Module Structure
//!
//! - [`page`]: single-array pages with a 30-byte binary header
//! - [`footer`]: footer block and page index
//! - [`writer`]: [`FileWriter`]
//! - [`reader`]: [`FileReader`] and the [`ByteRangeReader`] boundary

mod footer;
mod page;
mod reader;
mod writer;


pub use footer::{Footer, PageIndexEntry, FEATURE_BLOCK_CACHE, FEATURE_ROW_INDEX, FOOTER_SIZE};
pub use page::{estimate_page_size, read_page, write_page, Page, PageType, PAGE_MAGIC};
pub use reader::{ByteRangeReader, FileReader, MmapByteRangeReader};
pub use writer::FileWriter;

use crate::array::Schema;
use crate::error::{Error, Result};

/// File magic at offset 0.
pub const FILE_MAGIC: [u8; 4] = *b"LANC";

/// Reserved header region size.
pub const HEADER_SIZE: usize = 8 * 1024;

/// Format version written by this build.
pub const FORMAT_VERSION: (u16, u16) = (0, 1);

/// Serializes the header region: magic, u32 payload length, payload
/// (`num_rows: u64` + schema bytes), zero-padded to [`HEADER_SIZE`].
///
/// # Errors
///
/// Returns `MetadataError` when the schema does not fit the reservation.
pub(crate) fn serialize_header(schema: &Schema, num_rows: u64) -> Result<Vec<u8>> {
    let schema_bytes = schema.to_bytes();
    let payload_len = 8 + schema_bytes.len();
    if 8 + payload_len > HEADER_SIZE {
        return Err(Error::metadata(format!(
            "schema serializes to {} bytes, exceeding the {HEADER_SIZE}-byte header reservation",
            payload_len
        ))
        .op("format::serialize_header"));
    }

    let mut buf = vec![0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(&FILE_MAGIC);
    buf[4..8].copy_from_slice(&(payload_len as u32).to_le_bytes());
    buf[8..16].copy_from_slice(&num_rows.to_le_bytes());
    buf[16..16 + schema_bytes.len()].copy_from_slice(&schema_bytes);
    Ok(buf)
}

/// Parses the header region back into the schema and row count.
///
/// # Errors
///
/// `InvalidMagic` when the magic bytes do not match, `CorruptedFile` for
/// structural damage.
pub(crate) fn parse_header(bytes: &[u8]) -> Result<(Schema, u64)> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::corrupted(format!(
            "header region is {} bytes, expected {HEADER_SIZE}",
            bytes.len()
        ))
        .op("format::parse_header"));
    }
    if bytes[0..4] != FILE_MAGIC {
        return Err(Error::new(
            crate::error::ErrorCode::InvalidMagic,
            format!("bad file magic {:02x?}", &bytes[0..4]),
        )
        .op("format::parse_header"));
    }
    let payload_len = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    if payload_len < 8 || 8 + payload_len > HEADER_SIZE {
        return Err(Error::corrupted(format!(
            "header payload length {payload_len} is out of range"
        ))
        .op("format::parse_header"));
    }
    let num_rows = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
    let schema = Schema::from_bytes(&bytes[16..8 + payload_len])?;
    Ok((schema, num_rows))
}
