//! Footer block: version, feature bitmap, page index, metadata, checksum.
//!
//! The footer occupies a fixed 32 KiB block at the end of the file so the
//! reader can locate it from the file size alone. Content layout inside
//! the block (all little-endian, zero-padded to the block size):
//!
//! ```text
//! magic u32 | major u16 | minor u16 | features u32 | page_count i32
//! page-index entries (28 bytes each)
//! meta_count u32 { u16 klen, key, u16 vlen, value }*
//! crc32 u32 over everything above
//! ```

use super::{FILE_MAGIC, FORMAT_VERSION};
use crate::encoding::EncodingType;
use crate::error::{Error, ErrorCode, Result};
use std::collections::BTreeMap;

/// Fixed footer block size.
pub const FOOTER_SIZE: usize = 32 * 1024;

/// Feature bit: the file carries a document-id row-index page.
pub const FEATURE_ROW_INDEX: u32 = 1;

/// Feature bit: the file carries a block-size hint for external caches.
pub const FEATURE_BLOCK_CACHE: u32 = 1 << 1;

/// Serialized size of one page-index entry.
const ENTRY_SIZE: usize = 28;

/// Location and shape of one page within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndexEntry {
    /// Column the page belongs to.
    pub column_index: i32,
    /// Position of the page within its column (0-based).
    pub page_number: i32,
    /// Absolute offset of the page header from the file start.
    pub offset: i64,
    /// Total on-disk size (header + payload).
    pub size: i32,
    /// Elements encoded in the page.
    pub num_values: i32,
    /// Payload encoding.
    pub encoding: EncodingType,
}

impl PageIndexEntry {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.column_index.to_le_bytes());
        buf.extend_from_slice(&self.page_number.to_le_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&self.num_values.to_le_bytes());
        buf.push(self.encoding.as_u8());
        buf.extend_from_slice(&[0u8; 3]);
    }

    fn read(bytes: &[u8]) -> Result<Self> {
        debug_assert_eq!(bytes.len(), ENTRY_SIZE);
        Ok(Self {
            column_index: i32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            page_number: i32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            offset: i64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            size: i32::from_le_bytes(bytes[16..20].try_into().unwrap()),
            num_values: i32::from_le_bytes(bytes[20..24].try_into().unwrap()),
            encoding: EncodingType::from_u8(bytes[24])?,
        })
    }
}

/// Parsed footer content.
#[derive(Debug, Clone)]
pub struct Footer {
    /// Format version (major, minor).
    pub version: (u16, u16),
    /// Feature bitmap.
    pub features: u32,
    /// Page index, in write order.
    pub pages: Vec<PageIndexEntry>,
    /// Key/value metadata.
    pub metadata: BTreeMap<String, String>,
}

impl Footer {
    /// Creates a footer for the current format version.
    #[must_use]
    pub fn new(pages: Vec<PageIndexEntry>, metadata: BTreeMap<String, String>) -> Self {
        Self {
            version: FORMAT_VERSION,
            features: 0,
            pages,
            metadata,
        }
    }

    /// All pages of a column, ordered by page number.
    #[must_use]
    pub fn pages_of(&self, column_index: i32) -> Vec<PageIndexEntry> {
        let mut pages: Vec<PageIndexEntry> = self
            .pages
            .iter()
            .filter(|e| e.column_index == column_index)
            .copied()
            .collect();
        pages.sort_by_key(|e| e.page_number);
        pages
    }

    /// Serializes the footer into its fixed-size block.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError` when the content exceeds the block.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(FOOTER_SIZE);
        buf.extend_from_slice(&FILE_MAGIC);
        buf.extend_from_slice(&self.version.0.to_le_bytes());
        buf.extend_from_slice(&self.version.1.to_le_bytes());
        buf.extend_from_slice(&self.features.to_le_bytes());
        buf.extend_from_slice(&(self.pages.len() as i32).to_le_bytes());
        for entry in &self.pages {
            entry.write(&mut buf);
        }
        buf.extend_from_slice(&(self.metadata.len() as u32).to_le_bytes());
        for (k, v) in &self.metadata {
            buf.extend_from_slice(&(k.len() as u16).to_le_bytes());
            buf.extend_from_slice(k.as_bytes());
            buf.extend_from_slice(&(v.len() as u16).to_le_bytes());
            buf.extend_from_slice(v.as_bytes());
        }

        if buf.len() + 4 > FOOTER_SIZE {
            return Err(Error::metadata(format!(
                "footer content is {} bytes, exceeding the {FOOTER_SIZE}-byte block",
                buf.len() + 4
            ))
            .op("footer::to_bytes")
            .ctx("pages", self.pages.len().to_string()));
        }
        let checksum = crc32fast::hash(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf.resize(FOOTER_SIZE, 0);
        Ok(buf)
    }

    /// Parses a footer block.
    ///
    /// # Errors
    ///
    /// `InvalidMagic` for bad magic, `VersionMismatch` for files written by
    /// an incompatible major version, `CorruptedFile` for structural or
    /// checksum damage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != FOOTER_SIZE {
            return Err(Error::corrupted(format!(
                "footer block is {} bytes, expected {FOOTER_SIZE}",
                bytes.len()
            ))
            .op("footer::from_bytes"));
        }
        if bytes[0..4] != FILE_MAGIC {
            return Err(Error::new(
                ErrorCode::InvalidMagic,
                format!("bad footer magic {:02x?}", &bytes[0..4]),
            )
            .op("footer::from_bytes"));
        }
        let major = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        let minor = u16::from_le_bytes(bytes[6..8].try_into().unwrap());
        if major != FORMAT_VERSION.0 {
            return Err(Error::new(
                ErrorCode::VersionMismatch,
                format!(
                    "file format {major}.{minor} is not readable by a {}.{} build",
                    FORMAT_VERSION.0, FORMAT_VERSION.1
                ),
            )
            .op("footer::from_bytes"));
        }
        let features = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let page_count = i32::from_le_bytes(bytes[12..16].try_into().unwrap());
        if page_count < 0 {
            return Err(Error::corrupted("negative page count").op("footer::from_bytes"));
        }
        #[allow(clippy::cast_sign_loss)]
        let page_count = page_count as usize;

        let mut pos = 16;
        let entries_end = pos + page_count * ENTRY_SIZE;
        if entries_end + 4 + 4 > FOOTER_SIZE {
            return Err(
                Error::corrupted(format!("page index of {page_count} entries overflows the block"))
                    .op("footer::from_bytes"),
            );
        }
        let mut pages = Vec::with_capacity(page_count);
        for _ in 0..page_count {
            pages.push(PageIndexEntry::read(&bytes[pos..pos + ENTRY_SIZE])?);
            pos += ENTRY_SIZE;
        }

        let meta_count = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let mut metadata = BTreeMap::new();
        for _ in 0..meta_count {
            let (key, next) = read_string(bytes, pos)?;
            let (value, next) = read_string(bytes, next)?;
            metadata.insert(key, value);
            pos = next;
        }

        if pos + 4 > FOOTER_SIZE {
            return Err(Error::corrupted("footer metadata overflows the block")
                .op("footer::from_bytes"));
        }
        let stored = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap());
        let actual = crc32fast::hash(&bytes[..pos]);
        if stored != actual {
            return Err(Error::corrupted(format!(
                "footer checksum mismatch: stored {stored:#010x}, computed {actual:#010x}"
            ))
            .op("footer::from_bytes"));
        }

        Ok(Self {
            version: (major, minor),
            features,
            pages,
            metadata,
        })
    }
}

fn read_string(bytes: &[u8], pos: usize) -> Result<(String, usize)> {
    if pos + 2 > bytes.len() {
        return Err(Error::corrupted("footer string truncated").op("footer::from_bytes"));
    }
    let len = usize::from(u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap()));
    let start = pos + 2;
    if start + len > bytes.len() {
        return Err(Error::corrupted("footer string truncated").op("footer::from_bytes"));
    }
    let s = String::from_utf8(bytes[start..start + len].to_vec())
        .map_err(|_| Error::corrupted("footer string is not valid UTF-8").op("footer::from_bytes"))?;
    Ok((s, start + len))
}
