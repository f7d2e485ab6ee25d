//! Page serialization: one encoded array per page.
//!
//! A page is a 30-byte binary header followed by the encoded payload:
//!
//! ```text
//! offset  0..4   magic (u32 LE)
//! offset  4..5   page_type (1 = data, 2 = index)
//! offset  5..6   encoding tag (u8)
//! offset  6..10  column_index (i32 LE)
//! offset 10..14  num_values (i32 LE)
//! offset 14..18  uncompressed_size (i32 LE)
//! offset 18..22  compressed_size (i32 LE)
//! offset 22..26  crc32 of the payload (u32 LE)
//! offset 26..30  reserved (zero)
//! ```
//!
//! Every page on disk is encoded; the `Plain` tag is reserved and rejected.

use crate::array::{Array, DataType};
use crate::encoding::{self, Encoder, EncoderConfig, EncodingType};
use crate::error::{Error, ErrorCode, Result};
use crate::stats::ArrayStats;
use bytes::Bytes;
use tracing::{debug, warn};

/// Page magic / discriminant.
pub const PAGE_MAGIC: u32 = u32::from_le_bytes(*b"PRUN");

/// Serialized page header size.
pub const PAGE_HEADER_SIZE: usize = 30;

/// Page kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    /// Column data page.
    Data = 1,
    /// Auxiliary index page (row-index feature and friends).
    Index = 2,
}

impl PageType {
    fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Self::Data),
            2 => Ok(Self::Index),
            _ => Err(Error::corrupted(format!("unknown page type {tag}")).op("page::from_bytes")),
        }
    }
}

/// One encoded array with its header fields.
#[derive(Debug, Clone)]
pub struct Page {
    /// Column this page belongs to.
    pub column_index: i32,
    /// Data or index page.
    pub page_type: PageType,
    /// Encoding of `data`.
    pub encoding: EncodingType,
    /// Elements encoded in this page.
    pub num_values: i32,
    /// Raw values + null bitmap bytes before encoding.
    pub uncompressed_size: i32,
    /// Encoded payload size (`data.len()`).
    pub compressed_size: i32,
    /// crc32 of `data`.
    pub checksum: u32,
    /// Encoded payload.
    pub data: Bytes,
}

impl Page {
    /// Total on-disk size (header + payload).
    #[must_use]
    pub fn on_disk_size(&self) -> usize {
        PAGE_HEADER_SIZE + self.data.len()
    }

    /// Serializes header + payload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.on_disk_size());
        buf.extend_from_slice(&PAGE_MAGIC.to_le_bytes());
        buf.push(self.page_type as u8);
        buf.push(self.encoding.as_u8());
        buf.extend_from_slice(&self.column_index.to_le_bytes());
        buf.extend_from_slice(&self.num_values.to_le_bytes());
        buf.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        buf.extend_from_slice(&self.compressed_size.to_le_bytes());
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Parses a page from its on-disk bytes.
    ///
    /// Verifies the magic, the header ranges, and that the payload length
    /// matches `compressed_size`. The payload checksum is verified in
    /// [`read_page`].
    ///
    /// # Errors
    ///
    /// Returns `CorruptedFile` for any structural mismatch.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PAGE_HEADER_SIZE {
            return Err(Error::corrupted(format!(
                "page is {} bytes, smaller than its {PAGE_HEADER_SIZE}-byte header",
                bytes.len()
            ))
            .op("page::from_bytes"));
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        if magic != PAGE_MAGIC {
            return Err(
                Error::corrupted(format!("bad page magic {magic:#010x}")).op("page::from_bytes")
            );
        }
        let page_type = PageType::from_u8(bytes[4])?;
        let encoding = EncodingType::from_u8(bytes[5])?;
        let column_index = i32::from_le_bytes(bytes[6..10].try_into().unwrap());
        let num_values = i32::from_le_bytes(bytes[10..14].try_into().unwrap());
        let uncompressed_size = i32::from_le_bytes(bytes[14..18].try_into().unwrap());
        let compressed_size = i32::from_le_bytes(bytes[18..22].try_into().unwrap());
        let checksum = u32::from_le_bytes(bytes[22..26].try_into().unwrap());

        if column_index < 0 || num_values < 0 || uncompressed_size < 0 || compressed_size < 0 {
            return Err(Error::corrupted("negative size field in page header")
                .op("page::from_bytes"));
        }
        #[allow(clippy::cast_sign_loss)]
        let payload_len = compressed_size as usize;
        if bytes.len() != PAGE_HEADER_SIZE + payload_len {
            return Err(Error::corrupted(format!(
                "page payload is {} bytes, header declares {payload_len}",
                bytes.len() - PAGE_HEADER_SIZE
            ))
            .op("page::from_bytes"));
        }

        Ok(Self {
            column_index,
            page_type,
            encoding,
            num_values,
            uncompressed_size,
            compressed_size,
            checksum,
            data: Bytes::copy_from_slice(&bytes[PAGE_HEADER_SIZE..]),
        })
    }
}

/// Encodes one array into a page.
///
/// Statistics drive encoder selection; a specialized encoder that rejects
/// the array (nulls, foreign type) falls back to the general compressor.
/// Fixed-size lists short-circuit straight to it.
///
/// # Errors
///
/// `InvalidArgument` for empty or oversized arrays; encoder failures
/// propagate with page context.
pub fn write_page(array: &Array, column_index: i32, config: &EncoderConfig) -> Result<Page> {
    if array.is_empty() {
        return Err(Error::invalid_argument("cannot write an empty page").op("page::write"));
    }
    if i32::try_from(array.len()).is_err() {
        return Err(Error::invalid_argument(format!(
            "array length {} exceeds the page limit",
            array.len()
        ))
        .op("page::write"));
    }

    let data_type = array.data_type();
    let encoder = if data_type.is_fixed_size_list() {
        Encoder::Zstd {
            level: config.compression_level,
        }
    } else {
        let stats = ArrayStats::compute(array);
        match stats.validate() {
            Ok(()) => encoding::select_encoder(config, &data_type, Some(&stats)),
            Err(e) => {
                warn!(column = column_index, error = %e, "statistics failed validation, compressing without them");
                encoding::select_encoder(config, &data_type, None)
            }
        }
    };

    let (encoder, data) = match encoder.encode(array) {
        Ok(data) => (encoder, data),
        Err(e)
            if matches!(
                e.code(),
                ErrorCode::NullNotSupported | ErrorCode::UnsupportedType
            ) =>
        {
            debug!(column = column_index, encoding = %encoder.encoding(), "falling back to general compression");
            let fallback = Encoder::Zstd {
                level: config.compression_level,
            };
            (fallback, fallback.encode(array)?)
        }
        Err(e) => return Err(e.ctx("column", column_index.to_string())),
    };

    let bitmap_bytes = array.validity().map_or(0, |b| b.as_bytes().len());
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    Ok(Page {
        column_index,
        page_type: PageType::Data,
        encoding: encoder.encoding(),
        num_values: array.len() as i32,
        uncompressed_size: (array.data_size() + bitmap_bytes) as i32,
        compressed_size: data.len() as i32,
        checksum: crc32fast::hash(&data),
        data: Bytes::from(data),
    })
}

/// Decodes a page back into an array of the declared type.
///
/// # Errors
///
/// `InvalidArgument` for empty pages, `NotSupported` for the reserved
/// `Plain` tag, `CorruptedFile` (fatal) for checksum or length mismatches.
pub fn read_page(page: &Page, data_type: &DataType) -> Result<Array> {
    if page.data.is_empty() || page.num_values <= 0 {
        return Err(Error::invalid_argument("page has no payload").op("page::read"));
    }
    if page.encoding == EncodingType::Plain {
        return Err(
            Error::not_supported("plain-encoded pages are forbidden on disk").op("page::read")
        );
    }
    #[allow(clippy::cast_sign_loss)]
    let num_values = page.num_values as usize;
    if page.data.len() != page.compressed_size as usize {
        return Err(Error::corrupted(format!(
            "page payload is {} bytes, header declares {}",
            page.data.len(),
            page.compressed_size
        ))
        .op("page::read")
        .ctx("column", page.column_index.to_string()));
    }
    let actual = crc32fast::hash(&page.data);
    if actual != page.checksum {
        return Err(Error::corrupted(format!(
            "page checksum mismatch: stored {:#010x}, computed {actual:#010x}",
            page.checksum
        ))
        .op("page::read")
        .ctx("column", page.column_index.to_string()));
    }

    let array = encoding::decode(page.encoding, data_type, &page.data, num_values)?;
    if array.len() != num_values {
        return Err(Error::corrupted(format!(
            "decoded {} values, page declares {num_values}",
            array.len()
        ))
        .op("page::read"));
    }
    Ok(array)
}

/// Best-effort on-disk size estimate without encoding.
///
/// Used for page-split planning; the returned figure includes the header.
#[must_use]
pub fn estimate_page_size(array: &Array, config: &EncoderConfig) -> usize {
    let data_type = array.data_type();
    let stats = ArrayStats::compute(array);
    let encoder = if data_type.is_fixed_size_list() {
        Encoder::Zstd {
            level: config.compression_level,
        }
    } else {
        encoding::select_encoder(config, &data_type, Some(&stats))
    };
    PAGE_HEADER_SIZE + encoder.estimate_size(array, Some(&stats))
}
