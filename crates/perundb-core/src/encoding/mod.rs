//! Page encodings: RLE, bit-packing, dictionary, byte-stream-split, and
//! zstd general compression.
//!
//! An [`Encoder`] is a tagged variant over the closed encoder set — the
//! hot paths stay monomorphic and the on-disk tag maps 1:1 onto a variant.
//! Specialized encoders reject null-carrying arrays with `NullNotSupported`
//! and foreign types with `UnsupportedType`; the page writer catches both
//! codes and falls back to the general compressor.
//!
//! The `BssZstd` composite is the only sanctioned chain: byte-stream-split
//! then zstd, written under the `Zstd` tag (the chain's tag is its last
//! stage). [`decode`] disambiguates the two `Zstd` payload layouts by the
//! exact decompressed frame length.
//!
//! # Module Structure
//!
//! - [`rle`]: run-length encoding for integers
//! - [`bitpack`]: LSB-first bit-packing for non-negative integers
//! - [`dictionary`]: insertion-order dictionary encoding
//! - [`bss`]: byte-stream-split for floats
//! - [`compress`]: zstd general compressor (handles nulls and lists)
//! - [`factory`]: statistics-driven encoder selection

mod bitpack;
mod bss;
mod compress;
mod dictionary;
mod factory;
mod rle;

#[cfg(test)]
mod tests;

pub use factory::EncoderConfig;

use crate::array::{Array, DataType};
use crate::error::{Error, Result};
use crate::stats::ArrayStats;

/// On-disk encoding tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncodingType {
    /// Raw values. Reserved; never written and rejected on read.
    Plain = 0,
    /// Run-length encoding.
    Rle = 1,
    /// LSB-first bit-packing.
    BitPacked = 2,
    /// Insertion-order dictionary.
    Dictionary = 3,
    /// Byte-stream-split (standalone, uncompressed streams).
    ByteStreamSplit = 4,
    /// Delta encoding. Reserved for a future format revision.
    Delta = 5,
    /// zstd general compression (plain frame or byte-stream-split chain).
    Zstd = 6,
}

impl EncodingType {
    /// Parses an on-disk tag.
    ///
    /// # Errors
    ///
    /// Returns `CorruptedFile` for unknown tags.
    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Plain),
            1 => Ok(Self::Rle),
            2 => Ok(Self::BitPacked),
            3 => Ok(Self::Dictionary),
            4 => Ok(Self::ByteStreamSplit),
            5 => Ok(Self::Delta),
            6 => Ok(Self::Zstd),
            _ => Err(Error::corrupted(format!("unknown encoding tag {tag}"))
                .op("encoding::from_u8")),
        }
    }

    /// The on-disk tag byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for EncodingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Plain => "plain",
            Self::Rle => "rle",
            Self::BitPacked => "bit_packed",
            Self::Dictionary => "dictionary",
            Self::ByteStreamSplit => "byte_stream_split",
            Self::Delta => "delta",
            Self::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

/// A concrete encoder instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    /// Run-length encoding for integer arrays.
    Rle,
    /// Bit-packing at a fixed width for non-negative integers.
    BitPacked {
        /// Bits per value, in `[1, 64]`.
        bit_width: u8,
    },
    /// Insertion-order dictionary for integer/float arrays.
    Dictionary,
    /// Standalone byte-stream-split for float arrays.
    ByteStreamSplit,
    /// zstd over the raw-value frame; the only encoder that accepts nulls
    /// and fixed-size lists.
    Zstd {
        /// Compression level in `[1, 9]`.
        level: i32,
    },
    /// Byte-stream-split fused with zstd (the sanctioned chain).
    BssZstd {
        /// Compression level in `[1, 9]`.
        level: i32,
    },
}

impl Encoder {
    /// Tag written to the page header for payloads of this encoder.
    ///
    /// The chain is tagged with its final stage.
    #[must_use]
    pub const fn encoding(&self) -> EncodingType {
        match self {
            Self::Rle => EncodingType::Rle,
            Self::BitPacked { .. } => EncodingType::BitPacked,
            Self::Dictionary => EncodingType::Dictionary,
            Self::ByteStreamSplit => EncodingType::ByteStreamSplit,
            Self::Zstd { .. } | Self::BssZstd { .. } => EncodingType::Zstd,
        }
    }

    /// Returns true if this encoder can encode the given type.
    #[must_use]
    pub fn supports_type(&self, data_type: &DataType) -> bool {
        match self {
            Self::Rle | Self::BitPacked { .. } => data_type.is_integer(),
            Self::Dictionary => data_type.is_integer() || data_type.is_float(),
            Self::ByteStreamSplit | Self::BssZstd { .. } => data_type.is_float(),
            Self::Zstd { .. } => true,
        }
    }

    /// Returns true if this encoder accepts null-carrying arrays.
    #[must_use]
    pub const fn supports_null(&self) -> bool {
        matches!(self, Self::Zstd { .. })
    }

    /// Encodes an array into a payload byte string.
    ///
    /// # Errors
    ///
    /// `UnsupportedType` for types outside the encoder's domain,
    /// `NullNotSupported` for nulls fed to a specialized encoder,
    /// `InvalidArgument` for bit-packing domain violations, and
    /// `CompressionFailed` when zstd rejects the frame.
    pub fn encode(&self, array: &Array) -> Result<Vec<u8>> {
        let data_type = array.data_type();
        if !self.supports_type(&data_type) {
            return Err(Error::unsupported_type(&self.encoding().to_string(), data_type)
                .op("encoding::encode"));
        }
        if array.null_count() > 0 && !self.supports_null() {
            return Err(Error::null_not_supported(&self.encoding().to_string())
                .op("encoding::encode"));
        }
        match self {
            Self::Rle => rle::encode(array),
            Self::BitPacked { bit_width } => bitpack::encode(array, *bit_width),
            Self::Dictionary => dictionary::encode(array),
            Self::ByteStreamSplit => Ok(bss::encode(array)),
            Self::Zstd { level } => compress::encode(array, *level),
            Self::BssZstd { level } => compress::compress_frame(&bss::encode(array), *level),
        }
    }

    /// Best-effort payload size estimate without encoding.
    ///
    /// Used for page-split planning; accuracy is not contractual.
    #[must_use]
    pub fn estimate_size(&self, array: &Array, stats: Option<&ArrayStats>) -> usize {
        let n = array.len();
        let width = array.data_type().byte_width();
        match self {
            Self::Rle => {
                let runs = stats.map_or(n / 2 + 1, |s| s.run_count);
                4 + runs * (width + 4)
            }
            Self::BitPacked { bit_width } => 5 + (n * usize::from(*bit_width)).div_ceil(8),
            Self::Dictionary => {
                let distinct = stats.map_or(n, |s| s.cardinality.min(n));
                let index_size = if distinct <= usize::from(u16::MAX) { 2 } else { 4 };
                10 + distinct * width + n * index_size
            }
            Self::ByteStreamSplit => 4 + array.data_size(),
            // zstd on typical columnar data lands well below half; assume
            // half as a conservative planning figure.
            Self::Zstd { .. } | Self::BssZstd { .. } => 16 + array.data_size() / 2,
        }
    }
}

/// Decodes a page payload back into an array.
///
/// `num_values` is the element count declared by the page header; every
/// decoder verifies its reconstruction against it.
///
/// # Errors
///
/// `NotSupported` for the `Plain` and `Delta` tags, `DecodeFailed` /
/// `CorruptedFile` for malformed payloads.
pub fn decode(
    encoding: EncodingType,
    data_type: &DataType,
    payload: &[u8],
    num_values: usize,
) -> Result<Array> {
    match encoding {
        EncodingType::Plain => {
            Err(Error::not_supported("plain encoding is reserved and never valid on disk")
                .op("encoding::decode"))
        }
        EncodingType::Delta => {
            Err(Error::not_supported("delta encoding is reserved and not implemented")
                .op("encoding::decode"))
        }
        EncodingType::Rle => rle::decode(data_type, payload, num_values),
        EncodingType::BitPacked => bitpack::decode(data_type, payload, num_values),
        EncodingType::Dictionary => dictionary::decode(data_type, payload, num_values),
        EncodingType::ByteStreamSplit => bss::decode(data_type, payload, num_values),
        EncodingType::Zstd => compress::decode(data_type, payload, num_values),
    }
}

/// Selects an encoder for a type/statistics pair. See [`EncoderConfig`].
#[must_use]
pub fn select_encoder(
    config: &EncoderConfig,
    data_type: &DataType,
    stats: Option<&ArrayStats>,
) -> Encoder {
    factory::select(config, data_type, stats)
}

/// Rejects null-carrying arrays on behalf of specialized encoders.
pub(crate) fn ensure_no_nulls(array: &Array, encoding: &str) -> Result<()> {
    if array.null_count() > 0 {
        return Err(Error::null_not_supported(encoding).op("encoding::encode"));
    }
    Ok(())
}
