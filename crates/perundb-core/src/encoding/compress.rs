//! zstd general compression.
//!
//! The only encoder that accepts every physical type and null-carrying
//! arrays. The frame compressed by zstd is:
//!
//! ```text
//! [num_values: u32 LE][raw values LE][null_bitmap_len: u16 LE][null_bitmap]
//! ```
//!
//! For fixed-size lists the raw values are the flattened child bytes and
//! the bitmap is the list-level validity.
//!
//! A `Zstd`-tagged float page may instead hold the byte-stream-split chain
//! frame (`[num_values u32][streams]`). The two layouts never share a
//! length for the same value count: the split frame is exactly
//! `4 + n * B` bytes while the general frame always carries at least the
//! trailing bitmap-length u16. [`decode`] discriminates on that length.

use super::bss;
use crate::array::{Array, Bitmap, DataType};
use crate::error::{Error, Result};

/// Lowest accepted zstd level.
pub(super) const MIN_LEVEL: i32 = 1;
/// Highest accepted zstd level.
pub(super) const MAX_LEVEL: i32 = 9;

pub(super) fn encode(array: &Array, level: i32) -> Result<Vec<u8>> {
    let n = array.len();
    let raw = array.value_bytes();
    let bitmap_bytes: &[u8] = array.validity().map_or(&[], Bitmap::as_bytes);
    if bitmap_bytes.len() > usize::from(u16::MAX) {
        return Err(Error::encode_failed(format!(
            "null bitmap of {} bytes exceeds the u16 length field",
            bitmap_bytes.len()
        ))
        .op("compress::encode"));
    }

    let mut frame = Vec::with_capacity(4 + raw.len() + 2 + bitmap_bytes.len());
    frame.extend_from_slice(&(n as u32).to_le_bytes());
    frame.extend_from_slice(&raw);
    frame.extend_from_slice(&(bitmap_bytes.len() as u16).to_le_bytes());
    frame.extend_from_slice(bitmap_bytes);

    compress_frame(&frame, level)
}

/// Compresses an already-built frame (used directly by the BSS chain).
pub(super) fn compress_frame(frame: &[u8], level: i32) -> Result<Vec<u8>> {
    let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
    zstd::encode_all(frame, level).map_err(|e| {
        Error::new(
            crate::error::ErrorCode::CompressionFailed,
            "zstd compression failed",
        )
        .op("compress::encode")
        .caused_by(e)
    })
}

pub(super) fn decode(data_type: &DataType, payload: &[u8], num_values: usize) -> Result<Array> {
    let frame = zstd::decode_all(payload).map_err(|e| {
        Error::corrupted("zstd decompression failed")
            .op("compress::decode")
            .caused_by(e)
    })?;

    // A float page tagged zstd may hold the byte-stream-split chain; the
    // frame lengths are disjoint, so the length decides.
    if data_type.is_float() && frame.len() == bss::frame_len(data_type, num_values) {
        return bss::decode(data_type, &frame, num_values);
    }

    if frame.len() < 6 {
        return Err(Error::decode_failed("compressed frame shorter than its envelope")
            .op("compress::decode"));
    }
    let declared = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    if declared != num_values {
        return Err(Error::decode_failed(format!(
            "compressed frame declares {declared} values, page declares {num_values}"
        ))
        .op("compress::decode"));
    }

    let raw_len = data_type.byte_width() * num_values;
    let bitmap_len_at = 4 + raw_len;
    if frame.len() < bitmap_len_at + 2 {
        return Err(Error::decode_failed(format!(
            "compressed frame is {} bytes, expected at least {}",
            frame.len(),
            bitmap_len_at + 2
        ))
        .op("compress::decode"));
    }
    let bitmap_len =
        usize::from(u16::from_le_bytes([frame[bitmap_len_at], frame[bitmap_len_at + 1]]));
    if frame.len() != bitmap_len_at + 2 + bitmap_len {
        return Err(Error::decode_failed(format!(
            "compressed frame is {} bytes, expected {}",
            frame.len(),
            bitmap_len_at + 2 + bitmap_len
        ))
        .op("compress::decode"));
    }

    let validity = if bitmap_len == 0 {
        None
    } else {
        if bitmap_len != num_values.div_ceil(8) {
            return Err(Error::decode_failed(format!(
                "null bitmap is {bitmap_len} bytes, expected {} for {num_values} values",
                num_values.div_ceil(8)
            ))
            .op("compress::decode"));
        }
        Some(Bitmap::from_bytes(
            &frame[bitmap_len_at + 2..],
            num_values,
        ))
    };

    Array::from_le_bytes(data_type, &frame[4..4 + raw_len], num_values, validity)
}
