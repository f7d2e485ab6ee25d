//! Byte-stream-split for float arrays.
//!
//! Splits each value into one stream per byte position; exponent bytes end
//! up adjacent to each other, which a downstream general compressor can
//! exploit. Payload layout:
//!
//! ```text
//! [num_values: u32 LE][stream_0][stream_1]...[stream_{B-1}]
//! ```
//!
//! where `B` is 4 for float32 and 8 for float64. The factory only emits
//! this codec fused with zstd (the `BssZstd` chain), but the frame is
//! independently decodable.

use crate::array::{Array, DataType};
use crate::error::{Error, Result};

/// Splits an array into the byte-stream frame. Callers guarantee the type
/// and null checks (`Encoder::encode` runs them).
pub(super) fn encode(array: &Array) -> Vec<u8> {
    let raw = array.value_bytes();
    let width = array.data_type().byte_width();
    let n = array.len();

    let mut buf = Vec::with_capacity(4 + raw.len());
    buf.extend_from_slice(&(n as u32).to_le_bytes());
    for stream in 0..width {
        for value in 0..n {
            buf.push(raw[value * width + stream]);
        }
    }
    buf
}

/// Exact frame length for `num_values` values of the given type.
pub(super) fn frame_len(data_type: &DataType, num_values: usize) -> usize {
    4 + num_values * data_type.byte_width()
}

pub(super) fn decode(data_type: &DataType, payload: &[u8], num_values: usize) -> Result<Array> {
    let width = match data_type {
        DataType::Float32 => 4,
        DataType::Float64 => 8,
        other => {
            return Err(Error::unsupported_type("byte_stream_split", other).op("bss::decode"));
        }
    };

    if payload.len() < 4 {
        return Err(Error::decode_failed("byte-stream-split payload shorter than its header")
            .op("bss::decode"));
    }
    let declared = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    if declared != num_values {
        return Err(Error::decode_failed(format!(
            "byte-stream-split payload declares {declared} values, page declares {num_values}"
        ))
        .op("bss::decode"));
    }
    if payload.len() != frame_len(data_type, num_values) {
        return Err(Error::decode_failed(format!(
            "byte-stream-split payload is {} bytes, expected {}",
            payload.len(),
            frame_len(data_type, num_values)
        ))
        .op("bss::decode"));
    }

    let streams = &payload[4..];
    let mut raw = vec![0u8; num_values * width];
    for stream in 0..width {
        for value in 0..num_values {
            raw[value * width + stream] = streams[stream * num_values + value];
        }
    }

    Array::from_le_bytes(data_type, &raw, num_values, None)
}
