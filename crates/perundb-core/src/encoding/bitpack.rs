//! LSB-first bit-packing for non-negative integer arrays.
//!
//! Payload layout:
//!
//! ```text
//! [bit_width: u8][num_values: u32 LE][packed bits, LSB-first across bytes]
//! ```
//!
//! Values must be non-negative and strictly below `2^bit_width`; violations
//! are caller errors (`InvalidArgument`), not fallback triggers.

use crate::array::{Array, DataType};
use crate::error::{Error, Result};

pub(super) fn encode(array: &Array, bit_width: u8) -> Result<Vec<u8>> {
    super::ensure_no_nulls(array, "bit_packed")?;
    if !(1..=64).contains(&bit_width) {
        return Err(Error::invalid_argument(format!(
            "bit width must be in [1, 64], got {bit_width}"
        ))
        .op("bitpack::encode"));
    }

    let values: Vec<u64> = match array {
        Array::Int32 { values, .. } => values
            .iter()
            .map(|&v| widen(i64::from(v), bit_width))
            .collect::<Result<_>>()?,
        Array::Int64 { values, .. } => values
            .iter()
            .map(|&v| widen(v, bit_width))
            .collect::<Result<_>>()?,
        _ => {
            return Err(
                Error::unsupported_type("bit_packed", array.data_type()).op("bitpack::encode")
            );
        }
    };

    let width = usize::from(bit_width);
    let mut buf = vec![0u8; 5 + (values.len() * width).div_ceil(8)];
    buf[0] = bit_width;
    buf[1..5].copy_from_slice(&(values.len() as u32).to_le_bytes());

    let mut bit_pos = 0usize;
    for v in values {
        for b in 0..width {
            if v >> b & 1 == 1 {
                buf[5 + bit_pos / 8] |= 1 << (bit_pos % 8);
            }
            bit_pos += 1;
        }
    }
    Ok(buf)
}

fn widen(v: i64, bit_width: u8) -> Result<u64> {
    if v < 0 {
        return Err(
            Error::invalid_argument(format!("bit-packing rejects negative value {v}"))
                .op("bitpack::encode"),
        );
    }
    #[allow(clippy::cast_sign_loss)]
    let u = v as u64;
    if bit_width < 64 && u >= 1u64 << bit_width {
        return Err(Error::invalid_argument(format!(
            "value {v} does not fit in {bit_width} bits"
        ))
        .op("bitpack::encode"));
    }
    Ok(u)
}

pub(super) fn decode(data_type: &DataType, payload: &[u8], num_values: usize) -> Result<Array> {
    if payload.len() < 5 {
        return Err(
            Error::decode_failed("bit-packed payload shorter than its header")
                .op("bitpack::decode"),
        );
    }
    let bit_width = payload[0];
    if !(1..=64).contains(&bit_width) {
        return Err(
            Error::decode_failed(format!("bit width {bit_width} out of range"))
                .op("bitpack::decode"),
        );
    }
    let declared = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]) as usize;
    if declared != num_values {
        return Err(Error::decode_failed(format!(
            "bit-packed payload declares {declared} values, page declares {num_values}"
        ))
        .op("bitpack::decode"));
    }
    let width = usize::from(bit_width);
    let expected_len = 5 + (num_values * width).div_ceil(8);
    if payload.len() != expected_len {
        return Err(Error::decode_failed(format!(
            "bit-packed payload is {} bytes, expected {expected_len}",
            payload.len()
        ))
        .op("bitpack::decode"));
    }

    let packed = &payload[5..];
    let mut values = Vec::with_capacity(num_values);
    let mut bit_pos = 0usize;
    for _ in 0..num_values {
        let mut v = 0u64;
        for b in 0..width {
            if packed[bit_pos / 8] >> (bit_pos % 8) & 1 == 1 {
                v |= 1 << b;
            }
            bit_pos += 1;
        }
        values.push(v);
    }

    match data_type {
        DataType::Int32 => {
            let narrowed: Result<Vec<i32>> = values
                .iter()
                .map(|&v| {
                    i32::try_from(v).map_err(|_| {
                        Error::decode_failed(format!("unpacked value {v} overflows int32"))
                            .op("bitpack::decode")
                    })
                })
                .collect();
            Ok(Array::int32(narrowed?))
        }
        DataType::Int64 => {
            let narrowed: Result<Vec<i64>> = values
                .iter()
                .map(|&v| {
                    i64::try_from(v).map_err(|_| {
                        Error::decode_failed(format!("unpacked value {v} overflows int64"))
                            .op("bitpack::decode")
                    })
                })
                .collect();
            Ok(Array::int64(narrowed?))
        }
        other => Err(Error::unsupported_type("bit_packed", other).op("bitpack::decode")),
    }
}
