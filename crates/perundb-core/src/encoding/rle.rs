//! Run-length encoding for integer arrays.
//!
//! Payload layout (all little-endian):
//!
//! ```text
//! [num_runs: u32] { value: 4|8 bytes, run_length: u32 }*
//! ```
//!
//! The value width follows the array type (4 bytes for int32, 8 for int64).

use crate::array::{Array, DataType};
use crate::error::{Error, Result};

pub(super) fn encode(array: &Array) -> Result<Vec<u8>> {
    super::ensure_no_nulls(array, "rle")?;
    match array {
        Array::Int32 { values, .. } => Ok(encode_runs(values, |v, buf| {
            buf.extend_from_slice(&v.to_le_bytes());
        })),
        Array::Int64 { values, .. } => Ok(encode_runs(values, |v, buf| {
            buf.extend_from_slice(&v.to_le_bytes());
        })),
        _ => Err(Error::unsupported_type("rle", array.data_type()).op("rle::encode")),
    }
}

fn encode_runs<T: Copy + PartialEq>(values: &[T], write: impl Fn(T, &mut Vec<u8>)) -> Vec<u8> {
    let mut runs: Vec<(T, u32)> = Vec::new();
    for &v in values {
        match runs.last_mut() {
            Some((last, count)) if *last == v && *count < u32::MAX => *count += 1,
            _ => runs.push((v, 1)),
        }
    }

    let mut buf = Vec::with_capacity(4 + runs.len() * 12);
    buf.extend_from_slice(&(runs.len() as u32).to_le_bytes());
    for (value, count) in runs {
        write(value, &mut buf);
        buf.extend_from_slice(&count.to_le_bytes());
    }
    buf
}

pub(super) fn decode(data_type: &DataType, payload: &[u8], num_values: usize) -> Result<Array> {
    let value_width = match data_type {
        DataType::Int32 => 4,
        DataType::Int64 => 8,
        other => {
            return Err(Error::unsupported_type("rle", other).op("rle::decode"));
        }
    };

    if payload.len() < 4 {
        return Err(Error::decode_failed("rle payload shorter than its header").op("rle::decode"));
    }
    let num_runs = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let expected_len = 4 + num_runs * (value_width + 4);
    if payload.len() != expected_len {
        return Err(Error::decode_failed(format!(
            "rle payload is {} bytes, expected {expected_len} for {num_runs} runs",
            payload.len()
        ))
        .op("rle::decode"));
    }

    let mut total = 0usize;
    let mut cursor = 4;
    match data_type {
        DataType::Int32 => {
            let mut values = Vec::with_capacity(num_values);
            for _ in 0..num_runs {
                let value = i32::from_le_bytes(payload[cursor..cursor + 4].try_into().unwrap());
                let count = run_length(payload, cursor + 4)?;
                total += count;
                if total > num_values {
                    return Err(overflow(total, num_values));
                }
                values.extend(std::iter::repeat_n(value, count));
                cursor += 8;
            }
            finish(total, num_values)?;
            Ok(Array::int32(values))
        }
        DataType::Int64 => {
            let mut values = Vec::with_capacity(num_values);
            for _ in 0..num_runs {
                let value = i64::from_le_bytes(payload[cursor..cursor + 8].try_into().unwrap());
                let count = run_length(payload, cursor + 8)?;
                total += count;
                if total > num_values {
                    return Err(overflow(total, num_values));
                }
                values.extend(std::iter::repeat_n(value, count));
                cursor += 12;
            }
            finish(total, num_values)?;
            Ok(Array::int64(values))
        }
        _ => unreachable!("guarded above"),
    }
}

fn run_length(payload: &[u8], at: usize) -> Result<usize> {
    let count = u32::from_le_bytes(payload[at..at + 4].try_into().unwrap()) as usize;
    if count == 0 {
        return Err(Error::decode_failed("rle run with zero length").op("rle::decode"));
    }
    Ok(count)
}

fn overflow(total: usize, num_values: usize) -> Error {
    Error::decode_failed(format!(
        "rle runs expand to at least {total} values, page declares {num_values}"
    ))
    .op("rle::decode")
}

fn finish(total: usize, num_values: usize) -> Result<()> {
    if total != num_values {
        return Err(Error::decode_failed(format!(
            "rle runs expand to {total} values, page declares {num_values}"
        ))
        .op("rle::decode"));
    }
    Ok(())
}
