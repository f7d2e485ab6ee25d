//! Insertion-order dictionary encoding for integer and float arrays.
//!
//! Payload layout (all little-endian):
//!
//! ```text
//! [value_size: u8][num_entries: u32][num_values: u32][index_size: u8]
//! [dictionary entries, value_size bytes each][index array, index_size bytes each]
//! ```
//!
//! `index_size` is 2 when the dictionary holds at most 65535 entries,
//! otherwise 4. Dictionary keys compare by bit pattern, so NaN maps to a
//! single entry.

use crate::array::{Array, DataType};
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;

pub(super) fn encode(array: &Array) -> Result<Vec<u8>> {
    super::ensure_no_nulls(array, "dictionary")?;

    let value_size = match array.data_type() {
        DataType::Int32 | DataType::Float32 => 4u8,
        DataType::Int64 | DataType::Float64 => 8u8,
        other => {
            return Err(Error::unsupported_type("dictionary", other).op("dictionary::encode"));
        }
    };

    // Bit patterns keyed in insertion order.
    let bits: Vec<u64> = match array {
        Array::Int32 { values, .. } => values.iter().map(|&v| u64::from(v as u32)).collect(),
        Array::Int64 { values, .. } => values.iter().map(|&v| v as u64).collect(),
        Array::Float32 { values, .. } => values.iter().map(|&v| u64::from(v.to_bits())).collect(),
        Array::Float64 { values, .. } => values.iter().map(|&v| v.to_bits()).collect(),
        Array::FixedSizeList { .. } => unreachable!("guarded above"),
    };

    let mut codes: FxHashMap<u64, u32> = FxHashMap::default();
    let mut entries: Vec<u64> = Vec::new();
    let mut indices: Vec<u32> = Vec::with_capacity(bits.len());
    for &b in &bits {
        let code = *codes.entry(b).or_insert_with(|| {
            entries.push(b);
            (entries.len() - 1) as u32
        });
        indices.push(code);
    }

    let index_size: u8 = if entries.len() <= usize::from(u16::MAX) { 2 } else { 4 };

    let mut buf = Vec::with_capacity(
        10 + entries.len() * usize::from(value_size) + indices.len() * usize::from(index_size),
    );
    buf.push(value_size);
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(indices.len() as u32).to_le_bytes());
    buf.push(index_size);
    for &entry in &entries {
        buf.extend_from_slice(&entry.to_le_bytes()[..usize::from(value_size)]);
    }
    for &idx in &indices {
        if index_size == 2 {
            #[allow(clippy::cast_possible_truncation)]
            buf.extend_from_slice(&(idx as u16).to_le_bytes());
        } else {
            buf.extend_from_slice(&idx.to_le_bytes());
        }
    }
    Ok(buf)
}

pub(super) fn decode(data_type: &DataType, payload: &[u8], num_values: usize) -> Result<Array> {
    if payload.len() < 10 {
        return Err(
            Error::decode_failed("dictionary payload shorter than its header")
                .op("dictionary::decode"),
        );
    }
    let value_size = usize::from(payload[0]);
    let num_entries = u32::from_le_bytes(payload[1..5].try_into().unwrap()) as usize;
    let declared = u32::from_le_bytes(payload[5..9].try_into().unwrap()) as usize;
    let index_size = usize::from(payload[9]);

    if value_size != data_type.byte_width() {
        return Err(Error::decode_failed(format!(
            "dictionary value size {value_size} does not match type {data_type}"
        ))
        .op("dictionary::decode"));
    }
    if index_size != 2 && index_size != 4 {
        return Err(
            Error::decode_failed(format!("dictionary index size {index_size} is invalid"))
                .op("dictionary::decode"),
        );
    }
    if declared != num_values {
        return Err(Error::decode_failed(format!(
            "dictionary payload declares {declared} values, page declares {num_values}"
        ))
        .op("dictionary::decode"));
    }
    let expected_len = 10 + num_entries * value_size + num_values * index_size;
    if payload.len() != expected_len {
        return Err(Error::decode_failed(format!(
            "dictionary payload is {} bytes, expected {expected_len}",
            payload.len()
        ))
        .op("dictionary::decode"));
    }

    let dict_bytes = &payload[10..10 + num_entries * value_size];
    let index_bytes = &payload[10 + num_entries * value_size..];

    let mut entries = Vec::with_capacity(num_entries);
    for chunk in dict_bytes.chunks_exact(value_size) {
        let mut raw = [0u8; 8];
        raw[..value_size].copy_from_slice(chunk);
        entries.push(u64::from_le_bytes(raw));
    }

    let mut values = Vec::with_capacity(num_values);
    for chunk in index_bytes.chunks_exact(index_size) {
        let idx = if index_size == 2 {
            usize::from(u16::from_le_bytes([chunk[0], chunk[1]]))
        } else {
            u32::from_le_bytes(chunk.try_into().unwrap()) as usize
        };
        let entry = *entries.get(idx).ok_or_else(|| {
            Error::decode_failed(format!(
                "dictionary index {idx} out of range ({num_entries} entries)"
            ))
            .op("dictionary::decode")
        })?;
        values.push(entry);
    }

    #[allow(clippy::cast_possible_truncation)]
    let array = match data_type {
        DataType::Int32 => Array::int32(values.iter().map(|&v| v as u32 as i32).collect()),
        DataType::Int64 => Array::int64(values.iter().map(|&v| v as i64).collect()),
        DataType::Float32 => {
            Array::float32(values.iter().map(|&v| f32::from_bits(v as u32)).collect())
        }
        DataType::Float64 => Array::float64(values.iter().map(|&v| f64::from_bits(v)).collect()),
        other => {
            return Err(Error::unsupported_type("dictionary", other).op("dictionary::decode"));
        }
    };
    Ok(array)
}
