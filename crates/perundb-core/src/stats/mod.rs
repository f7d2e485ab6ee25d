//! Per-array statistics driving encoder selection.
//!
//! The statistics engine computes a cheap summary of an array: chunked bit
//! widths, run count, approximate cardinality, and per-byte-position
//! entropy. The encoder factory consumes the derived ratios; none of the
//! numbers here need to be exact, they need to be directionally right.
//!
//! Value comparisons inside this module are done on bit patterns, so NaN is
//! self-equal (correct for run counting) and +0/-0 collide (intentional).

mod hll;


pub use hll::Hll;

use crate::array::Array;
use crate::error::{Error, Result};

/// Values per bit-width chunk.
pub const CHUNK_SIZE: usize = 1024;

/// Above `CHUNK_SIZE * MAX_CHUNKS` values the bit-width sweep samples
/// chunks uniformly instead of scanning all of them.
pub const MAX_CHUNKS: usize = 10_000;

/// Number of values sampled for byte-position entropy.
const ENTROPY_SAMPLES: usize = 64;

/// Summary statistics for one array.
#[derive(Debug, Clone)]
pub struct ArrayStats {
    /// Number of values covered (flattened child count for lists).
    pub num_values: usize,
    /// Number of null elements (list-level for lists).
    pub null_count: usize,
    /// Significant-bit width per `CHUNK_SIZE` chunk (meaningful for
    /// non-negative integers; a sign bit saturates the chunk).
    pub bit_widths: Vec<u8>,
    /// Raw value bytes.
    pub data_size: usize,
    /// Number of consecutive-equal runs (bit-pattern comparison).
    pub run_count: usize,
    /// Approximate distinct-value count (HyperLogLog, 16 registers).
    pub cardinality: usize,
    /// Shannon entropy per byte position, scaled by 1000.
    pub byte_entropy: Vec<u32>,
}

impl ArrayStats {
    /// Computes statistics for an array.
    ///
    /// Fixed-size lists are measured over the flattened child array;
    /// `num_values` is the child count and `null_count` the list-level
    /// null count.
    #[must_use]
    pub fn compute(array: &Array) -> Self {
        if let Array::FixedSizeList { child, .. } = array {
            let mut stats = Self::compute(child);
            stats.null_count = array.null_count();
            return stats;
        }

        let bits = value_bits(array);
        let width = array.data_type().byte_width();

        let mut hll = Hll::new();
        let mut run_count = 0usize;
        let mut prev = None;
        for &b in &bits {
            hll.add(b);
            if prev != Some(b) {
                run_count += 1;
                prev = Some(b);
            }
        }

        Self {
            num_values: array.len(),
            null_count: array.null_count(),
            bit_widths: chunked_bit_widths(&bits),
            data_size: array.data_size(),
            run_count,
            cardinality: hll.estimate(),
            byte_entropy: byte_position_entropy(&bits, width),
        }
    }

    /// Largest chunk bit width.
    #[must_use]
    pub fn max_bit_width(&self) -> u8 {
        self.bit_widths.iter().copied().max().unwrap_or(0)
    }

    /// `run_count / num_values`; low values mean long runs.
    #[must_use]
    pub fn run_ratio(&self) -> f64 {
        if self.num_values == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.run_count as f64 / self.num_values as f64
        }
    }

    /// `cardinality / num_values`; low values mean few distinct values.
    #[must_use]
    pub fn cardinality_ratio(&self) -> f64 {
        if self.num_values == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.cardinality as f64 / self.num_values as f64
        }
    }

    /// Mean byte-position entropy in bits.
    #[must_use]
    pub fn avg_entropy(&self) -> f64 {
        if self.byte_entropy.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            let sum: f64 = self.byte_entropy.iter().map(|&e| f64::from(e)).sum();
            sum / self.byte_entropy.len() as f64 / 1000.0
        }
    }

    /// Guards against nonsense summaries before they reach the factory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the summary is internally
    /// inconsistent (the HLL tolerance allows cardinality up to twice the
    /// value count).
    pub fn validate(&self) -> Result<()> {
        if self.run_count > self.num_values {
            return Err(Error::invalid_argument(format!(
                "run count {} exceeds value count {}",
                self.run_count, self.num_values
            ))
            .op("stats::validate"));
        }
        if self.cardinality > 2 * self.num_values.max(1) {
            return Err(Error::invalid_argument(format!(
                "cardinality estimate {} exceeds twice the value count {}",
                self.cardinality, self.num_values
            ))
            .op("stats::validate"));
        }
        if self.null_count > self.num_values {
            return Err(Error::invalid_argument(format!(
                "null count {} exceeds value count {}",
                self.null_count, self.num_values
            ))
            .op("stats::validate"));
        }
        if self.byte_entropy.iter().any(|&e| e > 8000) {
            return Err(Error::invalid_argument(
                "byte entropy above 8 bits is impossible",
            )
            .op("stats::validate"));
        }
        Ok(())
    }
}

/// Canonical 64-bit patterns for every value slot.
///
/// Integers widen through their unsigned representation (a negative value
/// therefore reports full width); floats contribute their IEEE bits.
fn value_bits(array: &Array) -> Vec<u64> {
    match array {
        Array::Int32 { values, .. } => values.iter().map(|&v| u64::from(v as u32)).collect(),
        Array::Int64 { values, .. } => values.iter().map(|&v| v as u64).collect(),
        Array::Float32 { values, .. } => {
            values.iter().map(|&v| u64::from(v.to_bits())).collect()
        }
        Array::Float64 { values, .. } => values.iter().map(|&v| v.to_bits()).collect(),
        Array::FixedSizeList { child, .. } => value_bits(child),
    }
}

/// OR-accumulated significant-bit width per chunk, sampling chunks
/// uniformly once the array exceeds `CHUNK_SIZE * MAX_CHUNKS` values.
fn chunked_bit_widths(bits: &[u64]) -> Vec<u8> {
    if bits.is_empty() {
        return Vec::new();
    }
    let chunks: Vec<&[u64]> = bits.chunks(CHUNK_SIZE).collect();
    let stride = chunks.len().div_ceil(MAX_CHUNKS).max(1);

    chunks
        .iter()
        .step_by(stride)
        .map(|chunk| {
            let acc = chunk.iter().fold(0u64, |a, &b| a | b);
            #[allow(clippy::cast_possible_truncation)]
            let width = (64 - acc.leading_zeros()) as u8;
            width.max(1)
        })
        .collect()
}

/// Shannon entropy of each byte position over a uniform sample of values.
///
/// Sampling is strided across the whole array rather than taken from the
/// front, so ordered data does not bias the estimate.
fn byte_position_entropy(bits: &[u64], byte_width: usize) -> Vec<u32> {
    if bits.is_empty() {
        return vec![0; byte_width];
    }
    let stride = (bits.len() / ENTROPY_SAMPLES).max(1);
    let samples: Vec<u64> = bits.iter().step_by(stride).take(ENTROPY_SAMPLES).copied().collect();

    (0..byte_width)
        .map(|pos| {
            let mut counts = [0u32; 256];
            for &v in &samples {
                let byte = ((v >> (8 * pos)) & 0xFF) as usize;
                counts[byte] += 1;
            }
            #[allow(clippy::cast_precision_loss)]
            let total = samples.len() as f64;
            let entropy: f64 = counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = f64::from(c) / total;
                    -p * p.log2()
                })
                .sum();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                (entropy * 1000.0).round() as u32
            }
        })
        .collect()
}
