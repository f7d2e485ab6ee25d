//! Statistics-driven encoder selection.
//!
//! Selection is a pure function of type + statistics; the thresholds are
//! configuration knobs surfaced through [`crate::config`].

use super::Encoder;
use crate::array::DataType;
use crate::stats::ArrayStats;
use serde::{Deserialize, Serialize};

/// Tunable thresholds for encoder selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Largest chunk bit width eligible for bit-packing.
    pub bit_packing_max_bit_width: u8,
    /// Run ratio below which RLE wins over the later branches.
    pub rle_threshold: f64,
    /// Run ratio below which RLE wins immediately.
    pub rle_early_threshold: f64,
    /// Cardinality ratio below which dictionary encoding is attractive.
    pub dictionary_threshold: f64,
    /// Largest dictionary (distinct values) worth building.
    pub dictionary_max_size: usize,
    /// Mean byte entropy (bits) below which floats go through
    /// byte-stream-split before compression.
    pub bss_entropy_threshold: f64,
    /// Arrays smaller than this skip selection and go straight to the
    /// general compressor.
    pub small_data_threshold: usize,
    /// zstd level for the general compressor, clamped to `[1, 9]`.
    pub compression_level: i32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            bit_packing_max_bit_width: 16,
            rle_threshold: 0.5,
            rle_early_threshold: 0.1,
            dictionary_threshold: 0.5,
            dictionary_max_size: 1 << 20,
            bss_entropy_threshold: 4.0,
            small_data_threshold: 100,
            compression_level: 3,
        }
    }
}

/// Chooses an encoder for the given type and statistics.
///
/// Decision order: no/insufficient statistics and fixed-size lists take the
/// general compressor; integers walk RLE → dictionary → bit-packing →
/// dictionary → RLE by their ratios; floats split on byte entropy.
pub(super) fn select(
    config: &EncoderConfig,
    data_type: &DataType,
    stats: Option<&ArrayStats>,
) -> Encoder {
    let zstd = Encoder::Zstd {
        level: config.compression_level,
    };

    let Some(stats) = stats else {
        return zstd;
    };
    if stats.num_values < config.small_data_threshold {
        return zstd;
    }
    // Delegating list pages to a child-type encoder would need per-slot
    // offsets the page format does not carry; lists always compress whole.
    if data_type.is_fixed_size_list() {
        return zstd;
    }

    if data_type.is_integer() {
        if stats.run_ratio() < config.rle_early_threshold {
            return Encoder::Rle;
        }
        if stats.cardinality_ratio() < 0.1 {
            if stats.cardinality <= config.dictionary_max_size {
                return Encoder::Dictionary;
            }
            return zstd;
        }
        if stats.max_bit_width() <= config.bit_packing_max_bit_width {
            return Encoder::BitPacked {
                bit_width: stats.max_bit_width(),
            };
        }
        if stats.cardinality_ratio() < config.dictionary_threshold {
            if stats.cardinality <= config.dictionary_max_size {
                return Encoder::Dictionary;
            }
            return zstd;
        }
        if stats.run_ratio() < config.rle_threshold {
            return Encoder::Rle;
        }
        return zstd;
    }

    if data_type.is_float() {
        if stats.avg_entropy() < config.bss_entropy_threshold {
            return Encoder::BssZstd {
                level: config.compression_level,
            };
        }
        return zstd;
    }

    zstd
}
