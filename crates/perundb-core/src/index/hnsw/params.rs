//! HNSW parameters and adaptive tuning.
//!
//! Use [`HnswParams::adaptive`] to derive `M` and `ef_construction` from
//! the vector dimension and the expected collection size, or set them
//! explicitly for a known workload.

use crate::distance::DistanceMetric;
use serde::{Deserialize, Serialize};

/// Level cap for the layer hierarchy.
pub(super) const MAX_LEVEL: u8 = 16;

/// HNSW construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswParams {
    /// Target out-degree per node at non-zero layers. Layer 0 allows `2M`.
    pub m: usize,
    /// Beam width while linking a newly inserted node.
    pub ef_construction: usize,
    /// Distance metric for construction and search.
    pub metric: DistanceMetric,
    /// Seed for the level-draw RNG; a fixed seed makes single-threaded
    /// insertion orders reproducible.
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            metric: DistanceMetric::L2Squared,
            seed: 0x5DEE_CE66_D1A4_B5B5,
        }
    }
}

impl HnswParams {
    /// Derives parameters from the dimension and expected collection size.
    ///
    /// Wider vectors get more connections; larger collections get a deeper
    /// construction beam. Both curves are capped (`M <= 64`,
    /// `ef_construction <= 800`).
    #[must_use]
    pub fn adaptive(dimension: usize, expected_size: usize) -> Self {
        let m = match dimension {
            0..=128 => 16,
            129..=512 => 24,
            513..=1024 => 32,
            _ => 48,
        }
        .min(64);

        let mut ef = 200.0f64;
        if expected_size > 10_000 {
            #[allow(clippy::cast_precision_loss)]
            let scale = (expected_size as f64 / 10_000.0).log10();
            ef += 200.0 * scale;
        }
        if expected_size > 50_000 {
            ef *= 1.3;
        }
        if dimension > 512 {
            ef *= 1.5;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ef_construction = (ef.min(800.0)).round() as usize;

        Self {
            m,
            ef_construction,
            ..Self::default()
        }
    }

    /// Sets the distance metric.
    #[must_use]
    pub const fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Query-time `ef` derived from `k` and the current index size, clamped to
/// `[2k, 1000]`.
#[must_use]
pub fn adaptive_ef(k: usize, index_size: usize) -> usize {
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 + 0.5 * (index_size as f64 / 1000.0 + 1.0).log10();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ef = (2.0 * k as f64 * scale).round() as usize;
    ef.clamp(2 * k, 1000.max(2 * k))
}
