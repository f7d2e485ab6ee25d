//! Distance metrics for vector similarity calculations.
//!
//! All metrics are oriented so that **smaller means more similar**: the
//! inner-product kernel negates the dot product, and the cosine kernel
//! returns `1 - cos(a, b)`. This lets the index use a single `<` comparator
//! everywhere.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Distance metric for vector similarity calculations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance (no square root on the hot path; the
    /// square is monotone in the true metric).
    #[default]
    L2Squared,

    /// Negated inner product. Best for maximum inner product search (MIPS).
    InnerProduct,

    /// Cosine distance (`1 - cosine_similarity`). Best for normalized
    /// embeddings.
    Cosine,
}

impl DistanceMetric {
    /// Calculates the distance between two vectors.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vectors have different lengths.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(Error::dimension_mismatch(a.len(), b.len()).op("distance"));
        }
        Ok(self.distance_unchecked(a, b))
    }

    /// Calculates the distance between two equal-length vectors.
    ///
    /// The index validates dimensions once at its boundary, so the per-hop
    /// kernels skip the length check. Callers must guarantee
    /// `a.len() == b.len()`.
    #[inline]
    #[must_use]
    pub fn distance_unchecked(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::L2Squared => l2_squared(a, b),
            Self::InnerProduct => inner_product_distance(a, b),
            Self::Cosine => cosine_distance(a, b),
        }
    }
}

/// Squared L2 distance: `sum((a[i] - b[i])^2)`.
#[inline]
fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Negated dot product so that smaller is more similar.
#[inline]
fn inner_product_distance(a: &[f32], b: &[f32]) -> f32 {
    -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
}

/// Cosine distance: `1 - (a . b) / (|a| * |b|)`.
///
/// Returns 1.0 when either vector has zero norm.
#[inline]
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
