//! Ordered float wrapper for the search heaps.
//!
//! `f32::total_cmp` supplies an IEEE 754 total order (NaN included), which
//! keeps `Ord`/`Eq` consistent and the binary heaps sound even when a
//! degenerate distance sneaks in.

use std::cmp::Ordering;

/// f32 wrapper carrying a total order for use as a heap key.
#[derive(Debug, Clone, Copy)]
pub(super) struct OrderedFloat(pub f32);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        // Bit comparison matches total_cmp: NaN equals itself, -0.0 != +0.0.
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
