//! Concurrent HNSW index.
//!
//! Hierarchical navigable small world graph over fixed-dimension f32
//! vectors: probabilistic layer assignment, greedy descent through upper
//! layers, bounded beam search at layer 0, and diversification-based
//! neighbor selection (Malkov & Yashunin, 2016,
//! <https://arxiv.org/abs/1603.09320>).
//!
//! # Module Structure
//!
//! - [`graph`]: node arena, locking, insertion
//! - [`search`]: greedy descent, beam search, neighbor selection
//! - [`params`]: construction parameters and adaptive tuning
//! - [`persistence`]: save/load through the columnar format
//! - [`ordered_float`]: total-order heap keys

mod graph;
mod ordered_float;
mod params;
mod persistence;
mod search;

#[cfg(test)]
mod tests;

pub use graph::{HnswIndex, NodeId};
pub use params::{adaptive_ef, HnswParams};
