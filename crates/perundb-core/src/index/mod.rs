//! Index implementations.
//!
//! # Module Structure
//!
//! - [`hnsw`]: concurrent HNSW graph index with columnar persistence

pub mod hnsw;

pub use hnsw::{adaptive_ef, HnswIndex, HnswParams, NodeId};
