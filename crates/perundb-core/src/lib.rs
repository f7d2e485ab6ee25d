//! # `PerunDB` Core
//!
//! Embedded, single-node vector search engine.
//!
//! Two tightly coupled cores: a concurrent HNSW index for approximate
//! nearest-neighbor search over fixed-dimension f32 vectors, and a
//! self-describing columnar file format with per-page automatic encoder
//! selection used to persist the graph and arbitrary column data.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use perundb_core::{DistanceMetric, HnswIndex, HnswParams};
//!
//! let index = HnswIndex::new(128, HnswParams::default())?;
//! let id = index.insert(embedding)?;
//! let neighbors = index.search(&query, 10, 0)?;
//!
//! index.save("./data/index")?;
//! let restored = HnswIndex::load("./data/index")?;
//! ```
//!
//! Column data goes through the same format the index persists with:
//!
//! ```rust,ignore
//! use perundb_core::format::{FileReader, FileWriter};
//!
//! let mut writer = FileWriter::create("data.lance", schema, config)?;
//! writer.write_batch(&batch)?;
//! writer.close()?;
//!
//! let reader = FileReader::open("data.lance")?;
//! let column = reader.read_column(0)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod array;
pub mod config;
pub mod distance;
pub mod encoding;
pub mod error;
pub mod format;
pub mod index;
pub mod stats;

pub use array::{Array, Bitmap, DataType, Field, RecordBatch, Schema};
pub use config::EngineConfig;
pub use distance::DistanceMetric;
pub use encoding::{Encoder, EncoderConfig, EncodingType};
pub use error::{Error, ErrorCode, Result, Severity};
pub use format::{FileReader, FileWriter};
pub use index::{adaptive_ef, HnswIndex, HnswParams, NodeId};
pub use stats::ArrayStats;
