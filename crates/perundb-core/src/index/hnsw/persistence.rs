//! HNSW persistence: save/load through the columnar format.
//!
//! A graph maps onto three columnar files under one directory:
//!
//! ```text
//! <dir>/
//! ├── nodes.lance        # (id: i32, vector: fixed_size_list<f32, D>, level: i32)
//! ├── connections.lance  # (node_id: i32, layer: i32, neighbor_id: i32), omitted when edgeless
//! └── metadata.lance     # eight i32 columns, one row
//! ```
//!
//! `metadata.lance` columns: `m, m_max, m_max0, ef_construction, dimension,
//! entry_point, max_level, num_nodes`. The distance metric is not part of
//! the metadata row; [`HnswIndex::load`] assumes the engine default and
//! [`HnswIndex::load_with_metric`] restores any other metric.

use super::graph::{GraphCore, HnswIndex, Node, NodeId};
use super::params::{HnswParams, MAX_LEVEL};
use crate::array::{Array, DataType, Field, RecordBatch, Schema};
use crate::distance::DistanceMetric;
use crate::encoding::EncoderConfig;
use crate::error::{Error, Result};
use crate::format::{FileReader, FileWriter};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const NODES_FILE: &str = "nodes.lance";
const CONNECTIONS_FILE: &str = "connections.lance";
const METADATA_FILE: &str = "metadata.lance";

/// Rows per persisted batch; large graphs split into multiple pages per
/// column.
const BATCH_ROWS: usize = 64 * 1024;

fn nodes_schema(dimension: usize) -> Schema {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    Schema::new(vec![
        Field::new("id", DataType::Int32),
        Field::new(
            "vector",
            DataType::FixedSizeList(Box::new(DataType::Float32), dimension as i32),
        ),
        Field::new("level", DataType::Int32),
    ])
}

fn connections_schema() -> Schema {
    Schema::new(vec![
        Field::new("node_id", DataType::Int32),
        Field::new("layer", DataType::Int32),
        Field::new("neighbor_id", DataType::Int32),
    ])
}

fn metadata_schema() -> Schema {
    Schema::new(
        [
            "m",
            "m_max",
            "m_max0",
            "ef_construction",
            "dimension",
            "entry_point",
            "max_level",
            "num_nodes",
        ]
        .iter()
        .map(|name| Field::new(*name, DataType::Int32))
        .collect(),
    )
}

impl HnswIndex {
    /// Saves the graph to `dir` (created if missing).
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty graph; format and I/O errors
    /// propagate.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        self.with_core(|core| {
            if core.nodes.is_empty() {
                return Err(Error::invalid_argument("no nodes to save").op("hnsw::save"));
            }
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::from(e).op("hnsw::save").path(dir))?;

            self.save_nodes(core, dir)?;
            let edges = self.save_connections(core, dir)?;
            self.save_metadata(core, dir)?;

            info!(
                path = %dir.display(),
                nodes = core.nodes.len(),
                edges,
                "saved hnsw index"
            );
            Ok(())
        })
    }

    fn save_nodes(&self, core: &GraphCore, dir: &Path) -> Result<()> {
        let schema = nodes_schema(self.dimension);
        let mut writer = FileWriter::create(
            dir.join(NODES_FILE),
            schema.clone(),
            EncoderConfig::default(),
        )?;

        for (chunk_index, chunk) in core.nodes.chunks(BATCH_ROWS).enumerate() {
            let base = chunk_index * BATCH_ROWS;
            let mut ids = Vec::with_capacity(chunk.len());
            let mut levels = Vec::with_capacity(chunk.len());
            let mut child = Vec::with_capacity(chunk.len() * self.dimension);
            for (i, node) in chunk.iter().enumerate() {
                // Ids are dense arena positions; anything else means the
                // in-memory graph violated its own invariant.
                if node.id as usize != base + i {
                    return Err(Error::invalid_argument(format!(
                        "node id {} does not match its arena position {}",
                        node.id,
                        base + i
                    ))
                    .op("hnsw::save"));
                }
                #[allow(clippy::cast_possible_wrap)]
                ids.push(node.id as i32);
                levels.push(i32::from(node.level));
                child.extend_from_slice(&node.vector);
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let vectors =
                Array::fixed_size_list(Array::float32(child), self.dimension as i32)?;
            let batch = RecordBatch::new(
                schema.clone(),
                vec![Array::int32(ids), vectors, Array::int32(levels)],
            )?;
            writer.write_batch(&batch)?;
        }
        writer.close()
    }

    /// Writes the connection triples; returns the edge count. The file is
    /// omitted entirely for an edgeless graph.
    fn save_connections(&self, core: &GraphCore, dir: &Path) -> Result<usize> {
        let mut node_ids = Vec::new();
        let mut layers = Vec::new();
        let mut neighbor_ids = Vec::new();
        for node in &core.nodes {
            for layer in 0..node.num_layers() {
                for neighbor in node.neighbors(layer) {
                    #[allow(clippy::cast_possible_wrap)]
                    {
                        node_ids.push(node.id as i32);
                        layers.push(layer as i32);
                        neighbor_ids.push(neighbor as i32);
                    }
                }
            }
        }
        let total = node_ids.len();
        if total == 0 {
            return Ok(0);
        }

        let schema = connections_schema();
        let mut writer = FileWriter::create(
            dir.join(CONNECTIONS_FILE),
            schema.clone(),
            EncoderConfig::default(),
        )?;
        let mut at = 0;
        while at < total {
            let end = (at + BATCH_ROWS).min(total);
            let batch = RecordBatch::new(
                schema.clone(),
                vec![
                    Array::int32(node_ids[at..end].to_vec()),
                    Array::int32(layers[at..end].to_vec()),
                    Array::int32(neighbor_ids[at..end].to_vec()),
                ],
            )?;
            writer.write_batch(&batch)?;
            at = end;
        }
        writer.close()?;
        Ok(total)
    }

    fn save_metadata(&self, core: &GraphCore, dir: &Path) -> Result<()> {
        let schema = metadata_schema();
        let entry_point = core.entry_point.unwrap_or(0);
        let max_level = core.max_level.unwrap_or(0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let columns = vec![
            Array::int32(vec![self.m as i32]),
            Array::int32(vec![self.m_max as i32]),
            Array::int32(vec![self.m_max0 as i32]),
            Array::int32(vec![self.ef_construction as i32]),
            Array::int32(vec![self.dimension as i32]),
            Array::int32(vec![entry_point as i32]),
            Array::int32(vec![i32::from(max_level)]),
            Array::int32(vec![core.nodes.len() as i32]),
        ];
        let mut writer =
            FileWriter::create(dir.join(METADATA_FILE), schema.clone(), EncoderConfig::default())?;
        writer.write_batch(&RecordBatch::new(schema, columns)?)?;
        writer.close()
    }

    /// Loads a graph saved by [`HnswIndex::save`], assuming the default
    /// L2-squared metric.
    ///
    /// # Errors
    ///
    /// I/O errors for missing files, `CorruptedFile` for any structural
    /// violation.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_metric(dir, DistanceMetric::L2Squared)
    }

    /// Loads a graph saved by [`HnswIndex::save`] with an explicit metric
    /// (the metadata row does not record it).
    ///
    /// # Errors
    ///
    /// Same as [`HnswIndex::load`].
    pub fn load_with_metric(dir: impl AsRef<Path>, metric: DistanceMetric) -> Result<Self> {
        let dir = dir.as_ref();
        let meta = load_metadata(dir)?;
        let index = build_empty(&meta, metric)?;

        let nodes = load_nodes(dir, &meta)?;
        load_connections(dir, &nodes)?;

        {
            let mut core = index.core.write();
            let entry = &nodes[meta.entry_point as usize];
            if i32::from(entry.level) != meta.max_level {
                return Err(Error::corrupted(format!(
                    "entry point {} has level {}, metadata declares max level {}",
                    meta.entry_point, entry.level, meta.max_level
                ))
                .op("hnsw::load")
                .path(dir));
            }
            #[allow(clippy::cast_sign_loss)]
            {
                core.entry_point = Some(meta.entry_point as NodeId);
                core.max_level = Some(meta.max_level as u8);
            }
            core.nodes = nodes;
        }

        info!(path = %dir.display(), nodes = meta.num_nodes, "loaded hnsw index");
        Ok(index)
    }
}

/// The eight-column metadata row.
struct Metadata {
    m: i32,
    m_max: i32,
    m_max0: i32,
    ef_construction: i32,
    dimension: i32,
    entry_point: i32,
    max_level: i32,
    num_nodes: i32,
}

fn load_metadata(dir: &Path) -> Result<Metadata> {
    let reader = FileReader::open(dir.join(METADATA_FILE))?;
    let batch = reader.read_batch()?;
    if batch.num_rows() != 1 || batch.columns().len() != 8 {
        return Err(Error::corrupted(format!(
            "metadata has {} rows and {} columns, expected 1 x 8",
            batch.num_rows(),
            batch.columns().len()
        ))
        .op("hnsw::load")
        .path(dir));
    }
    let cell = |i: usize| -> Result<i32> {
        batch.column(i)?.as_i32().map(|v| v[0]).ok_or_else(|| {
            Error::corrupted(format!("metadata column {i} is not int32")).op("hnsw::load")
        })
    };
    let meta = Metadata {
        m: cell(0)?,
        m_max: cell(1)?,
        m_max0: cell(2)?,
        ef_construction: cell(3)?,
        dimension: cell(4)?,
        entry_point: cell(5)?,
        max_level: cell(6)?,
        num_nodes: cell(7)?,
    };

    if meta.m < 2
        || meta.m_max < meta.m
        || meta.m_max0 < meta.m_max
        || meta.ef_construction <= 0
        || meta.dimension <= 0
        || meta.num_nodes <= 0
        || meta.entry_point < 0
        || meta.entry_point >= meta.num_nodes
        || meta.max_level < 0
        || meta.max_level > i32::from(MAX_LEVEL)
    {
        return Err(Error::corrupted("metadata row fails validation")
            .op("hnsw::load")
            .path(dir)
            .ctx("m", meta.m.to_string())
            .ctx("num_nodes", meta.num_nodes.to_string()));
    }
    Ok(meta)
}

fn build_empty(meta: &Metadata, metric: DistanceMetric) -> Result<HnswIndex> {
    #[allow(clippy::cast_sign_loss)]
    let (m, m_max, m_max0, ef_construction, dimension) = (
        meta.m as usize,
        meta.m_max as usize,
        meta.m_max0 as usize,
        meta.ef_construction as usize,
        meta.dimension as usize,
    );
    let params = HnswParams::default();
    #[allow(clippy::cast_precision_loss)]
    Ok(HnswIndex {
        core: RwLock::new(GraphCore::default()),
        rng: Mutex::new(StdRng::seed_from_u64(params.seed)),
        m,
        m_max,
        m_max0,
        ef_construction,
        ml: 1.0 / (m as f64).ln(),
        dimension,
        metric,
    })
}

fn load_nodes(dir: &Path, meta: &Metadata) -> Result<Vec<Arc<Node>>> {
    let reader = FileReader::open(dir.join(NODES_FILE))?;
    let batch = reader.read_batch()?;
    #[allow(clippy::cast_sign_loss)]
    let expected = meta.num_nodes as usize;
    if batch.num_rows() != expected {
        return Err(Error::corrupted(format!(
            "nodes file has {} rows, metadata declares {expected}",
            batch.num_rows()
        ))
        .op("hnsw::load")
        .path(dir));
    }

    let ids = batch.column(0)?.as_i32().ok_or_else(|| {
        Error::corrupted("id column is not int32").op("hnsw::load")
    })?;
    let vectors = batch.column(1)?;
    let levels = batch.column(2)?.as_i32().ok_or_else(|| {
        Error::corrupted("level column is not int32").op("hnsw::load")
    })?;

    #[allow(clippy::cast_sign_loss)]
    let dimension = meta.dimension as usize;
    let child = vectors
        .child()
        .and_then(Array::as_f32)
        .ok_or_else(|| {
            Error::corrupted("vector column is not fixed_size_list<float32>").op("hnsw::load")
        })?;
    if vectors.data_type() != DataType::FixedSizeList(Box::new(DataType::Float32), meta.dimension)
    {
        return Err(Error::corrupted(format!(
            "vector column has type {}, expected fixed_size_list<float32, {}>",
            vectors.data_type(),
            meta.dimension
        ))
        .op("hnsw::load")
        .path(dir));
    }

    let mut nodes = Vec::with_capacity(expected);
    for i in 0..expected {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        if ids[i] != i as i32 {
            return Err(Error::corrupted(format!(
                "node row {i} carries id {}, expected dense ids",
                ids[i]
            ))
            .op("hnsw::load")
            .path(dir));
        }
        let level = u8::try_from(levels[i]).ok().filter(|&l| l <= MAX_LEVEL).ok_or_else(|| {
            Error::corrupted(format!("node {i} has invalid level {}", levels[i]))
                .op("hnsw::load")
        })?;
        let vector = child[i * dimension..(i + 1) * dimension].to_vec();
        #[allow(clippy::cast_possible_truncation)]
        nodes.push(Arc::new(Node::new(i as NodeId, vector, level)));
    }
    Ok(nodes)
}

fn load_connections(dir: &Path, nodes: &[Arc<Node>]) -> Result<()> {
    let path = dir.join(CONNECTIONS_FILE);
    // A graph with no edges legitimately omits the file.
    if !path.exists() {
        return Ok(());
    }
    let reader = FileReader::open(&path)?;
    let batch = reader.read_batch()?;
    let node_ids = batch.column(0)?.as_i32().ok_or_else(|| {
        Error::corrupted("node_id column is not int32").op("hnsw::load")
    })?;
    let layers = batch.column(1)?.as_i32().ok_or_else(|| {
        Error::corrupted("layer column is not int32").op("hnsw::load")
    })?;
    let neighbor_ids = batch.column(2)?.as_i32().ok_or_else(|| {
        Error::corrupted("neighbor_id column is not int32").op("hnsw::load")
    })?;

    let n = nodes.len();
    for row in 0..batch.num_rows() {
        let (node_id, layer, neighbor_id) = (node_ids[row], layers[row], neighbor_ids[row]);
        #[allow(clippy::cast_sign_loss)]
        let valid = node_id >= 0
            && (node_id as usize) < n
            && neighbor_id >= 0
            && (neighbor_id as usize) < n
            && layer >= 0
            && layer <= i32::from(nodes[node_id as usize].level);
        if !valid {
            return Err(Error::corrupted(format!(
                "connection row {row} ({node_id}, {layer}, {neighbor_id}) fails validation"
            ))
            .op("hnsw::load")
            .path(&path));
        }
        #[allow(clippy::cast_sign_loss)]
        nodes[node_id as usize].add_neighbor(layer as usize, neighbor_id as NodeId);
    }
    Ok(())
}
