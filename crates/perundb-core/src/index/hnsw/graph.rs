//! HNSW graph structure and insertion.
//!
//! Nodes live in a contiguous arena (`Vec<Arc<Node>>`); edges store node
//! ids, never references. One reader/writer lock guards the arena together
//! with the entry point and maximum level; each node carries its own
//! reader/writer lock per connection list; a dedicated mutex guards the
//! level-draw RNG so draws are reproducible for a single-threaded
//! insertion order.
//!
//! Concurrent inserts are eventually consistent: a search racing an insert
//! may observe a partially linked node, which degrades recall slightly but
//! never correctness. Vectors are immutable after append and are read
//! without locking.

use super::params::{HnswParams, MAX_LEVEL};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::debug;

/// Node identifier: dense, assigned from 0 in insertion order.
pub type NodeId = u32;

/// One graph node: its vector, its level, and one connection list per
/// layer in `0..=level`.
#[derive(Debug)]
pub(super) struct Node {
    pub id: NodeId,
    pub vector: Vec<f32>,
    pub level: u8,
    connections: Vec<RwLock<Vec<NodeId>>>,
}

impl Node {
    pub(super) fn new(id: NodeId, vector: Vec<f32>, level: u8) -> Self {
        Self {
            id,
            vector,
            level,
            connections: (0..=level).map(|_| RwLock::new(Vec::new())).collect(),
        }
    }

    /// Snapshot of the neighbor set at `layer` (empty above the node's
    /// level).
    pub(super) fn neighbors(&self, layer: usize) -> Vec<NodeId> {
        self.connections
            .get(layer)
            .map_or_else(Vec::new, |l| l.read().clone())
    }

    /// Replaces the neighbor set at `layer`.
    pub(super) fn set_neighbors(&self, layer: usize, neighbors: Vec<NodeId>) {
        if let Some(list) = self.connections.get(layer) {
            *list.write() = neighbors;
        }
    }

    /// Appends one neighbor at `layer` (load path; no pruning).
    pub(super) fn add_neighbor(&self, layer: usize, neighbor: NodeId) {
        if let Some(list) = self.connections.get(layer) {
            list.write().push(neighbor);
        }
    }

    /// Number of layers this node participates in.
    pub(super) fn num_layers(&self) -> usize {
        self.connections.len()
    }
}

/// Global graph fields guarded by one reader/writer lock.
#[derive(Debug, Default)]
pub(super) struct GraphCore {
    pub nodes: Vec<Arc<Node>>,
    pub entry_point: Option<NodeId>,
    pub max_level: Option<u8>,
}

/// Concurrent HNSW index over fixed-dimension f32 vectors.
///
/// Insert-only: nodes are created by [`HnswIndex::insert`] and never
/// destroyed.
#[derive(Debug)]
pub struct HnswIndex {
    pub(super) core: RwLock<GraphCore>,
    pub(super) rng: Mutex<StdRng>,
    pub(super) m: usize,
    pub(super) m_max: usize,
    pub(super) m_max0: usize,
    pub(super) ef_construction: usize,
    /// Level multiplier `1 / ln(M)`.
    pub(super) ml: f64,
    pub(super) dimension: usize,
    pub(super) metric: DistanceMetric,
}

impl HnswIndex {
    /// Creates an empty index.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero dimension or `m < 2`.
    pub fn new(dimension: usize, params: HnswParams) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::invalid_argument("dimension must be positive").op("hnsw::new"));
        }
        if params.m < 2 {
            return Err(Error::invalid_argument(format!(
                "M must be at least 2, got {}",
                params.m
            ))
            .op("hnsw::new"));
        }
        #[allow(clippy::cast_precision_loss)]
        let ml = 1.0 / (params.m as f64).ln();
        Ok(Self {
            core: RwLock::new(GraphCore::default()),
            rng: Mutex::new(StdRng::seed_from_u64(params.seed)),
            m: params.m,
            m_max: params.m,
            m_max0: params.m * 2,
            ef_construction: params.ef_construction,
            ml,
            dimension,
            metric: params.metric,
        })
    }

    /// Creates an empty index with adaptively tuned parameters.
    ///
    /// # Errors
    ///
    /// Same as [`HnswIndex::new`].
    pub fn with_adaptive_params(
        dimension: usize,
        expected_size: usize,
        metric: DistanceMetric,
    ) -> Result<Self> {
        Self::new(
            dimension,
            HnswParams::adaptive(dimension, expected_size).with_metric(metric),
        )
    }

    /// Number of vectors in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.read().nodes.len()
    }

    /// Returns true if the index holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.read().nodes.is_empty()
    }

    /// The fixed vector dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// The distance metric.
    #[must_use]
    pub const fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Construction beam width.
    #[must_use]
    pub const fn ef_construction(&self) -> usize {
        self.ef_construction
    }

    /// Target out-degree (`M`).
    #[must_use]
    pub const fn m(&self) -> usize {
        self.m
    }

    /// Returns a copy of the vector stored for `id`.
    #[must_use]
    pub fn vector(&self, id: NodeId) -> Option<Vec<f32>> {
        self.core
            .read()
            .nodes
            .get(id as usize)
            .map(|n| n.vector.clone())
    }

    /// Draws a level from the exponential distribution
    /// `floor(-ln(U) * ml)`, capped at [`MAX_LEVEL`].
    fn draw_level(&self) -> u8 {
        let mut rng = self.rng.lock();
        let mut u: f64 = rng.gen();
        if u <= f64::MIN_POSITIVE {
            u = f64::MIN_POSITIVE;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let level = (-u.ln() * self.ml).floor() as u64;
        level.min(u64::from(MAX_LEVEL)) as u8
    }

    /// Inserts a vector and links it into the graph.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` for vectors of the wrong length.
    pub fn insert(&self, vector: Vec<f32>) -> Result<NodeId> {
        if vector.len() != self.dimension {
            return Err(Error::dimension_mismatch(self.dimension, vector.len()).op("hnsw::insert"));
        }
        let level = self.draw_level();

        // Append under the write lock; ids are allocated here, so they form
        // a total order consistent with arena positions.
        let (node, mut ep, snapshot_max_level) = {
            let mut core = self.core.write();
            let id = u32::try_from(core.nodes.len()).map_err(|_| {
                Error::invalid_argument("index is full (u32 id space exhausted)")
                    .op("hnsw::insert")
            })?;
            let node = Arc::new(Node::new(id, vector, level));
            core.nodes.push(Arc::clone(&node));

            let Some(ep) = core.entry_point else {
                core.entry_point = Some(id);
                core.max_level = Some(level);
                debug!(id, level, "first node becomes the entry point");
                return Ok(id);
            };
            (node, ep, core.max_level.unwrap_or(0))
        };

        {
            let core = self.core.read();
            let nodes = &core.nodes;
            let query = node.vector.as_slice();

            // Phase A: greedy 1-NN descent through the layers above the
            // node's level.
            let mut lc = snapshot_max_level;
            while lc > level {
                ep = self.greedy_closest(nodes, query, ep, usize::from(lc));
                lc -= 1;
            }

            // Phase B: beam-search each layer, pick diverse neighbors,
            // link both directions, prune overfull neighbors.
            for lc in (0..=usize::from(level.min(snapshot_max_level))).rev() {
                let candidates =
                    self.search_layer(nodes, query, &[ep], self.ef_construction, lc);
                let m_at = if lc == 0 { self.m_max0 } else { self.m_max };
                let selected = self.select_neighbors(nodes, &candidates, m_at);

                node.set_neighbors(lc, selected.clone());
                for &neighbor in &selected {
                    self.link_back(nodes, neighbor, node.id, lc, m_at);
                }

                if let Some(&nearest) = selected.first() {
                    ep = nearest;
                } else if let Some(&(nearest, _)) = candidates.first() {
                    ep = nearest;
                }
            }
        }

        // Promote the entry point last so a concurrent search never starts
        // from a node with no links yet.
        if level > snapshot_max_level {
            let mut core = self.core.write();
            if core.max_level.is_none_or(|ml| level > ml) {
                core.max_level = Some(level);
                core.entry_point = Some(node.id);
                debug!(id = node.id, level, "entry point promoted");
            }
        }

        Ok(node.id)
    }

    /// Adds `new_id` to `neighbor`'s list at `layer`, pruning back to
    /// `m_at` with the diversification heuristic when the list overflows.
    ///
    /// Push and prune happen under the neighbor's write lock so concurrent
    /// backlinks cannot lose each other's updates; only that single
    /// per-node lock is held, so lock ordering is trivial.
    fn link_back(
        &self,
        nodes: &[Arc<Node>],
        neighbor_id: NodeId,
        new_id: NodeId,
        layer: usize,
        m_at: usize,
    ) {
        let neighbor = &nodes[neighbor_id as usize];
        let Some(list) = neighbor.connections.get(layer) else {
            return;
        };
        let mut list = list.write();
        if !list.contains(&new_id) {
            list.push(new_id);
        }
        if list.len() > m_at {
            let mut candidates: Vec<(NodeId, f32)> = list
                .iter()
                .map(|&other| {
                    (
                        other,
                        self.metric
                            .distance_unchecked(&neighbor.vector, &nodes[other as usize].vector),
                    )
                })
                .collect();
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
            *list = self.select_neighbors(nodes, &candidates, m_at);
        }
    }
}
