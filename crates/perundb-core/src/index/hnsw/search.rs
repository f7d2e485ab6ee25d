//! Layered search: greedy descent, bounded beam, neighbor selection.
//!
//! The beam termination uses a small tolerance
//! (`max(R) * REL_TOL + ABS_TOL`) so float non-associativity across
//! traversal orders cannot flip a borderline comparison and truncate the
//! beam early.

use super::graph::{GraphCore, HnswIndex, Node, NodeId};
use super::ordered_float::OrderedFloat;
use crate::error::{Error, Result};
use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Relative slack on the beam's rejection threshold.
const REL_TOL: f32 = 0.01;
/// Absolute slack on the beam's rejection threshold.
const ABS_TOL: f32 = 1e-5;

impl HnswIndex {
    /// Searches for the `k` nearest neighbors of `query`.
    ///
    /// `ef` bounds the layer-0 beam; `0` selects the default
    /// `max(ef_construction, k)`. Larger values trade latency for recall.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` for queries of the wrong length, `EmptyIndex`
    /// when nothing has been inserted.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<(NodeId, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::dimension_mismatch(self.dimension, query.len()).op("hnsw::search"));
        }
        let core = self.core.read();
        let Some(mut ep) = core.entry_point else {
            return Err(Error::empty_index().op("hnsw::search"));
        };

        let ef = if ef == 0 {
            self.ef_construction.max(k)
        } else {
            ef.max(k)
        };

        let max_level = core.max_level.unwrap_or(0);
        for lc in (1..=usize::from(max_level)).rev() {
            ep = self.greedy_closest(&core.nodes, query, ep, lc);
        }

        let mut results = self.search_layer(&core.nodes, query, &[ep], ef, 0);
        results.truncate(k);
        Ok(results)
    }

    /// Brute-force scan, used by recall tests and tiny collections.
    ///
    /// # Errors
    ///
    /// Same errors as [`HnswIndex::search`].
    pub fn search_exact(&self, query: &[f32], k: usize) -> Result<Vec<(NodeId, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::dimension_mismatch(self.dimension, query.len()).op("hnsw::search"));
        }
        let core = self.core.read();
        if core.nodes.is_empty() {
            return Err(Error::empty_index().op("hnsw::search"));
        }
        let mut all: Vec<(NodeId, f32)> = core
            .nodes
            .iter()
            .map(|n| (n.id, self.metric.distance_unchecked(query, &n.vector)))
            .collect();
        all.sort_by(|a, b| a.1.total_cmp(&b.1));
        all.truncate(k);
        Ok(all)
    }

    /// Greedy 1-nearest descent within one layer.
    pub(super) fn greedy_closest(
        &self,
        nodes: &[Arc<Node>],
        query: &[f32],
        entry: NodeId,
        layer: usize,
    ) -> NodeId {
        let mut best = entry;
        let mut best_dist = self
            .metric
            .distance_unchecked(query, &nodes[best as usize].vector);

        loop {
            let mut improved = false;
            for neighbor in nodes[best as usize].neighbors(layer) {
                let dist = self
                    .metric
                    .distance_unchecked(query, &nodes[neighbor as usize].vector);
                if dist < best_dist {
                    best = neighbor;
                    best_dist = dist;
                    improved = true;
                }
            }
            if !improved {
                return best;
            }
        }
    }

    /// Bounded beam search within one layer.
    ///
    /// Returns up to `ef` results in ascending distance order.
    pub(super) fn search_layer(
        &self,
        nodes: &[Arc<Node>],
        query: &[f32],
        entry_points: &[NodeId],
        ef: usize,
        layer: usize,
    ) -> Vec<(NodeId, f32)> {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut candidates: BinaryHeap<Reverse<(OrderedFloat, NodeId)>> = BinaryHeap::new();
        let mut results: BinaryHeap<(OrderedFloat, NodeId)> = BinaryHeap::new();

        for &ep in entry_points {
            if !visited.insert(ep) {
                continue;
            }
            let dist = self
                .metric
                .distance_unchecked(query, &nodes[ep as usize].vector);
            candidates.push(Reverse((OrderedFloat(dist), ep)));
            results.push((OrderedFloat(dist), ep));
        }

        while let Some(Reverse((OrderedFloat(c_dist), c_node))) = candidates.pop() {
            let furthest = results.peek().map_or(f32::MAX, |r| r.0 .0);
            if results.len() >= ef && c_dist > furthest + tolerance(furthest) {
                break;
            }

            for neighbor in nodes[c_node as usize].neighbors(layer) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let dist = self
                    .metric
                    .distance_unchecked(query, &nodes[neighbor as usize].vector);
                let furthest = results.peek().map_or(f32::MAX, |r| r.0 .0);
                if results.len() < ef || dist < furthest + tolerance(furthest) {
                    candidates.push(Reverse((OrderedFloat(dist), neighbor)));
                    results.push((OrderedFloat(dist), neighbor));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<(NodeId, f32)> = results
            .into_iter()
            .map(|(OrderedFloat(d), n)| (n, d))
            .collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1));
        out
    }

    /// Diversification heuristic over candidates sorted by ascending
    /// distance to the query.
    ///
    /// A candidate survives only if it is closer to the query than to
    /// every neighbor already kept, which spreads the selected set across
    /// directions. When the heuristic keeps fewer than `max_neighbors`,
    /// the remaining closest candidates fill the quota in order.
    pub(super) fn select_neighbors(
        &self,
        nodes: &[Arc<Node>],
        candidates: &[(NodeId, f32)],
        max_neighbors: usize,
    ) -> Vec<NodeId> {
        if candidates.len() <= max_neighbors {
            return candidates.iter().map(|&(id, _)| id).collect();
        }

        let mut selected: Vec<NodeId> = Vec::with_capacity(max_neighbors);
        for &(candidate, dist_to_query) in candidates {
            if selected.len() >= max_neighbors {
                break;
            }
            let candidate_vec = &nodes[candidate as usize].vector;
            let diverse = selected.iter().all(|&kept| {
                let dist_to_kept = self
                    .metric
                    .distance_unchecked(candidate_vec, &nodes[kept as usize].vector);
                dist_to_kept >= dist_to_query
            });
            if diverse || selected.is_empty() {
                selected.push(candidate);
            }
        }

        if selected.len() < max_neighbors {
            for &(candidate, _) in candidates {
                if selected.len() >= max_neighbors {
                    break;
                }
                if !selected.contains(&candidate) {
                    selected.push(candidate);
                }
            }
        }

        selected
    }

    /// Snapshot of a node's neighbor set at one layer. Exposed for
    /// persistence and integrity checks.
    pub(super) fn with_core<R>(&self, f: impl FnOnce(&GraphCore) -> R) -> R {
        f(&self.core.read())
    }
}

/// Termination slack around the current worst kept distance.
fn tolerance(furthest: f32) -> f32 {
    furthest.abs() * REL_TOL + ABS_TOL
}
