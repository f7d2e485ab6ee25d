//! Tests for the HNSW index: insertion, search, concurrency, persistence.

use super::*;
use crate::distance::DistanceMetric;
use crate::error::ErrorCode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::tempdir;

fn params(m: usize, ef_construction: usize, seed: u64) -> HnswParams {
    HnswParams {
        m,
        ef_construction,
        seed,
        ..HnswParams::default()
    }
}

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
        .collect()
}

/// Per-node, per-layer neighbor sets for structural comparisons.
fn connection_sets(index: &HnswIndex) -> Vec<Vec<BTreeSet<NodeId>>> {
    index.with_core(|core| {
        core.nodes
            .iter()
            .map(|node| {
                (0..node.num_layers())
                    .map(|layer| node.neighbors(layer).into_iter().collect())
                    .collect()
            })
            .collect()
    })
}

#[test]
fn test_insert_and_exact_recall_on_line() {
    let index = HnswIndex::new(4, params(16, 200, 42)).unwrap();
    let vectors = [
        vec![1.0, 2.0, 3.0, 4.0],
        vec![2.0, 3.0, 4.0, 5.0],
        vec![3.0, 4.0, 5.0, 6.0],
        vec![4.0, 5.0, 6.0, 7.0],
        vec![5.0, 6.0, 7.0, 8.0],
    ];
    for (i, v) in vectors.iter().enumerate() {
        let id = index.insert(v.clone()).unwrap();
        assert_eq!(id as usize, i, "ids are dense in insertion order");
    }

    let results = index.search(&[2.5, 3.5, 4.5, 5.5], 3, 50).unwrap();
    assert_eq!(results.len(), 3);
    // Nodes 1 and 2 are equidistant from the query.
    assert!(
        results[0].0 == 1 || results[0].0 == 2,
        "nearest was {:?}",
        results[0]
    );
    assert!((results[0].1 - 1.0).abs() < 1e-5);
}

#[test]
fn test_search_empty_index() {
    let index = HnswIndex::new(128, HnswParams::default()).unwrap();
    let err = index.search(&vec![0.0; 128], 10, 0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::EmptyIndex);
}

#[test]
fn test_insert_dimension_mismatch() {
    let index = HnswIndex::new(128, HnswParams::default()).unwrap();
    let err = index.insert(vec![0.0; 64]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DimensionMismatch);
}

#[test]
fn test_search_dimension_mismatch() {
    let index = HnswIndex::new(8, HnswParams::default()).unwrap();
    index.insert(vec![0.0; 8]).unwrap();
    let err = index.search(&[0.0; 4], 1, 0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DimensionMismatch);
}

#[test]
fn test_rejects_degenerate_parameters() {
    assert!(HnswIndex::new(0, HnswParams::default()).is_err());
    assert!(HnswIndex::new(8, params(1, 100, 0)).is_err());
}

#[test]
fn test_first_insert_becomes_entry_point() {
    let index = HnswIndex::new(2, HnswParams::default()).unwrap();
    let id = index.insert(vec![1.0, 2.0]).unwrap();
    assert_eq!(id, 0);
    assert_eq!(index.len(), 1);
    let results = index.search(&[1.0, 2.0], 1, 0).unwrap();
    assert_eq!(results[0].0, 0);
}

#[test]
fn test_self_identity_search() {
    let index = HnswIndex::new(16, params(16, 200, 7)).unwrap();
    let vectors = random_vectors(200, 16, 99);
    for v in &vectors {
        index.insert(v.clone()).unwrap();
    }
    for (i, v) in vectors.iter().enumerate().step_by(13) {
        let results = index.search(v, 1, 0).unwrap();
        assert_eq!(results[0].0 as usize, i, "query {i} must find itself first");
        assert!(results[0].1 < 1e-5);
    }
}

#[test]
fn test_default_ef_is_max_of_ef_construction_and_k() {
    // With ef = 0 the search uses max(ef_construction, k); with a tiny
    // explicit ef the beam still returns k results when enough exist.
    let index = HnswIndex::new(4, params(8, 50, 3)).unwrap();
    for v in random_vectors(100, 4, 5) {
        index.insert(v).unwrap();
    }
    let defaulted = index.search(&[0.5, 0.5, 0.5, 0.5], 60, 0).unwrap();
    assert_eq!(defaulted.len(), 60, "beam must cover k even though k > ef_construction");
}

#[test]
fn test_recall_floor_against_brute_force() {
    let index = HnswIndex::new(64, params(16, 200, 1234)).unwrap();
    let vectors = random_vectors(1000, 64, 4321);
    for v in &vectors {
        index.insert(v.clone()).unwrap();
    }

    let queries = random_vectors(100, 64, 8888);
    let mut total_recall = 0.0f64;
    for q in &queries {
        let approx: BTreeSet<NodeId> = index
            .search(q, 10, 0)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let exact: BTreeSet<NodeId> = index
            .search_exact(q, 10)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        total_recall += approx.intersection(&exact).count() as f64 / 10.0;
    }
    let avg = total_recall / queries.len() as f64;
    assert!(avg >= 0.9, "average recall@10 was {avg}");
}

#[test]
fn test_distance_ordering_is_ascending() {
    let index = HnswIndex::new(8, params(16, 100, 2)).unwrap();
    for v in random_vectors(300, 8, 77) {
        index.insert(v).unwrap();
    }
    let results = index.search(&[0.5; 8], 25, 100).unwrap();
    for pair in results.windows(2) {
        assert!(pair[0].1 <= pair[1].1, "results must be sorted by distance");
    }
}

#[test]
fn test_metrics_affect_ordering() {
    for metric in [
        DistanceMetric::L2Squared,
        DistanceMetric::InnerProduct,
        DistanceMetric::Cosine,
    ] {
        let index =
            HnswIndex::new(4, params(16, 100, 11).with_metric(metric)).unwrap();
        for v in random_vectors(200, 4, 42) {
            index.insert(v).unwrap();
        }
        let results = index.search(&[0.9, 0.1, 0.4, 0.6], 10, 200).unwrap();
        assert_eq!(results.len(), 10);
        let exact = index.search_exact(&[0.9, 0.1, 0.4, 0.6], 1).unwrap();
        assert_eq!(
            results[0].0, exact[0].0,
            "{metric:?}: beam must agree with brute force on the nearest"
        );
    }
}

#[test]
fn test_same_seed_is_reproducible() {
    let build = || {
        let index = HnswIndex::new(8, params(12, 80, 2024)).unwrap();
        for v in random_vectors(150, 8, 55) {
            index.insert(v).unwrap();
        }
        index
    };
    let a = build();
    let b = build();
    assert_eq!(connection_sets(&a), connection_sets(&b));
    let qa = a.search(&[0.3; 8], 5, 64).unwrap();
    let qb = b.search(&[0.3; 8], 5, 64).unwrap();
    assert_eq!(qa, qb);
}

#[test]
fn test_graph_integrity_invariants() {
    let index = HnswIndex::new(6, params(8, 100, 31)).unwrap();
    for v in random_vectors(400, 6, 13) {
        index.insert(v).unwrap();
    }

    index.with_core(|core| {
        assert_eq!(core.nodes.len(), 400);
        let entry = core.entry_point.unwrap();
        let max_level = core.max_level.unwrap();
        assert_eq!(core.nodes[entry as usize].level, max_level);

        for (position, node) in core.nodes.iter().enumerate() {
            assert_eq!(node.id as usize, position, "dense id assignment");
            for layer in 0..node.num_layers() {
                let cap = if layer == 0 { 16 } else { 8 };
                let neighbors = node.neighbors(layer);
                assert!(
                    neighbors.len() <= cap,
                    "node {position} layer {layer} has {} neighbors",
                    neighbors.len()
                );
                for n in neighbors {
                    assert_ne!(n, node.id, "self-loop at node {position}");
                    assert!((n as usize) < core.nodes.len(), "dangling id {n}");
                }
            }
        }
    });
}

#[test]
fn test_concurrent_insert_integrity() {
    let index = Arc::new(HnswIndex::new(8, params(8, 60, 99)).unwrap());
    let per_thread = 150;
    let threads = 4u64;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let index = Arc::clone(&index);
            std::thread::spawn(move || {
                for v in random_vectors(per_thread, 8, 1000 + t) {
                    index.insert(v).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let total = threads as usize * per_thread;
    assert_eq!(index.len(), total);
    index.with_core(|core| {
        for (position, node) in core.nodes.iter().enumerate() {
            assert_eq!(node.id as usize, position, "ids must stay contiguous");
            for layer in 0..node.num_layers() {
                for n in node.neighbors(layer) {
                    assert_ne!(n, node.id, "self-loop at node {position}");
                    assert!((n as usize) < total, "dangling id {n}");
                }
            }
        }
    });

    // The graph must still answer searches sensibly.
    let results = index.search(&[0.5; 8], 10, 128).unwrap();
    assert_eq!(results.len(), 10);
}

#[test]
fn test_concurrent_search_during_insert() {
    let index = Arc::new(HnswIndex::new(8, params(8, 60, 5)).unwrap());
    for v in random_vectors(100, 8, 1) {
        index.insert(v).unwrap();
    }

    let writer = {
        let index = Arc::clone(&index);
        std::thread::spawn(move || {
            for v in random_vectors(200, 8, 2) {
                index.insert(v).unwrap();
            }
        })
    };
    let searcher = {
        let index = Arc::clone(&index);
        std::thread::spawn(move || {
            for q in random_vectors(200, 8, 3) {
                let results = index.search(&q, 5, 64).unwrap();
                assert!(!results.is_empty());
            }
        })
    };
    writer.join().unwrap();
    searcher.join().unwrap();
    assert_eq!(index.len(), 300);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_save_rejects_empty_graph() {
    let dir = tempdir().unwrap();
    let index = HnswIndex::new(4, HnswParams::default()).unwrap();
    let err = index.save(dir.path().join("idx")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[test]
fn test_save_load_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");

    let index = HnswIndex::new(3, params(4, 100, 42)).unwrap();
    let vectors: Vec<Vec<f32>> = (0..10)
        .map(|i| vec![i as f32, i as f32 + 0.1, i as f32 + 0.2])
        .collect();
    for v in &vectors {
        index.insert(v.clone()).unwrap();
    }
    index.save(&path).unwrap();

    let loaded = HnswIndex::load(&path).unwrap();
    assert_eq!(loaded.len(), 10);
    assert_eq!(loaded.dimension(), 3);
    assert_eq!(loaded.m(), 4);
    assert_eq!(loaded.ef_construction(), 100);

    // Vectors are bitwise identical.
    for (i, v) in vectors.iter().enumerate() {
        assert_eq!(&loaded.vector(i as NodeId).unwrap(), v);
    }

    // Connection sets match per node and per layer.
    assert_eq!(connection_sets(&index), connection_sets(&loaded));

    // Searches agree within the traversal tolerance.
    let before = index.search(&[2.5, 2.6, 2.7], 5, 100).unwrap();
    let after = loaded.search(&[2.5, 2.6, 2.7], 5, 100).unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.0, a.0);
        assert!((b.1 - a.1).abs() < 1e-5);
    }
}

#[test]
fn test_save_load_larger_graph_with_metric() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");

    let index = HnswIndex::new(
        16,
        params(8, 120, 9).with_metric(DistanceMetric::Cosine),
    )
    .unwrap();
    let vectors = random_vectors(500, 16, 500);
    for v in &vectors {
        index.insert(v.clone()).unwrap();
    }
    index.save(&path).unwrap();

    let loaded = HnswIndex::load_with_metric(&path, DistanceMetric::Cosine).unwrap();
    assert_eq!(loaded.len(), 500);
    assert_eq!(connection_sets(&index), connection_sets(&loaded));

    let q = &vectors[123];
    let before = index.search(q, 10, 200).unwrap();
    let after = loaded.search(q, 10, 200).unwrap();
    assert_eq!(
        before.iter().map(|r| r.0).collect::<Vec<_>>(),
        after.iter().map(|r| r.0).collect::<Vec<_>>()
    );
}

#[test]
fn test_single_node_graph_omits_connections_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");

    let index = HnswIndex::new(2, HnswParams::default()).unwrap();
    index.insert(vec![1.0, 2.0]).unwrap();
    index.save(&path).unwrap();

    assert!(path.join("nodes.lance").exists());
    assert!(path.join("metadata.lance").exists());
    assert!(
        !path.join("connections.lance").exists(),
        "edgeless graphs must omit the connections file"
    );

    let loaded = HnswIndex::load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    let results = loaded.search(&[1.0, 2.0], 1, 10).unwrap();
    assert_eq!(results[0].0, 0);
}

#[test]
fn test_load_missing_directory_fails() {
    let dir = tempdir().unwrap();
    let err = HnswIndex::load(dir.path().join("absent")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::FileNotFound);
}

#[test]
fn test_load_rejects_corrupted_metadata() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    let index = HnswIndex::new(4, params(4, 100, 1)).unwrap();
    for v in random_vectors(20, 4, 2) {
        index.insert(v).unwrap();
    }
    index.save(&path).unwrap();

    // Corrupt a page payload byte inside metadata.lance.
    let meta_path = path.join("metadata.lance");
    let mut bytes = std::fs::read(&meta_path).unwrap();
    bytes[crate::format::HEADER_SIZE + 31] ^= 0xFF;
    std::fs::write(&meta_path, &bytes).unwrap();

    let err = HnswIndex::load(&path).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CorruptedFile);
}

#[test]
fn test_level_distribution_is_exponential() {
    let index = HnswIndex::new(4, params(16, 50, 12345)).unwrap();
    for v in random_vectors(2000, 4, 6) {
        index.insert(v).unwrap();
    }
    index.with_core(|core| {
        let level0 = core.nodes.iter().filter(|n| n.level == 0).count();
        let deep = core.nodes.iter().filter(|n| n.level >= 4).count();
        // With M = 16, P(level >= 1) = 1/16: the bulk stays at level 0 and
        // levels >= 4 are vanishingly rare.
        assert!(level0 > 1700, "{level0} nodes at level 0");
        assert!(deep < 10, "{deep} nodes at level >= 4");
        let max = core.max_level.unwrap();
        assert!(max <= 16);
    });
}
