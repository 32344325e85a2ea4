//! Edge Cache Integration Tests
//!
//! Exercises the public cache API:
//! - Geometry tier hits and memory budget
//! - Tolerance-sensitive intersection tier and LRU eviction
//! - Incremental updates against a real shape

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use edgecache::adapters::{EdgeSet, LineCurve, ShapeEdge};
use edgecache::cache::{
    hash_edges, intersection_key, CacheConfig, EdgeGeometryCache, EdgeIntersection,
    MemoryAccountant,
};
use edgecache::domain::Edge;
use edgecache::intersect::{find_edge_intersections, find_intersections_touching, points_of};
use edgecache::{Point, Shape};

fn points(n: usize, tag: f64) -> Vec<Point> {
    (0..n).map(|i| Point::new(i as f64, tag, 0.0)).collect()
}

// =============================================================================
// Geometry Tier
// =============================================================================

mod geometry_tests {
    use super::*;

    #[test]
    fn test_second_lookup_is_a_hit() {
        let cache = EdgeGeometryCache::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            points(10, 1.0)
        };

        let first = cache.get_or_compute("original_1_80_0.01_0", compute);
        let second = cache.get_or_compute("original_1_80_0.01_0", || {
            calls.set(calls.get() + 1);
            points(10, 2.0)
        });

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(cache.miss_count(), 1);
        assert!((cache.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_budget_holds_after_every_insert() {
        let entry_size = MemoryAccountant::estimate(&points(40, 0.0));
        let budget = entry_size * 3 + entry_size / 2;
        let cache = EdgeGeometryCache::with_config(CacheConfig::with_budget(budget));

        for i in 0..20 {
            cache.get_or_compute(&format!("g{}", i), || points(40, i as f64));
            assert!(cache.total_memory_usage() <= budget);
        }

        assert_eq!(cache.entry_count(), 3);
        let stats = cache.stats();
        assert_eq!(stats.evictions, 17);
        assert!(stats.utilization() <= 1.0);
    }

    #[test]
    fn test_oversized_entry_is_returned_but_not_cached() {
        let cache = EdgeGeometryCache::with_config(CacheConfig::with_budget(1024));
        cache.get_or_compute("small", || points(1, 0.0));

        let big = cache.get_or_compute("big", || points(1000, 0.0));
        assert_eq!(big.len(), 1000);
        assert!(!cache.contains("big"));
        // Nothing was evicted on its behalf
        assert!(cache.contains("small"));
    }
}

// =============================================================================
// Intersection Tier
// =============================================================================

mod intersection_tests {
    use super::*;

    #[test]
    fn test_tolerance_change_forces_recompute() {
        let cache = EdgeGeometryCache::new();
        let key = intersection_key(42, 0.01);

        let first = cache.get_or_compute_intersections(&key, || points(3, 1.0), 42, 0.01);
        let same = cache.get_or_compute_intersections(&key, || points(3, 9.0), 42, 0.01 + 1e-12);
        assert_eq!(first, same);

        let changed = cache.get_or_compute_intersections(&key, || points(2, 2.0), 42, 0.02);
        assert_eq!(changed, points(2, 2.0));

        let entry = cache.intersection_entry(&key).unwrap();
        assert!((entry.tolerance - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_lru_removes_only_the_oldest() {
        let cache = EdgeGeometryCache::new();
        cache.get_or_compute("a", || points(1, 0.0));
        std::thread::sleep(Duration::from_millis(5));
        cache.store_cached("b", points(1, 1.0), 7, 0.01);
        std::thread::sleep(Duration::from_millis(5));
        cache.get_or_compute("c", || points(1, 2.0));
        std::thread::sleep(Duration::from_millis(5));

        // Touching "a" makes "b" the oldest
        cache.get_or_compute("a", Vec::new);

        assert!(cache.evict_lru());
        assert!(cache.contains("a"));
        assert!(!cache.contains_intersections("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn test_shape_invalidation_spans_both_tiers() {
        let cache = EdgeGeometryCache::new();
        cache.get_or_compute_for_shape("original_5_80_0.01_0", 5, || points(4, 0.0));
        cache.store_cached(&intersection_key(5, 0.01), points(2, 0.0), 5, 0.01);
        cache.store_cached(&intersection_key(6, 0.01), points(2, 0.0), 6, 0.01);

        assert_eq!(cache.invalidate_shape(5), 2);
        assert_eq!(cache.entry_count(), 1);
        assert!(cache.contains_intersections(&intersection_key(6, 0.01)));
    }

    #[test]
    fn test_stale_entries_age_out() {
        let cache = EdgeGeometryCache::new();
        cache.get_or_compute("old", || points(1, 0.0));
        std::thread::sleep(Duration::from_millis(30));
        cache.get_or_compute("fresh", || points(1, 0.0));

        assert_eq!(cache.evict_old_entries(Duration::from_millis(15)), 1);
        assert!(cache.contains("fresh"));
        assert!(!cache.contains("old"));
    }
}

// =============================================================================
// Incremental Updates
// =============================================================================

mod incremental_tests {
    use super::*;

    fn store_full(cache: &EdgeGeometryCache, key: &str, edges: &[Arc<dyn Edge>], tol: f64) {
        let hits = find_edge_intersections(edges, tol);
        cache.store_cached_with_edges(key, points_of(&hits), 1, tol, hits, hash_edges(edges));
    }

    #[test]
    fn test_unchanged_edges_take_fast_path() {
        let cache = EdgeGeometryCache::new();
        let shape = EdgeSet::lattice(3, 1.0);
        let edges = shape.edges();
        let key = intersection_key(shape.shape_id(), 1e-3);
        store_full(&cache, &key, &edges, 1e-3);
        let stored = cache.try_get_cached(&key).unwrap();
        assert_eq!(stored.len(), 9);

        for _ in 0..2 {
            let result =
                cache.update_intersections_incremental(&key, &edges, 1e-3, |_| panic!("no compute"));
            assert!(result.new_intersections.is_empty());
            assert!(result.invalidated_edge_indices.is_empty());
            assert!(!result.is_full_recompute());
            assert_eq!(result.valid_intersections, stored);
        }
    }

    #[test]
    fn test_one_changed_edge_recomputes_its_pairs() {
        let cache = EdgeGeometryCache::new();
        let a: Arc<dyn Edge> = Arc::new(ShapeEdge::line(
            Point::new(0.0, 1.0, 0.0),
            Point::new(4.0, 1.0, 0.0),
        ));
        let b: Arc<dyn Edge> = Arc::new(ShapeEdge::line(
            Point::new(2.0, 0.0, 0.0),
            Point::new(2.0, 4.0, 0.0),
        ));
        let c: Arc<dyn Edge> = Arc::new(ShapeEdge::line(
            Point::new(10.0, 10.0, 0.0),
            Point::new(12.0, 10.0, 0.0),
        ));
        let p1 = Point::new(2.0, 1.0, 0.0);
        let mut edges = vec![a, b, c];
        cache.store_cached_with_edges(
            "k",
            vec![p1],
            1,
            1e-3,
            vec![EdgeIntersection::new(0, 1, p1, 0.0)],
            hash_edges(&edges),
        );

        edges[2] = Arc::new(ShapeEdge::new(LineCurve::new(
            Point::new(3.0, 0.0, 0.0),
            Point::new(3.0, 4.0, 0.0),
        )));

        let seen = Cell::new(None);
        let result = cache.update_intersections_incremental("k", &edges, 1e-3, |changed| {
            seen.set(Some(changed.to_vec()));
            points_of(&find_intersections_touching(&edges, changed, 1e-3))
        });

        assert_eq!(seen.take(), Some(vec![2]));
        assert_eq!(result.valid_intersections, vec![p1]);
        assert_eq!(result.invalidated_edge_indices, vec![2]);
        assert_eq!(result.new_intersections.len(), 1);
        assert!(result.new_intersections[0].distance(&Point::new(3.0, 1.0, 0.0)) < 1e-3);
        assert_eq!(result.merged().len(), 2);

        // The caller persists the merged result; the engine does not
        assert_eq!(cache.intersection_entry("k").unwrap().intersection_points, vec![p1]);
    }

    #[test]
    fn test_missing_entry_means_full_recompute() {
        let cache = EdgeGeometryCache::new();
        let shape = EdgeSet::lattice(3, 1.0);
        let edges = shape.edges();

        let result = cache.update_intersections_incremental("absent", &edges, 1e-3, |changed| {
            assert!(changed.is_empty());
            points_of(&find_edge_intersections(&edges, 1e-3))
        });

        assert!(result.is_full_recompute());
        assert_eq!(result.new_intersections.len(), 9);
        assert!(result.valid_intersections.is_empty());
    }
}
