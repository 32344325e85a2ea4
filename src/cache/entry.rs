//! Cache Entry Types
//!
//! Entries owned exclusively by the cache maps. Callers only ever see copies.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::hasher::EdgeHash;
use super::memory::MemoryAccountant;
use crate::geometry::Point;

/// Build the intersection cache key for a shape and tolerance.
///
/// The tolerance is rendered with six decimals, so tolerances closer than
/// 1e-6 share a key; the stored tolerance still gates hits.
pub fn intersection_key(shape_hash: u64, tolerance: f64) -> String {
    format!("intersections_{}_{:.6}", shape_hash, tolerance)
}

/// Plain edge-geometry entry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Sampled edge points
    pub points: Vec<Point>,
    /// Hash of the shape the points came from
    pub shape_hash: u64,
    /// Last access time
    pub last_access: Instant,
    /// Estimated footprint in bytes
    pub memory_usage: usize,
}

impl CacheEntry {
    /// Create a new entry, estimating its footprint
    pub fn new(points: Vec<Point>, shape_hash: u64) -> Self {
        let memory_usage = MemoryAccountant::estimate(&points);
        Self {
            points,
            shape_hash,
            last_access: Instant::now(),
            memory_usage,
        }
    }

    /// Record an access
    #[inline]
    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    /// Time since the last access
    #[inline]
    pub fn age(&self) -> Duration {
        self.last_access.elapsed()
    }
}

/// Which pair of edges produced an intersection point.
///
/// Indices are positions in the caller's edge list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeIntersection {
    pub edge1_index: usize,
    pub edge2_index: usize,
    pub point: Point,
    pub distance: f64,
}

impl EdgeIntersection {
    pub fn new(edge1_index: usize, edge2_index: usize, point: Point, distance: f64) -> Self {
        Self {
            edge1_index,
            edge2_index,
            point,
            distance,
        }
    }

    /// Whether this record involves edge `index`
    #[inline]
    pub fn touches(&self, index: usize) -> bool {
        self.edge1_index == index || self.edge2_index == index
    }
}

/// Intersection-result entry
#[derive(Debug, Clone)]
pub struct IntersectionCacheEntry {
    /// Intersection points
    pub intersection_points: Vec<Point>,
    /// Hash of the shape the intersections came from
    pub shape_hash: u64,
    /// Tolerance the points were computed with
    pub tolerance: f64,
    /// Last access time
    pub last_access: Instant,
    /// Estimated footprint in bytes
    pub memory_usage: usize,
    /// Seconds spent computing the points (0 when stored externally)
    pub computation_time: f64,
    /// Per-pair provenance, populated only by the incremental path
    pub edge_intersections: Vec<EdgeIntersection>,
    /// Per-edge hashes, populated only by the incremental path
    pub edge_hashes: Vec<EdgeHash>,
}

impl IntersectionCacheEntry {
    /// Create an entry without edge metadata
    pub fn new(points: Vec<Point>, shape_hash: u64, tolerance: f64) -> Self {
        Self::with_edges(points, shape_hash, tolerance, Vec::new(), Vec::new())
    }

    /// Create an entry carrying per-edge metadata
    pub fn with_edges(
        points: Vec<Point>,
        shape_hash: u64,
        tolerance: f64,
        edge_intersections: Vec<EdgeIntersection>,
        edge_hashes: Vec<EdgeHash>,
    ) -> Self {
        let memory_usage =
            MemoryAccountant::estimate_intersection_entry(&points, &edge_intersections, &edge_hashes);
        Self {
            intersection_points: points,
            shape_hash,
            tolerance,
            last_access: Instant::now(),
            memory_usage,
            computation_time: 0.0,
            edge_intersections,
            edge_hashes,
        }
    }

    /// Set computation time in seconds
    pub fn with_computation_time(mut self, seconds: f64) -> Self {
        self.computation_time = seconds;
        self
    }

    /// Whether a lookup with `tolerance` may reuse this entry
    #[inline]
    pub fn matches_tolerance(&self, tolerance: f64) -> bool {
        (self.tolerance - tolerance).abs() < super::TOLERANCE_EPSILON
    }

    #[inline]
    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    #[inline]
    pub fn age(&self) -> Duration {
        self.last_access.elapsed()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection_key_format() {
        assert_eq!(intersection_key(42, 0.005), "intersections_42_0.005000");
        assert_ne!(intersection_key(42, 0.005), intersection_key(43, 0.005));
    }

    #[test]
    fn test_cache_entry_memory_estimate() {
        let entry = CacheEntry::new(vec![Point::default(); 4], 7);
        assert_eq!(entry.memory_usage, MemoryAccountant::estimate(&entry.points));
        assert_eq!(entry.shape_hash, 7);
    }

    #[test]
    fn test_touch_updates_last_access() {
        let mut entry = CacheEntry::new(vec![], 0);
        let before = entry.last_access;
        std::thread::sleep(Duration::from_millis(2));
        entry.touch();
        assert!(entry.last_access > before);
    }

    #[test]
    fn test_tolerance_matching() {
        let entry = IntersectionCacheEntry::new(vec![], 0, 0.01);
        assert!(entry.matches_tolerance(0.01));
        assert!(entry.matches_tolerance(0.01 + 1e-12));
        assert!(!entry.matches_tolerance(0.01 + 1e-6));
    }

    #[test]
    fn test_edge_intersection_touches() {
        let hit = EdgeIntersection::new(0, 2, Point::default(), 0.0);
        assert!(hit.touches(0));
        assert!(hit.touches(2));
        assert!(!hit.touches(1));
    }

    #[test]
    fn test_entry_with_edges_counts_metadata() {
        let plain = IntersectionCacheEntry::new(vec![Point::default()], 0, 0.1);
        let rich = IntersectionCacheEntry::with_edges(
            vec![Point::default()],
            0,
            0.1,
            vec![EdgeIntersection::new(0, 1, Point::default(), 0.0)],
            vec![1, 2],
        )
        .with_computation_time(0.5);

        assert!(rich.memory_usage > plain.memory_usage);
        assert_eq!(rich.computation_time, 0.5);
    }
}
