//! Memory Accounting
//!
//! Approximate footprint estimates for cached point lists and the budget
//! check that gates insertion. The numbers are estimates, not allocator
//! truth.

use std::mem::size_of;

use super::entry::EdgeIntersection;
use super::hasher::EdgeHash;
use crate::geometry::Point;

/// Bytes charged per stored point
pub const POINT_BYTES: usize = size_of::<Point>();

/// Fixed per-entry overhead (key, map slot, bookkeeping)
pub const ENTRY_OVERHEAD: usize = 128;

/// Memory accountant for cache entries
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryAccountant;

impl MemoryAccountant {
    /// Estimate the footprint of a plain point list
    #[inline]
    pub fn estimate(points: &[Point]) -> usize {
        points.len() * POINT_BYTES + ENTRY_OVERHEAD
    }

    /// Estimate the footprint of an intersection entry, including its
    /// per-edge metadata
    pub fn estimate_intersection_entry(
        points: &[Point],
        edge_intersections: &[EdgeIntersection],
        edge_hashes: &[EdgeHash],
    ) -> usize {
        Self::estimate(points)
            + edge_intersections.len() * size_of::<EdgeIntersection>()
            + edge_hashes.len() * size_of::<EdgeHash>()
    }

    /// Whether inserting `candidate` bytes on top of `current` breaks `budget`
    #[inline]
    pub fn should_evict(current: usize, candidate: usize, budget: usize) -> bool {
        current.saturating_add(candidate) > budget
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_estimate_empty_is_overhead() {
        assert_eq!(MemoryAccountant::estimate(&[]), ENTRY_OVERHEAD);
    }

    #[test]
    fn test_estimate_scales_with_points() {
        let points = vec![Point::default(); 10];
        assert_eq!(
            MemoryAccountant::estimate(&points),
            10 * POINT_BYTES + ENTRY_OVERHEAD
        );
    }

    #[test]
    fn test_intersection_entry_includes_metadata() {
        let points = vec![Point::default(); 2];
        let hits = vec![EdgeIntersection::new(0, 1, Point::default(), 0.0)];
        let hashes = vec![1u64, 2, 3];

        let plain = MemoryAccountant::estimate(&points);
        let full = MemoryAccountant::estimate_intersection_entry(&points, &hits, &hashes);
        assert_eq!(
            full,
            plain + size_of::<EdgeIntersection>() + 3 * size_of::<u64>()
        );
    }

    #[test]
    fn test_should_evict_boundary() {
        assert!(!MemoryAccountant::should_evict(60, 40, 100));
        assert!(MemoryAccountant::should_evict(61, 40, 100));
        assert!(MemoryAccountant::should_evict(usize::MAX, 1, 100));
    }

    proptest! {
        #[test]
        fn prop_should_evict_matches_sum(current in 0usize..1 << 40, candidate in 0usize..1 << 40, budget in 0usize..1 << 41) {
            prop_assert_eq!(
                MemoryAccountant::should_evict(current, candidate, budget),
                current + candidate > budget
            );
        }
    }
}
