//! Incremental Intersection Updates
//!
//! Re-uses cached intersections whose two edges are unchanged and asks the
//! caller to compute only the pairs involving changed edges.
//!
//! The update never writes back. A caller that wants the next update to
//! take the fast path must re-store the merged points together with fresh
//! per-edge metadata via
//! [`store_cached_with_edges`](EdgeGeometryCache::store_cached_with_edges).
//! Without that, the following call sees stale hashes (or none) and falls
//! back to a full recompute.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::entry::EdgeIntersection;
use super::hasher::{hash_edge, EdgeHash};
use super::store::EdgeGeometryCache;
use crate::domain::ports::Edge;
use crate::geometry::Point;

/// Outcome of one incremental update
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncrementalUpdateResult {
    /// Cached points whose edge pair is unchanged
    pub valid_intersections: Vec<Point>,
    /// Points returned by the compute closure
    pub new_intersections: Vec<Point>,
    /// Changed edge positions; empty for a full recompute
    pub invalidated_edge_indices: Vec<usize>,
    /// Set when the cached entry could not be diffed
    pub full_recompute: bool,
}

impl IncrementalUpdateResult {
    /// Valid points followed by new points
    pub fn merged(&self) -> Vec<Point> {
        let mut all =
            Vec::with_capacity(self.valid_intersections.len() + self.new_intersections.len());
        all.extend_from_slice(&self.valid_intersections);
        all.extend_from_slice(&self.new_intersections);
        all
    }

    /// Whether the compute closure was asked for every pair
    pub fn is_full_recompute(&self) -> bool {
        self.full_recompute
    }
}

/// Cached state needed to diff against a fresh edge list
struct Snapshot {
    edge_hashes: Vec<EdgeHash>,
    edge_intersections: Vec<EdgeIntersection>,
}

impl EdgeGeometryCache {
    /// Diff `current_edges` against the entry at `key` and recompute only
    /// what changed.
    ///
    /// `compute` receives the changed edge positions, or an empty slice
    /// meaning "every pair". It is not called at all when nothing changed.
    /// Runs without the cache lock held.
    pub fn update_intersections_incremental<F>(
        &self,
        key: &str,
        current_edges: &[Arc<dyn Edge>],
        tolerance: f64,
        compute: F,
    ) -> IncrementalUpdateResult
    where
        F: FnOnce(&[usize]) -> Vec<Point>,
    {
        let snapshot = self.incremental_snapshot(key, current_edges.len(), tolerance);

        let Some(snapshot) = snapshot else {
            debug!(key = %key, edges = current_edges.len(), "Incremental update needs full computation");
            return IncrementalUpdateResult {
                valid_intersections: Vec::new(),
                new_intersections: compute(&[]),
                invalidated_edge_indices: Vec::new(),
                full_recompute: true,
            };
        };

        let changed: Vec<usize> = current_edges
            .iter()
            .zip(&snapshot.edge_hashes)
            .enumerate()
            .filter(|(_, (edge, stored))| hash_edge(edge.as_ref()) != **stored)
            .map(|(index, _)| index)
            .collect();

        let edge_count = current_edges.len();
        let valid_intersections: Vec<Point> = snapshot
            .edge_intersections
            .iter()
            .filter(|hit| {
                hit.edge1_index < edge_count
                    && hit.edge2_index < edge_count
                    && !changed.contains(&hit.edge1_index)
                    && !changed.contains(&hit.edge2_index)
            })
            .map(|hit| hit.point)
            .collect();

        if changed.is_empty() {
            debug!(key = %key, valid = valid_intersections.len(), "No edges changed");
            return IncrementalUpdateResult {
                valid_intersections,
                ..Default::default()
            };
        }

        debug!(
            key = %key,
            changed = changed.len(),
            valid = valid_intersections.len(),
            "Recomputing intersections for changed edges"
        );
        let new_intersections = compute(&changed);
        IncrementalUpdateResult {
            valid_intersections,
            new_intersections,
            invalidated_edge_indices: changed,
            full_recompute: false,
        }
    }

    /// Copy the per-edge metadata out of a usable entry, or None when the
    /// entry is absent, computed with another tolerance, or was stored for
    /// a different number of edges
    fn incremental_snapshot(&self, key: &str, edge_count: usize, tolerance: f64) -> Option<Snapshot> {
        let mut state = self.state.lock();
        let entry = state.intersections.get_mut(key)?;
        if !entry.matches_tolerance(tolerance) || entry.edge_hashes.len() != edge_count {
            return None;
        }
        entry.touch();
        Some(Snapshot {
            edge_hashes: entry.edge_hashes.clone(),
            edge_intersections: entry.edge_intersections.clone(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
