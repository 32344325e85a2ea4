//! Edge-Edge Intersection
//!
//! Finds points where edges of a shape meet within a tolerance.
//!
//! # Architecture
//!
//! ```text
//!   edges ──► prepare (sample 17 params, bounds + 2·tol margin)
//!                │
//!        ┌───────┴────────┐
//!        │ n < 20         │ n ≥ 20
//!        ▼                ▼
//!    all pairs      UniformGrid (27-cell neighbourhood)
//!        │                │
//!        └───────┬────────┘
//!                ▼
//!       closest sample pair < tol ──► midpoint
//!                │
//!                ▼
//!           dedupe_points
//! ```

pub mod grid;
pub mod pairwise;

use std::sync::Arc;

use tracing::debug;

use crate::cache::entry::EdgeIntersection;
use crate::domain::ports::Edge;
use crate::geometry::{BoundingBox, Point};

pub use grid::UniformGrid;
pub use pairwise::{intersect_pair, sample_curve, SAMPLE_INTERVALS};

/// Below this many edges every pair is tested directly
pub const GRID_THRESHOLD: usize = 20;

/// Recent points checked for duplicates on the grid path
pub const DEDUPE_WINDOW: usize = 20;

/// A curve-backed edge ready for pair testing
struct PreparedEdge {
    index: usize,
    samples: Vec<Point>,
    bounds: BoundingBox,
}

/// Sample every curve-backed edge once; edges without a curve are skipped
fn prepare(edges: &[Arc<dyn Edge>], margin: f64) -> Vec<PreparedEdge> {
    edges
        .iter()
        .enumerate()
        .filter_map(|(index, edge)| {
            let samples = sample_curve(edge.curve()?, SAMPLE_INTERVALS);
            let bounds = BoundingBox::from_points(&samples)?.enlarged(margin);
            Some(PreparedEdge {
                index,
                samples,
                bounds,
            })
        })
        .collect()
}

fn test_pair(a: &PreparedEdge, b: &PreparedEdge, tolerance: f64) -> Option<EdgeIntersection> {
    pairwise::intersect_samples(&a.samples, &b.samples, tolerance)
        .map(|(point, distance)| EdgeIntersection::new(a.index, b.index, point, distance))
}

/// All intersections between edges of the list.
///
/// Indices in the result refer to positions in `edges`.
pub fn find_edge_intersections(edges: &[Arc<dyn Edge>], tolerance: f64) -> Vec<EdgeIntersection> {
    let prepared = prepare(edges, 2.0 * tolerance);

    if prepared.len() < GRID_THRESHOLD {
        let mut hits = Vec::new();
        for (i, a) in prepared.iter().enumerate() {
            for b in &prepared[i + 1..] {
                hits.extend(test_pair(a, b, tolerance));
            }
        }
        return dedupe_points(hits, tolerance, None);
    }

    let boxes: Vec<BoundingBox> = prepared.iter().map(|e| e.bounds).collect();
    let Some(grid) = UniformGrid::build(&boxes) else {
        return Vec::new();
    };
    let pairs = grid.candidate_pairs(&boxes);
    debug!(
        edges = prepared.len(),
        dims = ?grid.dims(),
        candidates = pairs.len(),
        "Grid broad phase"
    );

    let hits = pairs
        .into_iter()
        .filter_map(|(i, j)| test_pair(&prepared[i], &prepared[j], tolerance))
        .collect();
    dedupe_points(hits, tolerance, Some(DEDUPE_WINDOW))
}

/// Intersections for pairs with at least one edge in `changed`.
///
/// An empty `changed` means every pair.
pub fn find_intersections_touching(
    edges: &[Arc<dyn Edge>],
    changed: &[usize],
    tolerance: f64,
) -> Vec<EdgeIntersection> {
    if changed.is_empty() {
        return find_edge_intersections(edges, tolerance);
    }

    let prepared = prepare(edges, 2.0 * tolerance);
    let mut hits = Vec::new();
    for (i, a) in prepared.iter().enumerate() {
        for b in &prepared[i + 1..] {
            if !changed.contains(&a.index) && !changed.contains(&b.index) {
                continue;
            }
            if a.bounds.intersects(&b.bounds) {
                hits.extend(test_pair(a, b, tolerance));
            }
        }
    }
    dedupe_points(hits, tolerance, None)
}

/// Drop hits closer than `tolerance` to an already kept one.
///
/// With `window` only that many of the most recently kept points are
/// compared, otherwise all of them.
pub fn dedupe_points(
    hits: Vec<EdgeIntersection>,
    tolerance: f64,
    window: Option<usize>,
) -> Vec<EdgeIntersection> {
    let mut kept: Vec<EdgeIntersection> = Vec::with_capacity(hits.len());
    for hit in hits {
        let start = window.map_or(0, |w| kept.len().saturating_sub(w));
        let duplicate = kept[start..]
            .iter()
            .any(|k| k.point.distance(&hit.point) < tolerance);
        if !duplicate {
            kept.push(hit);
        }
    }
    kept
}

/// Points of a hit list, in order
pub fn points_of(hits: &[EdgeIntersection]) -> Vec<Point> {
    hits.iter().map(|h| h.point).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LineCurve, ShapeEdge};

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Arc<dyn Edge> {
        Arc::new(ShapeEdge::new(LineCurve::new(
            Point::new(x0, y0, 0.0),
            Point::new(x1, y1, 0.0),
        )))
    }

    /// `n` horizontal and `n` vertical lines of length 16 crossing on
    /// integer sample positions
    fn lattice(n: usize) -> Vec<Arc<dyn Edge>> {
        let mut edges = Vec::new();
        for k in 1..=n {
            edges.push(line(0.0, k as f64, 16.0, k as f64));
        }
        for k in 1..=n {
            edges.push(line(k as f64, 0.0, k as f64, 16.0));
        }
        edges
    }

    #[test]
    fn test_simple_path_small_lattice() {
        let edges = lattice(3);
        let hits = find_edge_intersections(&edges, 0.1);
        assert_eq!(hits.len(), 9);
        assert!(hits.iter().all(|h| h.edge1_index < 3 && h.edge2_index >= 3));
    }

    #[test]
    fn test_grid_path_matches_brute_force() {
        let edges = lattice(15);
        assert!(edges.len() >= GRID_THRESHOLD);

        let grid_hits = find_edge_intersections(&edges, 0.1);

        let mut brute = 0;
        for i in 0..edges.len() {
            for j in i + 1..edges.len() {
                let (a, b) = (edges[i].curve().unwrap(), edges[j].curve().unwrap());
                if intersect_pair(a, b, 0.1).is_some() {
                    brute += 1;
                }
            }
        }
        assert_eq!(brute, 225);
        assert_eq!(grid_hits.len(), brute);
    }

    #[test]
    fn test_degenerate_edges_are_skipped() {
        let edges: Vec<Arc<dyn Edge>> = vec![
            line(0.0, 0.0, 16.0, 16.0),
            Arc::new(ShapeEdge::degenerate()),
            line(0.0, 16.0, 16.0, 0.0),
        ];
        let hits = find_edge_intersections(&edges, 0.01);
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].edge1_index, hits[0].edge2_index), (0, 2));
    }

    #[test]
    fn test_touching_only_tests_changed_pairs() {
        let edges = lattice(3);
        let hits = find_intersections_touching(&edges, &[0], 0.1);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.touches(0)));

        let all = find_intersections_touching(&edges, &[], 0.1);
        assert_eq!(all.len(), 9);
    }

    #[test]
    fn test_dedupe_points_window() {
        let at = |x: f64| EdgeIntersection::new(0, 1, Point::new(x, 0.0, 0.0), 0.0);
        let hits = vec![at(0.0), at(5.0), at(0.001), at(10.0)];

        assert_eq!(dedupe_points(hits.clone(), 0.01, None).len(), 3);
        // Only the last kept point is checked, so the near-duplicate of 0.0 survives
        assert_eq!(dedupe_points(hits, 0.01, Some(1)).len(), 4);
    }
}
