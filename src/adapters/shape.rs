//! Reference Shapes
//!
//! [`ShapeEdge`] and [`EdgeSet`] implement the kernel's [`Edge`] and
//! [`Shape`] ports over the reference curves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::ports::{Curve, Edge, Shape};
use crate::geometry::{BoundingBox, Point};
use crate::intersect::pairwise::curve_bounds;

use super::curves::{ArcCurve, LineCurve};

/// Source of process-unique identities, standing in for kernel pointers
static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

fn next_identity() -> u64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}

/// Edge backed by an owned curve.
///
/// Every constructed edge gets a fresh identity, so rebuilding an edge with
/// the same geometry still changes its hash.
pub struct ShapeEdge {
    identity: u64,
    curve: Option<Box<dyn Curve>>,
}

impl ShapeEdge {
    pub fn new<C: Curve + 'static>(curve: C) -> Self {
        Self {
            identity: next_identity(),
            curve: Some(Box::new(curve)),
        }
    }

    /// Edge without an underlying curve
    pub fn degenerate() -> Self {
        Self {
            identity: next_identity(),
            curve: None,
        }
    }

    pub fn line(start: Point, end: Point) -> Self {
        Self::new(LineCurve::new(start, end))
    }
}

impl std::fmt::Debug for ShapeEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeEdge")
            .field("identity", &self.identity)
            .field("curve", &self.curve.as_ref().map(|c| c.type_name().to_string()))
            .finish()
    }
}

impl Edge for ShapeEdge {
    fn shape_identity(&self) -> u64 {
        self.identity
    }

    fn curve(&self) -> Option<&dyn Curve> {
        self.curve.as_deref()
    }
}

/// A shape made of an edge list.
///
/// Any edit gives the shape a fresh id, so cache entries keyed on the old
/// id are never served for the new edge list. A clone keeps the id until
/// one of the two copies is edited.
#[derive(Debug, Clone)]
pub struct EdgeSet {
    id: u64,
    edges: Vec<Arc<dyn Edge>>,
}

impl EdgeSet {
    pub fn new(edges: Vec<Arc<dyn Edge>>) -> Self {
        Self {
            id: next_identity(),
            edges,
        }
    }

    /// Square lattice: `lines` horizontal and `lines` vertical segments of
    /// length `spacing * (lines + 1)`, crossing at `lines²` points
    pub fn lattice(lines: usize, spacing: f64) -> Self {
        let extent = spacing * (lines + 1) as f64;
        let mut edges: Vec<Arc<dyn Edge>> = Vec::with_capacity(lines * 2);
        for k in 1..=lines {
            let at = spacing * k as f64;
            edges.push(Arc::new(ShapeEdge::line(
                Point::new(0.0, at, 0.0),
                Point::new(extent, at, 0.0),
            )));
        }
        for k in 1..=lines {
            let at = spacing * k as f64;
            edges.push(Arc::new(ShapeEdge::line(
                Point::new(at, 0.0, 0.0),
                Point::new(at, extent, 0.0),
            )));
        }
        Self::new(edges)
    }

    /// Add a full circle
    pub fn with_circle(mut self, center: Point, radius: f64) -> Self {
        self.push(Arc::new(ShapeEdge::new(ArcCurve::circle(center, radius))));
        self
    }

    pub fn push(&mut self, edge: Arc<dyn Edge>) {
        self.edges.push(edge);
        self.id = next_identity();
    }

    /// Replace the edge at `index`, returning the previous one
    pub fn replace_edge(&mut self, index: usize, edge: Arc<dyn Edge>) -> Option<Arc<dyn Edge>> {
        let slot = self.edges.get_mut(index)?;
        let old = std::mem::replace(slot, edge);
        self.id = next_identity();
        Some(old)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl Shape for EdgeSet {
    fn shape_id(&self) -> u64 {
        self.id
    }

    fn edges(&self) -> Vec<Arc<dyn Edge>> {
        self.edges.clone()
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        self.edges
            .iter()
            .filter_map(|e| e.curve().and_then(|c| curve_bounds(c, 0.0)))
            .reduce(|mut acc, b| {
                acc.merge(&b);
                acc
            })
    }
}
