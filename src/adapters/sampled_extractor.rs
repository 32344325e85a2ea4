//! Sampled Edge Extractor
//!
//! Reference [`EdgeExtractor`]: filters edges, samples each curve with a
//! curvature-adaptive point count and emits the polyline as segment pairs
//! (`p0 p1 p1 p2 ...`). Extraction goes through the geometry tier of an
//! optional [`EdgeGeometryCache`]; intersections go through
//! [`crate::intersect`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cache::EdgeGeometryCache;
use crate::domain::ports::{Curve, Edge, EdgeExtractor, Shape};
use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::intersect::{find_edge_intersections, points_of};

/// Maximum samples along one curve
pub const MAX_SAMPLES: usize = 32;

/// Curvature values are capped at this
pub const MAX_CURVATURE: f64 = 5.0;

/// Intervals used to estimate curvature (6 evaluations)
const CURVATURE_INTERVALS: usize = 5;

/// Edge extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Samples per unit of parameter length (scaled by 0.2)
    pub sampling_density: f64,
    /// Edges shorter than this are skipped
    pub min_length: f64,
    /// Keep only straight-line edges
    pub lines_only: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            sampling_density: 80.0,
            min_length: 0.01,
            lines_only: false,
        }
    }
}

/// Geometry-tier cache key for a shape under `params`
pub fn geometry_key(shape_id: u64, params: &SamplingParams) -> String {
    format!(
        "original_{}_{}_{}_{}",
        shape_id,
        params.sampling_density,
        params.min_length,
        u8::from(params.lines_only)
    )
}

/// Maximum curvature `|d1 × d2| / |d1|³` over six evenly spaced parameters
pub fn estimate_curvature(curve: &dyn Curve) -> f64 {
    if curve.is_line() {
        return 0.0;
    }
    let (first, last) = curve.parameter_range();
    let mut max_curvature: f64 = 0.0;
    for i in 0..=CURVATURE_INTERVALS {
        let t = first + (last - first) * i as f64 / CURVATURE_INTERVALS as f64;
        let d1 = curve.d1(t);
        let speed = d1.magnitude();
        if speed > 1e-10 {
            let curvature = d1.cross(&curve.d2(t)).magnitude() / speed.powi(3);
            max_curvature = max_curvature.max(curvature);
        }
    }
    max_curvature.min(MAX_CURVATURE)
}

/// Number of sampling intervals for a curve of parameter length `length`
pub fn sample_count(curve: &dyn Curve, length: f64, density: f64) -> usize {
    if curve.is_line() {
        return 1;
    }
    let curvature = estimate_curvature(curve);
    let base = if curvature < 0.01 {
        4
    } else if curvature < 0.1 {
        6
    } else if curvature < 1.0 {
        8
    } else {
        12
    };
    let density_samples = ((length * density * 0.2) as usize).max(3);
    base.max(density_samples).min(MAX_SAMPLES)
}

/// Reference edge extractor
#[derive(Debug, Clone, Default)]
pub struct SampledEdgeExtractor {
    params: SamplingParams,
    cache: Option<Arc<EdgeGeometryCache>>,
}

impl SampledEdgeExtractor {
    pub fn new(params: SamplingParams) -> Self {
        Self {
            params,
            cache: None,
        }
    }

    /// Cache extracted geometry in `cache`
    pub fn with_cache(mut self, cache: Arc<EdgeGeometryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn params(&self) -> &SamplingParams {
        &self.params
    }

    /// Parameter length used for filtering and density, or None when the
    /// edge is filtered out
    fn effective_length(&self, edge: &dyn Edge, curve: &dyn Curve) -> Option<f64> {
        let (first, last) = curve.parameter_range();
        let chord = curve.value(first).distance(&curve.value(last));

        let length = if edge.is_closed() || chord < 1e-6 {
            let range = last - first;
            if range <= self.params.min_length {
                return None;
            }
            range
        } else if chord < self.params.min_length {
            return None;
        } else {
            chord
        };

        if self.params.lines_only && !curve.is_line() {
            return None;
        }
        Some(length)
    }

    /// Edges that survive filtering, with their original positions
    pub fn filter_edges(&self, edges: &[Arc<dyn Edge>]) -> Vec<(usize, Arc<dyn Edge>)> {
        edges
            .iter()
            .enumerate()
            .filter_map(|(i, edge)| {
                let curve = edge.curve()?;
                self.effective_length(edge.as_ref(), curve)?;
                Some((i, Arc::clone(edge)))
            })
            .collect()
    }

    /// Segment pairs for a single edge
    fn sample_edge(&self, index: usize, edge: &dyn Edge) -> Result<Vec<Point>> {
        let Some(curve) = edge.curve() else {
            return Ok(Vec::new());
        };
        let Some(length) = self.effective_length(edge, curve) else {
            return Ok(Vec::new());
        };

        let (first, last) = curve.parameter_range();
        let intervals = sample_count(curve, length, self.params.sampling_density);
        let samples: Vec<Point> = (0..=intervals)
            .map(|i| curve.value(first + (last - first) * i as f64 / intervals as f64))
            .collect();

        if let Some(bad) = samples.iter().position(|p| !p.is_finite()) {
            return Err(Error::InvalidGeometry {
                edge_index: index,
                reason: format!("non-finite sample at position {}", bad),
            });
        }

        let mut segments = Vec::with_capacity(intervals * 2);
        for pair in samples.windows(2) {
            segments.push(pair[0]);
            segments.push(pair[1]);
        }
        Ok(segments)
    }

    fn sample_all(
        &self,
        edges: &[Arc<dyn Edge>],
        progress: &mut dyn FnMut(u8, &str),
    ) -> Result<Vec<Point>> {
        let total = edges.len().max(1);
        let mut points = Vec::new();
        for (index, edge) in edges.iter().enumerate() {
            points.extend(self.sample_edge(index, edge.as_ref())?);
            let pct = ((index + 1) * 100 / total) as u8;
            progress(pct, "Extracting edges");
        }
        Ok(points)
    }
}

impl EdgeExtractor for SampledEdgeExtractor {
    #[instrument(skip(self, shape, progress), fields(shape_id = shape.shape_id()))]
    fn extract_edges(
        &self,
        shape: &dyn Shape,
        progress: &mut dyn FnMut(u8, &str),
    ) -> Result<Vec<Point>> {
        let edges = shape.edges();
        let points = match &self.cache {
            Some(cache) => {
                let key = geometry_key(shape.shape_id(), &self.params);
                cache.try_get_or_compute(&key, shape.shape_id(), || {
                    self.sample_all(&edges, progress)
                })?
            }
            None => self.sample_all(&edges, progress)?,
        };
        progress(100, "Edges extracted");
        debug!(edges = edges.len(), points = points.len(), "Extracted edge geometry");
        Ok(points)
    }

    #[instrument(skip(self, shape), fields(shape_id = shape.shape_id()))]
    fn find_intersections(&self, shape: &dyn Shape, tolerance: f64) -> Result<Vec<Point>> {
        let edges: Vec<Arc<dyn Edge>> = self
            .filter_edges(&shape.edges())
            .into_iter()
            .map(|(_, edge)| edge)
            .collect();
        let hits = find_edge_intersections(&edges, tolerance);
        debug!(edges = edges.len(), intersections = hits.len(), "Computed intersections");
        Ok(points_of(&hits))
    }
}

// =============================================================================
// Tests
// =============================================================================
