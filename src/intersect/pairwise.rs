//! Pairwise closest-approach test
//!
//! Both curves are sampled uniformly in parameter space; the closest sample
//! pair decides. Cheap and kernel-agnostic, at the price of missing
//! crossings finer than the sampling step.

use crate::domain::ports::Curve;
use crate::geometry::{BoundingBox, Point};

/// Parameter intervals per curve (so `SAMPLE_INTERVALS + 1` samples)
pub const SAMPLE_INTERVALS: usize = 16;

/// Uniform parameter samples along `curve`, both ends included
pub fn sample_curve(curve: &dyn Curve, intervals: usize) -> Vec<Point> {
    let intervals = intervals.max(1);
    let (first, last) = curve.parameter_range();
    (0..=intervals)
        .map(|i| curve.value(first + (last - first) * i as f64 / intervals as f64))
        .collect()
}

/// Approximate bounds of a curve from its samples, grown by `margin`
pub fn curve_bounds(curve: &dyn Curve, margin: f64) -> Option<BoundingBox> {
    BoundingBox::from_points(&sample_curve(curve, SAMPLE_INTERVALS)).map(|b| b.enlarged(margin))
}

/// Closest pair between two pre-sampled polylines
fn closest_pair(a: &[Point], b: &[Point]) -> Option<(Point, Point, f64)> {
    let mut best: Option<(Point, Point, f64)> = None;
    for p in a {
        for q in b {
            let d = p.distance(q);
            if best.map_or(true, |(_, _, bd)| d < bd) {
                best = Some((*p, *q, d));
            }
        }
    }
    best
}

/// Intersection of two pre-sampled curves: the midpoint of the closest
/// sample pair when it is nearer than `tolerance`
pub fn intersect_samples(a: &[Point], b: &[Point], tolerance: f64) -> Option<(Point, f64)> {
    let (p, q, distance) = closest_pair(a, b)?;
    (distance < tolerance).then(|| (p.midpoint(&q), distance))
}

/// Intersection point and closest distance of two curves, if any
pub fn intersect_pair(a: &dyn Curve, b: &dyn Curve, tolerance: f64) -> Option<(Point, f64)> {
    intersect_samples(
        &sample_curve(a, SAMPLE_INTERVALS),
        &sample_curve(b, SAMPLE_INTERVALS),
        tolerance,
    )
}
