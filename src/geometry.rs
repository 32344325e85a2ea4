//! Geometry Value Types
//!
//! Plain 3D value types shared by the cache, the intersection routines and
//! the reference kernel adapters. The cache never interprets a [`Point`]; it
//! only stores and copies it.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A 3D coordinate supplied by the geometry kernel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    /// Create a new point
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        (*self - *other).magnitude()
    }

    /// Midpoint between two points
    #[inline]
    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    /// True when every coordinate is finite
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add<Vector> for Point {
    type Output = Point;

    fn add(self, v: Vector) -> Point {
        Point::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }
}

impl Sub for Point {
    type Output = Vector;

    fn sub(self, other: Point) -> Vector {
        Vector::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

/// A 3D direction / derivative vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    #[inline]
    pub fn cross(&self, other: &Vector) -> Vector {
        Vector::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, other: Vector) -> Vector {
        Vector::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, s: f64) -> Vector {
        Vector::new(self.x * s, self.y * s, self.z * s)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Smallest box containing a single point
    pub fn from_point(p: Point) -> Self {
        Self { min: p, max: p }
    }

    /// Smallest box containing every point, `None` for an empty slice
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self::from_point(*first);
        for p in rest {
            bbox.add(*p);
        }
        Some(bbox)
    }

    /// Grow the box to include a point
    pub fn add(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Grow the box to include another box
    pub fn merge(&mut self, other: &BoundingBox) {
        self.add(other.min);
        self.add(other.max);
    }

    /// Enlarge the box by `margin` on every side
    pub fn enlarged(&self, margin: f64) -> Self {
        Self {
            min: Point::new(self.min.x - margin, self.min.y - margin, self.min.z - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin, self.max.z + margin),
        }
    }

    /// Overlap test (touching boxes intersect)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn center(&self) -> Point {
        self.min.midpoint(&self.max)
    }

    /// Length of the min→max diagonal
    pub fn diagonal(&self) -> f64 {
        self.min.distance(&self.max)
    }

    /// Extent along each axis
    pub fn size(&self) -> Vector {
        self.max - self.min
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance_and_midpoint() {
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(a.midpoint(&b), Point::new(1.5, 2.0, 0.0));
    }

    #[test]
    fn test_cross_product() {
        let x = Vector::new(1.0, 0.0, 0.0);
        let y = Vector::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(&y), Vector::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_bounding_box_from_points() {
        assert!(BoundingBox::from_points(&[]).is_none());

        let bbox = BoundingBox::from_points(&[
            Point::new(1.0, -2.0, 0.0),
            Point::new(-1.0, 2.0, 3.0),
        ])
        .unwrap();
        assert_eq!(bbox.min, Point::new(-1.0, -2.0, 0.0));
        assert_eq!(bbox.max, Point::new(1.0, 2.0, 3.0));
        assert_eq!(bbox.center(), Point::new(0.0, 0.0, 1.5));
    }

    #[test]
    fn test_bounding_box_intersects_with_margin() {
        let a = BoundingBox::from_points(&[Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 0.0)])
            .unwrap();
        let b = BoundingBox::from_points(&[Point::new(1.1, 0.0, 0.0), Point::new(2.0, 1.0, 0.0)])
            .unwrap();

        assert!(!a.intersects(&b));
        assert!(a.enlarged(0.05).intersects(&b.enlarged(0.05)));
    }

    #[test]
    fn test_diagonal() {
        let bbox = BoundingBox::from_points(&[Point::new(0.0, 0.0, 0.0), Point::new(2.0, 3.0, 6.0)])
            .unwrap();
        assert!((bbox.diagonal() - 7.0).abs() < 1e-12);
    }
}
