//! Reference Curves
//!
//! Analytic curves implementing the [`Curve`] port, enough to drive the
//! engine without a full geometry kernel.

use crate::domain::ports::Curve;
use crate::geometry::{Point, Vector};

/// Straight segment parameterized by arc length over `[0, length]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineCurve {
    start: Point,
    end: Point,
}

impl LineCurve {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    fn direction(&self) -> Vector {
        let length = self.length();
        if length > 0.0 {
            (self.end - self.start) * (1.0 / length)
        } else {
            Vector::default()
        }
    }
}

impl Curve for LineCurve {
    fn type_name(&self) -> &str {
        "Line"
    }

    fn parameter_range(&self) -> (f64, f64) {
        (0.0, self.length())
    }

    fn value(&self, t: f64) -> Point {
        self.start + self.direction() * t
    }

    fn d1(&self, _t: f64) -> Vector {
        self.direction()
    }

    fn d2(&self, _t: f64) -> Vector {
        Vector::default()
    }
}

/// Circular arc in a plane parallel to XY, parameterized by angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcCurve {
    center: Point,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
}

impl ArcCurve {
    /// Arc from `start_angle` to `end_angle` radians
    pub fn new(center: Point, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            end_angle,
        }
    }

    /// Full circle
    pub fn circle(center: Point, radius: f64) -> Self {
        Self::new(center, radius, 0.0, std::f64::consts::TAU)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Curve for ArcCurve {
    fn type_name(&self) -> &str {
        "Circle"
    }

    fn parameter_range(&self) -> (f64, f64) {
        (self.start_angle, self.end_angle)
    }

    fn value(&self, t: f64) -> Point {
        self.center + Vector::new(self.radius * t.cos(), self.radius * t.sin(), 0.0)
    }

    fn d1(&self, t: f64) -> Vector {
        Vector::new(-self.radius * t.sin(), self.radius * t.cos(), 0.0)
    }

    fn d2(&self, t: f64) -> Vector {
        Vector::new(-self.radius * t.cos(), -self.radius * t.sin(), 0.0)
    }
}
