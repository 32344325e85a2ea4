//! Domain Ports (Port/Adapter Pattern)
//!
//! Abstractions for the collaborators the cache engine depends on but does
//! not own: the geometry kernel's curves, edges and shapes, the edge
//! extractor that samples and intersects them, the cache seen by the async
//! task, and the UI-side progress display.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Engine                                │
//! │   EdgeGeometryCache │ AsyncIntersectionTask │ Manager        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Ports (Traits)                          │
//! │  Curve │ Edge │ Shape │ EdgeExtractor │ IntersectionStore   │
//! │  EventSink │ ProgressDisplay                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Adapters (crate::adapters)                  │
//! │  LineCurve │ ArcCurve │ EdgeSet │ SampledEdgeExtractor      │
//! │  ChannelEventSink │ MessageLog                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use crate::domain::events::IntersectionEvent;
use crate::error::Result;
use crate::geometry::{BoundingBox, Point, Vector};

/// Step used by the finite-difference derivative fallbacks
const DERIVATIVE_STEP: f64 = 1e-5;

// =============================================================================
// Geometry Kernel Ports
// =============================================================================

/// A parametric curve backing an edge.
pub trait Curve: Send + Sync {
    /// Textual name of the curve type ("Line", "Circle", ...)
    fn type_name(&self) -> &str;

    /// Parameter range `(first, last)` of the trimmed curve
    fn parameter_range(&self) -> (f64, f64);

    /// Evaluate the curve at parameter `t`
    fn value(&self, t: f64) -> Point;

    /// First derivative at `t`
    fn d1(&self, t: f64) -> Vector {
        let h = DERIVATIVE_STEP;
        (self.value(t + h) - self.value(t - h)) * (1.0 / (2.0 * h))
    }

    /// Second derivative at `t`
    fn d2(&self, t: f64) -> Vector {
        let h = DERIVATIVE_STEP;
        let forward = self.value(t + h) - self.value(t);
        let backward = self.value(t) - self.value(t - h);
        (forward + backward * -1.0) * (1.0 / (h * h))
    }

    /// True for straight lines, which the extractor samples with two points
    fn is_line(&self) -> bool {
        self.type_name() == "Line"
    }
}

/// An edge handle from the geometry kernel.
///
/// The cache never owns edges; it only derives hashes from them.
pub trait Edge: Send + Sync {
    /// Identity of the underlying shape (pointer-equivalent)
    fn shape_identity(&self) -> u64;

    /// The curve backing this edge, `None` for degenerate edges
    fn curve(&self) -> Option<&dyn Curve>;

    /// Whether the edge is topologically closed
    fn is_closed(&self) -> bool {
        match self.curve() {
            Some(curve) => {
                let (first, last) = curve.parameter_range();
                curve.value(first).distance(&curve.value(last)) < 1e-6
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for dyn Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Edge({})", self.shape_identity())
    }
}

/// A shape: the unit of geometry whose edges are extracted and intersected.
pub trait Shape: Send + Sync {
    /// Stable identity of the shape, used in cache keys
    fn shape_id(&self) -> u64;

    /// All edges of the shape in traversal order
    fn edges(&self) -> Vec<Arc<dyn Edge>>;

    /// Bounding box of the shape, `None` when the shape is void
    fn bounding_box(&self) -> Option<BoundingBox>;
}

/// Edge extraction and pairwise intersection, delegated to the kernel.
pub trait EdgeExtractor: Send + Sync {
    /// Extract displayable edge geometry, reporting sub-progress (0-100)
    fn extract_edges(
        &self,
        shape: &dyn Shape,
        progress: &mut dyn FnMut(u8, &str),
    ) -> Result<Vec<Point>>;

    /// Compute all edge-edge intersection points within `tolerance`
    fn find_intersections(&self, shape: &dyn Shape, tolerance: f64) -> Result<Vec<Point>>;
}

// =============================================================================
// Engine Ports
// =============================================================================

/// The slice of the intersection cache the async task depends on.
///
/// Injected so tests and alternate compositions can supply isolated stores.
pub trait IntersectionStore: Send + Sync {
    /// Pure lookup without compute fallback
    fn try_get_cached(&self, key: &str) -> Option<Vec<Point>>;

    /// Unconditional upsert
    fn store_cached(&self, key: &str, points: Vec<Point>, shape_hash: u64, tolerance: f64);
}

/// Destination for task events, typically a channel to the UI thread.
///
/// Publishing is synchronous and must not block; a closed receiver is not
/// an error for the publisher.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: IntersectionEvent);
}

/// UI-side progress display (status bar gauge + message panel).
pub trait ProgressDisplay: Send + Sync {
    /// Show progress (0-100) and a short status line
    fn set_progress(&self, progress: u8, message: &str);

    /// Append free text to the message panel
    fn append_message(&self, text: &str);

    /// Hide the progress gauge once a computation has finished
    fn finish(&self) {}
}
