//! edgecache - Edge Geometry and Intersection Cache
//!
//! Caches sampled edge geometry and edge-edge intersection points for CAD
//! shapes, reuses intersection results across edits, and runs intersection
//! computation in the background with batched, cancellable progress
//! reporting.
//!
//! # Architecture
//!
//! ```text
//! AsyncIntersectionManager ──► AsyncIntersectionTask (worker thread)
//!                                   │            │
//!                     EdgeExtractor ┘            └ IntersectionStore
//!                   (sample + intersect)           (EdgeGeometryCache)
//!                                   │
//!                    IntersectionEvent ──► UI channel / ProgressDisplay
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Reference geometry kernel, event sinks, message log
//! - [`cache`] - Geometry and intersection cache with incremental updates
//! - [`config`] - YAML engine configuration
//! - [`domain`] - Ports and events
//! - [`error`] - Error types
//! - [`geometry`] - Point, vector and bounding-box value types
//! - [`intersect`] - Pairwise intersection and grid broad phase
//! - [`task`] - Background intersection task and manager

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod intersect;
pub mod task;

// Re-export commonly used types
pub use cache::{EdgeGeometryCache, IncrementalUpdateResult};
pub use config::EngineConfig;
pub use domain::{IntersectionEvent, Shape};
pub use error::{Error, Result};
pub use geometry::{BoundingBox, Point, Vector};
pub use task::{AsyncIntersectionManager, AsyncIntersectionTask, TaskState};
