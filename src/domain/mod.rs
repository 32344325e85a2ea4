//! Domain Layer
//!
//! The abstractions the engine is written against.
//!
//! - **Ports** (`ports.rs`) - Trait abstractions for the geometry kernel, the
//!   cache as seen by the async task, and the UI progress display
//! - **Events** (`events.rs`) - Events streamed from the worker to the UI
//!
//! # Usage
//!
//! ```ignore
//! use edgecache::domain::ports::{EdgeExtractor, Shape};
//!
//! fn count_intersections<X: EdgeExtractor>(extractor: &X, shape: &dyn Shape) -> Result<usize> {
//!     Ok(extractor.find_intersections(shape, 1e-3)?.len())
//! }
//! ```

pub mod events;
pub mod ports;

pub use events::IntersectionEvent;
pub use ports::{Curve, Edge, EdgeExtractor, EventSink, IntersectionStore, ProgressDisplay, Shape};
