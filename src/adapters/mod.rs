//! Infrastructure Adapters
//!
//! Adapter implementations for the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  Curve │ Edge │ Shape │ EdgeExtractor │ EventSink          │ │
//! │  │  ProgressDisplay                                            │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ LineCurve │ ArcCurve │ ShapeEdge │ EdgeSet                 │ │
//! │  │ SampledEdgeExtractor │ ChannelEventSink │ MessageLog       │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use edgecache::adapters::{EdgeSet, SampledEdgeExtractor};
//! use edgecache::domain::ports::EdgeExtractor;
//!
//! let shape = EdgeSet::lattice(10, 1.0);
//! let points = SampledEdgeExtractor::default().find_intersections(&shape, 1e-3)?;
//! ```

mod curves;
mod event_publisher;
mod message_log;
mod sampled_extractor;
mod shape;

pub use curves::{ArcCurve, LineCurve};
pub use event_publisher::{ChannelEventSink, InMemoryEventCollector};
pub use message_log::MessageLog;
pub use sampled_extractor::{
    estimate_curvature, geometry_key, sample_count, SampledEdgeExtractor, SamplingParams,
    MAX_SAMPLES,
};
pub use shape::{EdgeSet, ShapeEdge};
