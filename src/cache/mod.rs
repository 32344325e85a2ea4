//! Edge Geometry Cache
//!
//! In-process cache for sampled edge geometry and edge-edge intersection
//! results, with incremental re-use of intersections across edits.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    EdgeGeometryCache                      │
//! │                                                           │
//! │   Mutex<CacheState>                                       │
//! │   ┌────────────────────┐     ┌──────────────────────────┐ │
//! │   │  geometry tier     │     │  intersection tier       │ │
//! │   │  key → CacheEntry  │     │  key → IntersectionEntry │ │
//! │   └─────────┬──────────┘     └────────────┬─────────────┘ │
//! │             └──────── total_memory ───────┘               │
//! │                    (one shared budget)                    │
//! │                                                           │
//! │   CacheMetrics (atomics, outside the lock)                │
//! └───────────────────────────────────────────────────────────┘
//!          ▲                                   ▲
//!          │ get_or_compute                    │ try_get_cached / store_cached
//!   SampledEdgeExtractor               AsyncIntersectionTask
//! ```
//!
//! Compute closures never run under the lock; see [`store`] for the
//! check-release-compute-recheck protocol.

pub mod entry;
pub mod hasher;
pub mod incremental;
pub mod memory;
pub mod metrics;
pub mod policy;
pub mod store;

use std::time::Duration;

pub use entry::{intersection_key, CacheEntry, EdgeIntersection, IntersectionCacheEntry};
pub use hasher::{hash_edge, hash_edges, EdgeHash};
pub use incremental::IncrementalUpdateResult;
pub use memory::MemoryAccountant;
pub use metrics::{CacheMetrics, CacheStats};
pub use policy::CacheConfig;
pub use store::EdgeGeometryCache;

/// Default combined memory budget (500 MB)
pub const DEFAULT_MEMORY_BUDGET: usize = 500 * 1024 * 1024;

/// Default stale-entry age
pub const DEFAULT_MAX_ENTRY_AGE: Duration = Duration::from_secs(300);

/// Two tolerances closer than this are the same tolerance
pub const TOLERANCE_EPSILON: f64 = 1e-9;

/// Caller tolerances below this are replaced by an adaptive one
pub const NEGLIGIBLE_TOLERANCE: f64 = 1e-6;

/// Adaptive tolerance as a fraction of the bounding-box diagonal
pub const ADAPTIVE_TOLERANCE_FACTOR: f64 = 0.001;

/// Choose the tolerance to compute with: the caller's value, or 0.1% of
/// `diagonal` when the caller's value is negligible
pub fn effective_tolerance(requested: f64, diagonal: f64) -> f64 {
    if requested < NEGLIGIBLE_TOLERANCE {
        diagonal * ADAPTIVE_TOLERANCE_FACTOR
    } else {
        requested
    }
}
