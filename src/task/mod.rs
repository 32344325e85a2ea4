//! Background Intersection Tasks
//!
//! Runs intersection computation off the caller's thread and streams
//! results back in batches.
//!
//! # Pipeline
//!
//! ```text
//!   0% ──► 20%  extract edge geometry (extractor sub-progress scaled)
//!  20% ──► 30%  choose tolerance (adaptive when negligible)
//!  30% ──► 95%  cache lookup → hit: replay cached points in batches
//!                            → miss: compute, replay in batches, store
//!  95% ──► 100% finalize, emit completion
//! ```
//!
//! Cancellation is cooperative: the token is checked between phases and at
//! every batch boundary.

mod intersection;
mod manager;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::policy::duration_millis;
use crate::geometry::Point;

pub use intersection::AsyncIntersectionTask;
pub use manager::AsyncIntersectionManager;

/// Default points per partial-results batch
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Progress reached when edge extraction ends
pub const EXTRACTION_DONE: u8 = 20;

/// Progress reached when the tolerance is chosen
pub const TOLERANCE_DONE: u8 = 30;

/// Progress at the start of batch delivery
pub const DELIVERY_START: u8 = 35;

/// Progress reached when the last batch is delivered
pub const DELIVERY_DONE: u8 = 95;

// =============================================================================
// Task State Machine
// =============================================================================

/// Lifecycle of a single-use task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Created, not started
    Idle,
    /// Worker thread active
    Running,
    /// Finished and delivered all results
    Completed,
    /// Stopped at a cancellation check
    Cancelled,
    /// Extraction or computation failed
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Failed
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Idle => write!(f, "Idle"),
            TaskState::Running => write!(f, "Running"),
            TaskState::Completed => write!(f, "Completed"),
            TaskState::Cancelled => write!(f, "Cancelled"),
            TaskState::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress during batch delivery after `so_far` of `total` points
pub fn batch_progress(so_far: usize, total: usize) -> u8 {
    if total == 0 {
        return DELIVERY_DONE;
    }
    let span = (DELIVERY_DONE - DELIVERY_START) as usize;
    DELIVERY_START + (span * so_far.min(total) / total) as u8
}

/// Map extractor sub-progress (0-100) into the extraction phase
pub fn extraction_progress(sub: u8) -> u8 {
    (sub.min(100) as u16 * EXTRACTION_DONE as u16 / 100) as u8
}

// =============================================================================
// Configuration
// =============================================================================

/// Task pacing and batching knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    /// Points per partial-results batch
    pub batch_size: usize,
    /// Pause between batches replayed from the cache
    #[serde(with = "duration_millis")]
    pub cached_batch_delay: Duration,
    /// Pause between batches of freshly computed points
    #[serde(with = "duration_millis")]
    pub computed_batch_delay: Duration,
    /// How long the manager waits for a cancelled task
    #[serde(with = "duration_millis")]
    pub cancel_wait: Duration,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cached_batch_delay: Duration::from_millis(50),
            computed_batch_delay: Duration::from_millis(10),
            cancel_wait: Duration::from_millis(5000),
        }
    }
}

impl TaskOptions {
    /// Options without pacing delays
    pub fn immediate() -> Self {
        Self {
            cached_batch_delay: Duration::ZERO,
            computed_batch_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_cancel_wait(mut self, cancel_wait: Duration) -> Self {
        self.cancel_wait = cancel_wait;
        self
    }
}

// =============================================================================
// Callbacks
// =============================================================================

/// `(progress, message, details)`
pub type ProgressCallback = Box<dyn Fn(u8, &str, &str) + Send + Sync>;

/// `(batch, total_so_far)`
pub type PartialResultsCallback = Box<dyn Fn(&[Point], usize) + Send + Sync>;

/// Full point list
pub type CompletionCallback = Box<dyn Fn(&[Point]) + Send + Sync>;

/// Error message
pub type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Direct callbacks, invoked on the worker thread.
///
/// A panicking callback is caught and logged; it never takes the worker
/// down with it.
#[derive(Default)]
pub struct TaskCallbacks {
    pub(crate) on_progress: Option<ProgressCallback>,
    pub(crate) on_partial_results: Option<PartialResultsCallback>,
    pub(crate) on_complete: Option<CompletionCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl TaskCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl Fn(u8, &str, &str) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_partial_results(mut self, f: impl Fn(&[Point], usize) + Send + Sync + 'static) -> Self {
        self.on_partial_results = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&[Point]) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for TaskCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_partial_results", &self.on_partial_results.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_progress_range() {
        assert_eq!(batch_progress(0, 137), DELIVERY_START);
        // 35 + 60 * 50 / 137
        assert_eq!(batch_progress(50, 137), 56);
        assert_eq!(batch_progress(137, 137), DELIVERY_DONE);
        assert_eq!(batch_progress(0, 0), DELIVERY_DONE);
    }

    #[test]
    fn test_extraction_progress_scaling() {
        assert_eq!(extraction_progress(0), 0);
        assert_eq!(extraction_progress(50), 10);
        assert_eq!(extraction_progress(100), EXTRACTION_DONE);
        assert_eq!(extraction_progress(255), EXTRACTION_DONE);
    }

    #[test]
    fn test_state_display_and_terminal() {
        assert_eq!(TaskState::Cancelled.to_string(), "Cancelled");
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn test_options_yaml() {
        let options: TaskOptions =
            serde_yaml::from_str("batch_size: 10\ncached_batch_delay: 0\n").unwrap();
        assert_eq!(options.batch_size, 10);
        assert_eq!(options.cached_batch_delay, Duration::ZERO);
        assert_eq!(options.cancel_wait, Duration::from_millis(5000));
    }
}
