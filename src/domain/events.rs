//! Intersection Events
//!
//! Events emitted by an [`AsyncIntersectionTask`](crate::task::AsyncIntersectionTask)
//! and marshaled to the UI thread over a channel. Each event is an immutable
//! record of something the worker has done.
//!
//! # Example
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let task = AsyncIntersectionTask::new(/* ... */).with_event_sender(tx);
//! task.start();
//!
//! while let Some(event) = rx.recv().await {
//!     if let IntersectionEvent::PartialResults { batch, total_so_far, .. } = event {
//!         render(&batch);
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::geometry::Point;

/// Event emitted by an intersection task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum IntersectionEvent {
    /// Progress update (0-100) with a status line and multi-line details
    Progress {
        task_id: Uuid,
        progress: u8,
        message: String,
        details: String,
        timestamp: DateTime<Utc>,
    },

    /// A batch of intersection points ready for progressive display
    PartialResults {
        task_id: Uuid,
        batch: Vec<Point>,
        total_so_far: usize,
    },

    /// The computation finished; carries the full point list
    Completed {
        task_id: Uuid,
        points: Vec<Point>,
        duration_ms: u64,
    },

    /// The computation failed
    Error { task_id: Uuid, message: String },
}

impl IntersectionEvent {
    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            IntersectionEvent::Progress { .. } => "Progress",
            IntersectionEvent::PartialResults { .. } => "PartialResults",
            IntersectionEvent::Completed { .. } => "Completed",
            IntersectionEvent::Error { .. } => "Error",
        }
    }

    /// Id of the task that emitted the event.
    pub fn task_id(&self) -> Uuid {
        match self {
            IntersectionEvent::Progress { task_id, .. }
            | IntersectionEvent::PartialResults { task_id, .. }
            | IntersectionEvent::Completed { task_id, .. }
            | IntersectionEvent::Error { task_id, .. } => *task_id,
        }
    }

    /// True for completion and error events.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntersectionEvent::Completed { .. } | IntersectionEvent::Error { .. }
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let id = Uuid::new_v4();
        let event = IntersectionEvent::PartialResults {
            task_id: id,
            batch: vec![Point::new(1.0, 2.0, 3.0)],
            total_so_far: 1,
        };

        assert_eq!(event.event_type(), "PartialResults");
        assert_eq!(event.task_id(), id);
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_events() {
        let id = Uuid::new_v4();
        assert!(IntersectionEvent::Error {
            task_id: id,
            message: "boom".into(),
        }
        .is_terminal());
        assert!(IntersectionEvent::Completed {
            task_id: id,
            points: vec![],
            duration_ms: 0,
        }
        .is_terminal());
    }

    #[test]
    fn test_event_serialization() {
        let event = IntersectionEvent::Error {
            task_id: Uuid::nil(),
            message: "kernel failure".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Error\""));
        assert!(json.contains("kernel failure"));
    }
}
