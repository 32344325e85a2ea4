//! Event Sink Adapters
//!
//! Implements the `EventSink` port with various backends.

use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::domain::events::IntersectionEvent;
use crate::domain::ports::EventSink;

/// Forwards events over a tokio channel to the UI side.
///
/// Sending never blocks, so the worker thread needs no runtime. Events sent
/// after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: UnboundedSender<IntersectionEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: UnboundedSender<IntersectionEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: IntersectionEvent) {
        if let Err(err) = self.tx.send(event) {
            trace!(event_type = err.0.event_type(), "UI receiver closed; event dropped");
        }
    }
}

/// In-memory event collector for testing.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: parking_lot::RwLock<Vec<IntersectionEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events.
    pub fn events(&self) -> Vec<IntersectionEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<IntersectionEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Running totals of every partial-results event, in arrival order
    pub fn partial_totals(&self) -> Vec<usize> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                IntersectionEvent::PartialResults { total_so_far, .. } => Some(*total_so_far),
                _ => None,
            })
            .collect()
    }

    /// Number of completion and error events
    pub fn terminal_count(&self) -> usize {
        self.events.read().iter().filter(|e| e.is_terminal()).count()
    }
}

impl EventSink for InMemoryEventCollector {
    fn publish(&self, event: IntersectionEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use uuid::Uuid;

    fn partial(id: Uuid, total: usize) -> IntersectionEvent {
        IntersectionEvent::PartialResults {
            task_id: id,
            batch: vec![Point::default()],
            total_so_far: total,
        }
    }

    #[test]
    fn test_in_memory_collector() {
        let collector = InMemoryEventCollector::new();
        assert!(collector.is_empty());

        let id = Uuid::new_v4();
        collector.publish(partial(id, 1));
        collector.publish(partial(id, 2));
        collector.publish(IntersectionEvent::Error {
            task_id: id,
            message: "boom".into(),
        });

        assert_eq!(collector.len(), 3);
        assert_eq!(collector.events_of_type("PartialResults").len(), 2);
        assert_eq!(collector.partial_totals(), vec![1, 2]);
        assert_eq!(collector.terminal_count(), 1);

        collector.clear();
        assert!(collector.is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelEventSink::new(tx);
        let id = Uuid::new_v4();

        std::thread::spawn(move || {
            for total in 1..=3 {
                sink.publish(partial(id, total));
            }
        })
        .join()
        .unwrap();

        let mut totals = Vec::new();
        while let Some(IntersectionEvent::PartialResults { total_so_far, .. }) = rx.recv().await {
            totals.push(total_so_far);
        }
        assert_eq!(totals, vec![1, 2, 3]);
    }

    #[test]
    fn test_channel_sink_tolerates_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        ChannelEventSink::new(tx).publish(partial(Uuid::new_v4(), 1));
    }
}
