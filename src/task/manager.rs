//! Async Intersection Manager
//!
//! Owns at most one running [`AsyncIntersectionTask`] and wires its
//! progress into the UI's [`ProgressDisplay`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AsyncIntersectionTask, TaskCallbacks, TaskOptions};
use crate::adapters::ChannelEventSink;
use crate::domain::events::IntersectionEvent;
use crate::domain::ports::{EdgeExtractor, EventSink, IntersectionStore, ProgressDisplay, Shape};
use crate::geometry::Point;

/// Single-slot task manager
pub struct AsyncIntersectionManager {
    extractor: Arc<dyn EdgeExtractor>,
    store: Arc<dyn IntersectionStore>,
    options: TaskOptions,
    display: Option<Arc<dyn ProgressDisplay>>,
    event_sink: Option<Arc<dyn EventSink>>,
    current: Mutex<Option<Arc<AsyncIntersectionTask>>>,
}

impl AsyncIntersectionManager {
    pub fn new(extractor: Arc<dyn EdgeExtractor>, store: Arc<dyn IntersectionStore>) -> Self {
        Self {
            extractor,
            store,
            options: TaskOptions::default(),
            display: None,
            event_sink: None,
            current: Mutex::new(None),
        }
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    /// Forward progress and status messages to `display`
    pub fn with_display(mut self, display: Arc<dyn ProgressDisplay>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_event_sender(self, tx: UnboundedSender<IntersectionEvent>) -> Self {
        self.with_event_sink(Arc::new(ChannelEventSink::new(tx)))
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Start computing intersections for `shape`.
    ///
    /// Returns false, leaving the running task untouched, when a
    /// computation is already in progress. A `batch_size` of zero keeps the
    /// configured size.
    pub fn start_intersection_computation<C, P>(
        &self,
        shape: Arc<dyn Shape>,
        tolerance: f64,
        on_complete: C,
        on_partial_results: Option<P>,
        batch_size: usize,
    ) -> bool
    where
        C: Fn(&[Point]) + Send + Sync + 'static,
        P: Fn(&[Point], usize) + Send + Sync + 'static,
    {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|task| task.is_running()) {
            warn!("Intersection computation already running; request ignored");
            return false;
        }

        let mut options = self.options.clone();
        if batch_size > 0 {
            options.batch_size = batch_size;
        }

        let task = AsyncIntersectionTask::new(
            shape,
            tolerance,
            Arc::clone(&self.extractor),
            Arc::clone(&self.store),
            options,
            self.callbacks(on_complete, on_partial_results),
        );
        let task = match &self.event_sink {
            Some(sink) => task.with_event_sink(Arc::clone(sink)),
            None => task,
        };
        let task = Arc::new(task);

        if let Some(display) = &self.display {
            display.set_progress(0, "Starting intersection computation");
        }

        if !task.start() {
            if let Some(display) = &self.display {
                display.finish();
            }
            return false;
        }
        if let Some(display) = &self.display {
            display.append_message("=== Intersection computation started ===");
        }
        info!(task_id = %task.id(), tolerance, "Intersection computation started");
        *current = Some(task);
        true
    }

    fn callbacks<C, P>(&self, on_complete: C, on_partial_results: Option<P>) -> TaskCallbacks
    where
        C: Fn(&[Point]) + Send + Sync + 'static,
        P: Fn(&[Point], usize) + Send + Sync + 'static,
    {
        let mut callbacks = TaskCallbacks::new();
        if let Some(partial) = on_partial_results {
            callbacks = callbacks.on_partial_results(partial);
        }

        let Some(display) = self.display.clone() else {
            return callbacks.on_complete(on_complete);
        };

        let progress_display = Arc::clone(&display);
        let complete_display = Arc::clone(&display);
        let error_display = display;

        callbacks
            .on_progress(move |progress, message, details| {
                progress_display.set_progress(progress, message);
                if !details.is_empty() {
                    progress_display.append_message(details);
                }
            })
            .on_complete(move |points| {
                complete_display.append_message(&format!(
                    "=== Intersection computation completed: {} points ===",
                    points.len()
                ));
                complete_display.finish();
                on_complete(points);
            })
            .on_error(move |message| {
                error_display.append_message(&format!(
                    "=== Intersection computation failed ===\n{}",
                    message
                ));
                error_display.finish();
            })
    }

    /// Cancel the running task and wait up to the configured grace period
    /// for it to stop. Safe to call with nothing running.
    ///
    /// The slot stays locked for the whole sequence, so nothing else can
    /// start meanwhile. A worker that outlives the grace period is detached
    /// and keeps the slot until it exits.
    pub fn cancel_current_computation(&self) {
        let mut current = self.current.lock();
        let Some(task) = current.take() else {
            return;
        };
        if !task.is_running() {
            return;
        }

        task.cancel();
        if !task.wait_for_completion(Some(self.options.cancel_wait)) {
            warn!(task_id = %task.id(), "Cancelled task still running after grace period; detaching");
            task.detach();
            *current = Some(Arc::clone(&task));
        }
        if let Some(display) = &self.display {
            display.append_message("=== Intersection computation cancelled ===");
            display.finish();
        }
        info!(task_id = %task.id(), "Intersection computation cancelled");
    }

    pub fn is_computation_running(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|task| task.is_running())
    }

    /// Progress of the current task, 0 when there is none
    pub fn current_progress(&self) -> u8 {
        self.current
            .lock()
            .as_ref()
            .map_or(0, |task| task.progress())
    }

    pub fn current_task_id(&self) -> Option<Uuid> {
        self.current.lock().as_ref().map(|task| task.id())
    }

    /// Block until the current task has finished, at most `timeout`.
    /// Returns true when nothing is left running.
    pub fn wait_for_current(&self, timeout: Option<Duration>) -> bool {
        let task = self.current.lock().clone();
        match task {
            Some(task) => task.wait_for_completion(timeout),
            None => true,
        }
    }
}

impl Drop for AsyncIntersectionManager {
    fn drop(&mut self) {
        self.cancel_current_computation();
    }
}

impl std::fmt::Debug for AsyncIntersectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncIntersectionManager")
            .field("options", &self.options)
            .field("current", &*self.current.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{EdgeSet, InMemoryEventCollector, MessageLog, SampledEdgeExtractor};
    use crate::cache::EdgeGeometryCache;
    use crate::error::Result;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    type NoPartial = fn(&[Point], usize);

    /// Blocks intersection until released
    struct GatedExtractor {
        release: Arc<AtomicBool>,
    }

    impl EdgeExtractor for GatedExtractor {
        fn extract_edges(
            &self,
            _shape: &dyn Shape,
            _progress: &mut dyn FnMut(u8, &str),
        ) -> Result<Vec<Point>> {
            Ok(Vec::new())
        }

        fn find_intersections(&self, _shape: &dyn Shape, _tolerance: f64) -> Result<Vec<Point>> {
            while !self.release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok(vec![Point::default(); 3])
        }
    }

    fn lattice() -> Arc<dyn Shape> {
        Arc::new(EdgeSet::lattice(3, 1.0))
    }

    #[test]
    fn test_manager_runs_and_forwards_to_display() {
        let display = Arc::new(MessageLog::new());
        let manager = AsyncIntersectionManager::new(
            Arc::new(SampledEdgeExtractor::default()),
            Arc::new(EdgeGeometryCache::new()),
        )
        .with_options(TaskOptions::immediate())
        .with_display(display.clone());

        let delivered = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&delivered);
        assert!(manager.start_intersection_computation(
            lattice(),
            1e-3,
            move |points| count.store(points.len(), Ordering::SeqCst),
            None::<NoPartial>,
            0,
        ));
        assert!(manager.wait_for_current(Some(Duration::from_secs(10))));

        assert_eq!(delivered.load(Ordering::SeqCst), 9);
        assert!(!manager.is_computation_running());
        assert_eq!(manager.current_progress(), 100);
        assert_eq!(display.progress(), 100);
        let started = display.lines().iter().filter(|l| l.contains("started")).count();
        assert_eq!(started, 1);
        assert!(display.contains("completed: 9 points"));
        assert!(!display.gauge_visible());
    }

    #[test]
    fn test_second_start_rejected_while_running() {
        let release = Arc::new(AtomicBool::new(false));
        let collector = Arc::new(InMemoryEventCollector::new());
        let manager = AsyncIntersectionManager::new(
            Arc::new(GatedExtractor {
                release: Arc::clone(&release),
            }),
            Arc::new(EdgeGeometryCache::new()),
        )
        .with_options(TaskOptions::immediate())
        .with_event_sink(collector.clone());

        assert!(manager.start_intersection_computation(lattice(), 0.01, |_| {}, None::<NoPartial>, 0));
        let first = manager.current_task_id();
        assert!(manager.is_computation_running());

        assert!(!manager.start_intersection_computation(lattice(), 0.01, |_| {}, None::<NoPartial>, 0));
        assert_eq!(manager.current_task_id(), first);

        release.store(true, Ordering::SeqCst);
        assert!(manager.wait_for_current(Some(Duration::from_secs(10))));
        assert_eq!(collector.events_of_type("Completed").len(), 1);

        // Finished tasks free the slot
        assert!(manager.start_intersection_computation(lattice(), 0.01, |_| {}, None::<NoPartial>, 0));
        assert_ne!(manager.current_task_id(), first);
        assert!(manager.wait_for_current(Some(Duration::from_secs(10))));
    }

    #[test]
    fn test_cancel_current_computation() {
        let release = Arc::new(AtomicBool::new(false));
        let collector = Arc::new(InMemoryEventCollector::new());
        let manager = AsyncIntersectionManager::new(
            Arc::new(GatedExtractor {
                release: Arc::clone(&release),
            }),
            Arc::new(EdgeGeometryCache::new()),
        )
        .with_options(TaskOptions::immediate())
        .with_event_sink(collector.clone());

        // Nothing running is fine
        manager.cancel_current_computation();

        assert!(manager.start_intersection_computation(lattice(), 0.01, |_| {}, None::<NoPartial>, 0));
        release.store(true, Ordering::SeqCst);
        manager.cancel_current_computation();

        assert!(!manager.is_computation_running());
        assert_eq!(manager.current_task_id(), None);
        assert_eq!(manager.current_progress(), 0);
        assert!(collector.events_of_type("Completed").len() <= 1);
        assert!(collector.events_of_type("Error").is_empty());
    }

    #[test]
    fn test_partial_results_callback_and_batch_override() {
        let totals = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&totals);
        let manager = AsyncIntersectionManager::new(
            Arc::new(SampledEdgeExtractor::default()),
            Arc::new(EdgeGeometryCache::new()),
        )
        .with_options(TaskOptions::immediate());

        assert!(manager.start_intersection_computation(
            lattice(),
            1e-3,
            |_| {},
            Some(move |_: &[Point], so_far: usize| sink.lock().push(so_far)),
            4,
        ));
        assert!(manager.wait_for_current(None));
        assert_eq!(*totals.lock(), vec![4, 8, 9]);
    }

    fn gated_manager(release: &Arc<AtomicBool>, cancel_wait: Duration) -> AsyncIntersectionManager {
        AsyncIntersectionManager::new(
            Arc::new(GatedExtractor {
                release: Arc::clone(release),
            }),
            Arc::new(EdgeGeometryCache::new()),
        )
        .with_options(TaskOptions::immediate().with_cancel_wait(cancel_wait))
    }

    /// Wait until the worker is blocked inside the gated intersection call
    fn wait_until_computing(manager: &AsyncIntersectionManager) {
        while manager.current_progress() < crate::task::DELIVERY_START {
            std::thread::sleep(Duration::from_millis(2));
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    #[test]
    fn test_no_start_while_cancel_is_pending() {
        let release = Arc::new(AtomicBool::new(false));
        let manager = gated_manager(&release, Duration::from_millis(300));

        assert!(manager.start_intersection_computation(lattice(), 0.01, |_| {}, None::<NoPartial>, 0));
        let first = manager.current_task_id();
        wait_until_computing(&manager);

        let started_again = std::thread::scope(|scope| {
            scope.spawn(|| manager.cancel_current_computation());
            std::thread::sleep(Duration::from_millis(100));
            manager.start_intersection_computation(lattice(), 0.01, |_| {}, None::<NoPartial>, 0)
        });

        // The worker outlived the grace period and still owns the slot
        assert!(!started_again);
        assert_eq!(manager.current_task_id(), first);
        assert!(manager.is_computation_running());

        release.store(true, Ordering::SeqCst);
        assert!(manager.wait_for_current(Some(Duration::from_secs(10))));
        assert!(!manager.is_computation_running());
    }

    #[test]
    fn test_timed_out_cancel_waits_once() {
        let release = Arc::new(AtomicBool::new(false));
        let cancel_wait = Duration::from_millis(200);
        let manager = gated_manager(&release, cancel_wait);

        assert!(manager.start_intersection_computation(lattice(), 0.01, |_| {}, None::<NoPartial>, 0));
        wait_until_computing(&manager);
        let started = std::time::Instant::now();
        manager.cancel_current_computation();
        let elapsed = started.elapsed();

        assert!(elapsed >= cancel_wait);
        assert!(elapsed < cancel_wait * 2, "cancel blocked for {:?}", elapsed);

        release.store(true, Ordering::SeqCst);
        assert!(manager.wait_for_current(Some(Duration::from_secs(10))));
    }

    #[test]
    fn test_cancel_after_completion_is_silent() {
        let display = Arc::new(MessageLog::new());
        let manager = AsyncIntersectionManager::new(
            Arc::new(SampledEdgeExtractor::default()),
            Arc::new(EdgeGeometryCache::new()),
        )
        .with_options(TaskOptions::immediate())
        .with_display(display.clone());

        assert!(manager.start_intersection_computation(lattice(), 1e-3, |_| {}, None::<NoPartial>, 0));
        assert!(manager.wait_for_current(Some(Duration::from_secs(10))));

        manager.cancel_current_computation();
        assert!(!display.contains("cancelled"));
        assert_eq!(manager.current_task_id(), None);
    }
}
