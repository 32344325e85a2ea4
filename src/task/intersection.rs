//! Async Intersection Task
//!
//! A single-use background computation: one call to
//! [`start`](AsyncIntersectionTask::start) spawns one worker thread that
//! runs the pipeline once and ends in a terminal state.
//!
//! # Event Contract
//!
//! - Progress values never decrease over the task's lifetime.
//! - `total_so_far` of consecutive partial-results events strictly
//!   increases and ends at the full point count.
//! - A completed run emits exactly one completion event.
//! - A failed run emits exactly one error event.
//! - A cancelled run emits neither, only a "Cancelled" progress message.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{
    batch_progress, extraction_progress, TaskCallbacks, TaskOptions, TaskState, DELIVERY_DONE,
    DELIVERY_START, EXTRACTION_DONE, TOLERANCE_DONE,
};
use crate::adapters::ChannelEventSink;
use crate::cache::{effective_tolerance, intersection_key, NEGLIGIBLE_TOLERANCE};
use crate::domain::events::IntersectionEvent;
use crate::domain::ports::{EdgeExtractor, EventSink, IntersectionStore, Shape};
use crate::error::{Error, Result};
use crate::geometry::Point;

/// Everything the worker needs, moved onto its thread at start
struct Job {
    shape: Arc<dyn Shape>,
    tolerance: f64,
    extractor: Arc<dyn EdgeExtractor>,
    store: Arc<dyn IntersectionStore>,
    options: TaskOptions,
    callbacks: TaskCallbacks,
    sink: Option<Arc<dyn EventSink>>,
}

/// State shared between the task handle and its worker
struct Shared {
    id: Uuid,
    state: Mutex<TaskState>,
    progress: AtomicU8,
    message: Mutex<String>,
    cancel: CancellationToken,
    finished: Mutex<bool>,
    done: Condvar,
    worker: Mutex<Option<ThreadId>>,
}

impl Shared {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Enter a terminal state and wake waiters
    fn finish(&self, state: TaskState) {
        *self.state.lock() = state;
        let mut finished = self.finished.lock();
        *finished = true;
        self.done.notify_all();
    }

    fn on_worker_thread(&self) -> bool {
        *self.worker.lock() == Some(thread::current().id())
    }
}

/// How a run ended, short of an error
enum Outcome {
    Completed(Vec<Point>),
    Cancelled,
}

/// Background intersection computation for one shape
pub struct AsyncIntersectionTask {
    shared: Arc<Shared>,
    job: Mutex<Option<Job>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    cancel_wait: Duration,
    detached: AtomicBool,
}

impl AsyncIntersectionTask {
    pub fn new(
        shape: Arc<dyn Shape>,
        tolerance: f64,
        extractor: Arc<dyn EdgeExtractor>,
        store: Arc<dyn IntersectionStore>,
        options: TaskOptions,
        callbacks: TaskCallbacks,
    ) -> Self {
        let cancel_wait = options.cancel_wait;
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                state: Mutex::new(TaskState::Idle),
                progress: AtomicU8::new(0),
                message: Mutex::new(String::new()),
                cancel: CancellationToken::new(),
                finished: Mutex::new(false),
                done: Condvar::new(),
                worker: Mutex::new(None),
            }),
            job: Mutex::new(Some(Job {
                shape,
                tolerance,
                extractor,
                store,
                options,
                callbacks,
                sink: None,
            })),
            handle: Mutex::new(None),
            cancel_wait,
            detached: AtomicBool::new(false),
        }
    }

    /// Marshal events to the UI thread over `tx`
    pub fn with_event_sender(self, tx: UnboundedSender<IntersectionEvent>) -> Self {
        self.with_event_sink(Arc::new(ChannelEventSink::new(tx)))
    }

    /// Publish events to `sink`
    pub fn with_event_sink(self, sink: Arc<dyn EventSink>) -> Self {
        if let Some(job) = self.job.lock().as_mut() {
            job.sink = Some(sink);
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Spawn the worker. Returns false, without side effects, unless the
    /// task is still idle.
    #[instrument(skip(self), fields(task_id = %self.shared.id))]
    pub fn start(&self) -> bool {
        let mut state = self.shared.state.lock();
        if *state != TaskState::Idle {
            warn!(state = %*state, "Task already started");
            return false;
        }
        let Some(job) = self.job.lock().take() else {
            return false;
        };
        *state = TaskState::Running;
        drop(state);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("intersect-{}", &self.shared.id.simple().to_string()[..8]))
            .spawn(move || Worker { shared, job }.run());

        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                info!("Intersection task started");
                true
            }
            Err(err) => {
                error!(error = %err, "Failed to spawn intersection worker");
                self.shared.finish(TaskState::Failed);
                false
            }
        }
    }

    /// Request cooperative cancellation. Takes effect at the next phase or
    /// batch boundary, including before the worker starts.
    pub fn cancel(&self) {
        if !self.shared.cancel.is_cancelled() {
            debug!(task_id = %self.shared.id, "Cancellation requested");
        }
        self.shared.cancel.cancel();
    }

    /// Block until the worker has exited, at most `timeout` when given.
    ///
    /// Returns whether the worker exited in time. A task that was never
    /// started counts as exited. Waiting from the worker's own thread
    /// returns false immediately.
    pub fn wait_for_completion(&self, timeout: Option<Duration>) -> bool {
        if *self.shared.state.lock() == TaskState::Idle {
            return true;
        }
        if self.shared.on_worker_thread() {
            return false;
        }

        {
            let mut finished = self.shared.finished.lock();
            match timeout {
                None => {
                    while !*finished {
                        self.shared.done.wait(&mut finished);
                    }
                }
                Some(timeout) => {
                    let deadline = Instant::now() + timeout;
                    while !*finished {
                        if self.shared.done.wait_until(&mut finished, deadline).timed_out() {
                            break;
                        }
                    }
                    if !*finished {
                        return false;
                    }
                }
            }
        }

        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!(task_id = %self.shared.id, "Worker thread panicked after finishing");
            }
        }
        true
    }

    /// Stop tracking the worker. Dropping a detached task neither waits
    /// nor joins; the worker runs to its next cancellation point on its own.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::Release);
        drop(self.handle.lock().take());
    }

    /// Progress snapshot (0-100)
    pub fn progress(&self) -> u8 {
        self.shared.progress.load(Ordering::Acquire)
    }

    /// Latest status message
    pub fn current_message(&self) -> String {
        self.shared.message.lock().clone()
    }

    pub fn state(&self) -> TaskState {
        *self.shared.state.lock()
    }

    /// True from a successful start until the worker has emitted its
    /// final event
    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }
}

impl std::fmt::Debug for AsyncIntersectionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncIntersectionTask")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}

impl Drop for AsyncIntersectionTask {
    fn drop(&mut self) {
        self.cancel();
        if self.shared.on_worker_thread() || self.detached.load(Ordering::Acquire) {
            // The worker finishes on its own
            return;
        }
        if !self.wait_for_completion(Some(self.cancel_wait)) {
            warn!(task_id = %self.shared.id, "Worker did not stop in time; detaching");
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

struct Worker {
    shared: Arc<Shared>,
    job: Job,
}

impl Worker {
    fn run(self) {
        *self.shared.worker.lock() = Some(thread::current().id());
        let started = Instant::now();

        let outcome = catch_unwind(AssertUnwindSafe(|| self.execute()));
        let state = match outcome {
            Ok(Ok(Outcome::Completed(points))) => {
                self.complete(points, started.elapsed());
                TaskState::Completed
            }
            Ok(Ok(Outcome::Cancelled)) => {
                let current = self.shared.progress.load(Ordering::Acquire);
                self.report(current, "Cancelled", "");
                info!(task_id = %self.shared.id, "Intersection task cancelled");
                TaskState::Cancelled
            }
            Ok(Err(err)) => {
                self.fail(&err.to_string());
                TaskState::Failed
            }
            Err(panic) => {
                self.fail(&Error::TaskPanicked(panic_message(panic.as_ref())).to_string());
                TaskState::Failed
            }
        };

        self.shared.finish(state);
    }

    fn execute(&self) -> Result<Outcome> {
        let job = &self.job;
        let shape = job.shape.as_ref();

        // Phase 1: edge extraction
        self.report(0, "Extracting edges", "");
        if self.shared.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        let geometry = job.extractor.extract_edges(shape, &mut |sub: u8, message: &str| {
            self.report(extraction_progress(sub), message, "")
        })?;
        self.report(
            EXTRACTION_DONE,
            "Edges extracted",
            &format!("{} geometry points", geometry.len()),
        );
        if self.shared.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        // Phase 2: tolerance
        let tolerance = if job.tolerance < NEGLIGIBLE_TOLERANCE {
            let bbox = shape.bounding_box().ok_or(Error::EmptyShape)?;
            effective_tolerance(job.tolerance, bbox.diagonal())
        } else {
            job.tolerance
        };
        self.report(
            TOLERANCE_DONE,
            "Tolerance selected",
            &format!("Tolerance: {:.6}", tolerance),
        );
        if self.shared.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        // Phase 3: cache lookup, compute, deliver
        let key = intersection_key(shape.shape_id(), tolerance);
        let points = if let Some(cached) = job.store.try_get_cached(&key) {
            debug!(key = %key, points = cached.len(), "Replaying cached intersections");
            self.report(
                DELIVERY_START,
                "Loading cached intersections",
                &format!("{} cached points", cached.len()),
            );
            if !self.deliver(&cached, job.options.cached_batch_delay) {
                return Ok(Outcome::Cancelled);
            }
            cached
        } else {
            self.report(DELIVERY_START, "Computing intersections", "");
            let computed = job.extractor.find_intersections(shape, tolerance)?;
            if !self.deliver(&computed, job.options.computed_batch_delay) {
                return Ok(Outcome::Cancelled);
            }
            job.store
                .store_cached(&key, computed.clone(), shape.shape_id(), tolerance);
            computed
        };

        // Phase 4: finalize
        self.report(DELIVERY_DONE, "Finalizing", "");
        Ok(Outcome::Completed(points))
    }

    /// Stream `points` in batches. Returns false when cancelled at a batch
    /// boundary.
    fn deliver(&self, points: &[Point], delay: Duration) -> bool {
        let total = points.len();
        let batch_size = self.job.options.batch_size.max(1);
        let mut so_far = 0;

        for batch in points.chunks(batch_size) {
            if self.shared.is_cancelled() {
                return false;
            }
            so_far += batch.len();
            self.publish(IntersectionEvent::PartialResults {
                task_id: self.shared.id,
                batch: batch.to_vec(),
                total_so_far: so_far,
            });
            if let Some(cb) = &self.job.callbacks.on_partial_results {
                guarded("on_partial_results", || cb(batch, so_far));
            }
            self.report(
                batch_progress(so_far, total),
                &format!("Processing intersections ({}/{})", so_far, total),
                "",
            );
            if so_far < total && !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        !self.shared.is_cancelled()
    }

    /// Record and publish progress; the stored value never decreases
    fn report(&self, progress: u8, message: &str, details: &str) {
        let requested = progress.min(100);
        let previous = self.shared.progress.fetch_max(requested, Ordering::AcqRel);
        let progress = previous.max(requested);
        *self.shared.message.lock() = message.to_string();

        self.publish(IntersectionEvent::Progress {
            task_id: self.shared.id,
            progress,
            message: message.to_string(),
            details: details.to_string(),
            timestamp: Utc::now(),
        });
        if let Some(cb) = &self.job.callbacks.on_progress {
            guarded("on_progress", || cb(progress, message, details));
        }
    }

    fn complete(&self, points: Vec<Point>, elapsed: Duration) {
        self.report(100, "Completed", &format!("Found {} intersections", points.len()));
        info!(
            task_id = %self.shared.id,
            points = points.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Intersection task completed"
        );
        if let Some(cb) = &self.job.callbacks.on_complete {
            guarded("on_complete", || cb(&points));
        }
        self.publish(IntersectionEvent::Completed {
            task_id: self.shared.id,
            points,
            duration_ms: elapsed.as_millis() as u64,
        });
    }

    fn fail(&self, reason: &str) {
        let message = format!("Intersection computation failed: {}", reason);
        error!(task_id = %self.shared.id, error = %reason, "Intersection task failed");
        *self.shared.message.lock() = message.clone();
        if let Some(cb) = &self.job.callbacks.on_error {
            guarded("on_error", || cb(&message));
        }
        self.publish(IntersectionEvent::Error {
            task_id: self.shared.id,
            message,
        });
    }

    fn publish(&self, event: IntersectionEvent) {
        if let Some(sink) = &self.job.sink {
            sink.publish(event);
        }
    }
}

/// Run a user callback, logging instead of propagating a panic
fn guarded(name: &str, f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        error!(
            callback = name,
            panic = %panic_message(panic.as_ref()),
            "Callback panicked"
        );
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
