//! Single-consumer processing loop
//!
//! One worker drains the queue: dequeue, open a tab, run the capture
//! pipeline. A `SessionDead` outcome triggers a full browser relaunch and the
//! same task is retried without loss, indefinitely, because dropping a capture
//! silently is worse than retrying. Any other failure is logged and the task
//! is dropped. No error terminates the loop; only the queue's shutdown signal
//! does.

use crate::{BrowserSession, CaptureExecutor, CaptureOutcome, CaptureTask, TaskQueue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Pause between attempts to relaunch a dead browser.
const RELAUNCH_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Dequeuing,
    Processing,
    Retrying,
    ShuttingDown,
}

pub struct QueueWorker {
    queue: Arc<TaskQueue>,
    session: Arc<BrowserSession>,
    executor: CaptureExecutor,
    pacing: Duration,
    state: StdMutex<WorkerState>,
    processed: AtomicUsize,
    skipped: AtomicUsize,
    dropped: AtomicUsize,
    relaunches: AtomicUsize,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<TaskQueue>,
        session: Arc<BrowserSession>,
        executor: CaptureExecutor,
        pacing: Duration,
    ) -> Self {
        Self {
            queue,
            session,
            executor,
            pacing,
            state: StdMutex::new(WorkerState::Idle),
            processed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            relaunches: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().expect("worker state lock poisoned")
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().expect("worker state lock poisoned") = state;
    }

    /// Loop until the queue signals shutdown. The in-flight task is always
    /// finished (or re-enqueued) before the loop exits.
    pub async fn run(&self) {
        info!("Queue worker started");
        loop {
            self.set_state(WorkerState::Dequeuing);
            let Some(task) = self.queue.dequeue().await else {
                break;
            };

            self.process(task).await;

            if self.queue.is_closed() {
                break;
            }
            self.set_state(WorkerState::Idle);
            // Fixed pacing between tasks bounds load on the browser engine.
            sleep(self.pacing).await;
        }
        self.set_state(WorkerState::ShuttingDown);
        info!(
            "Queue worker stopped: {} processed, {} skipped, {} dropped, {} relaunches",
            self.processed.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
            self.relaunches.load(Ordering::Relaxed),
        );
    }

    async fn process(&self, task: CaptureTask) {
        loop {
            self.set_state(WorkerState::Processing);
            let outcome = match self.session.new_tab().await {
                Ok(page) => self.executor.run(page, &task).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(CaptureOutcome::Completed) => {
                    self.processed.fetch_add(1, Ordering::Relaxed);
                    info!("Task completed: {}", task.url);
                    return;
                }
                Ok(CaptureOutcome::Skipped) => {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(e) if e.requires_relaunch() => {
                    warn!("Browser session lost while processing {}: {}", task.url, e);
                    if !self.relaunch_session(&task).await {
                        return;
                    }
                    // Loop back for a fresh tab with the same task.
                }
                Err(e) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    error!("Dropping task for {}: {}", task.url, e);
                    return;
                }
            }
        }
    }

    /// Relaunch until the session comes back or shutdown is signaled. On
    /// shutdown the task goes back on the queue so the drain snapshots it.
    async fn relaunch_session(&self, task: &CaptureTask) -> bool {
        self.set_state(WorkerState::Retrying);
        self.relaunches.fetch_add(1, Ordering::Relaxed);
        loop {
            if self.queue.is_closed() {
                info!("Shutdown during relaunch, re-enqueuing {}", task.url);
                self.queue.enqueue(task.clone()).await;
                return false;
            }
            match self.session.launch().await {
                Ok(()) => return true,
                Err(e) => {
                    warn!("Browser relaunch failed, retrying: {}", e);
                    sleep(RELAUNCH_RETRY_DELAY).await;
                }
            }
        }
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            state: self.state(),
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            relaunches: self.relaunches.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub state: WorkerState,
    pub processed: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub relaunches: usize,
}
