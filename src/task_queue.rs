//! Durable-on-shutdown FIFO of pending capture tasks
//!
//! In-memory queue with a single suspending consumer. At shutdown the
//! remaining tasks are serialized to a JSON file; the next startup re-enqueues
//! them in original order and deletes the file. A task dequeued but not yet
//! snapshotted when the process dies is lost from the file but may already
//! have been processed, so delivery is at-least-once, never silently dropped.

use crate::{ArchiveError, CaptureTask};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

pub struct TaskQueue {
    items: Mutex<VecDeque<CaptureTask>>,
    notify: Notify,
    closed: AtomicBool,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Never blocks; capacity is unbounded by design.
    pub async fn enqueue(&self, task: CaptureTask) {
        self.items.lock().await.push_back(task);
        self.notify.notify_one();
    }

    /// Suspend until a task is available or the queue is closed. Returns
    /// `None` once the shutdown signal is observed.
    pub async fn dequeue(&self) -> Option<CaptureTask> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            let notified = self.notify.notified();
            if let Some(task) = self.items.lock().await.pop_front() {
                return Some(task);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Signal shutdown: pending `dequeue` calls wake and return `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Remove and return every queued task, preserving order. Used only at
    /// shutdown, after the worker has stopped pulling.
    pub async fn drain_all(&self) -> Vec<CaptureTask> {
        self.items.lock().await.drain(..).collect()
    }

    /// Serialize tasks to the snapshot file. Callers skip this when the list
    /// is empty so a clean shutdown leaves no file behind.
    pub async fn snapshot(tasks: &[CaptureTask], path: &Path) -> Result<(), ArchiveError> {
        let json = serde_json::to_vec_pretty(tasks)?;
        tokio::fs::write(path, json).await?;
        info!("Snapshotted {} pending task(s) to {}", tasks.len(), path.display());
        Ok(())
    }

    /// Re-enqueue tasks from a previous run's snapshot, then delete the file.
    /// Best-effort: a missing, unreadable, or corrupt file means no tasks to
    /// restore, never a startup failure.
    pub async fn restore(&self, path: &Path) -> usize {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Failed to read queue snapshot {}: {}", path.display(), e);
                return 0;
            }
        };
        let tasks: Vec<CaptureTask> = match serde_json::from_slice(&bytes) {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("Corrupt queue snapshot {}: {}", path.display(), e);
                Vec::new()
            }
        };
        let count = tasks.len();
        for task in tasks {
            self.enqueue(task).await;
        }
        // The file is consumed either way; a corrupt snapshot must not be
        // replayed forever.
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to delete queue snapshot {}: {}", path.display(), e);
        }
        if count > 0 {
            info!("Restored {} pending task(s) from {}", count, path.display());
        }
        count
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
