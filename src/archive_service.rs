//! Service orchestration: startup, intake, and graceful shutdown
//!
//! Startup order: validate settings, launch the browser session, restore any
//! persisted tasks, spawn the worker. Restoring consumes the snapshot file, so
//! it must come after the launch steps that can fail; otherwise a failed
//! startup would lose the pending tasks. Shutdown: signal the queue,
//! wait for the in-flight task, snapshot whatever is still queued, then tear
//! the browser down.

use crate::{
    ArchiveError, BrowserSession, CaptureExecutor, CaptureTask, Config, QueueWorker, TaskQueue,
    WorkerStats,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct ArchiveService {
    config: Config,
    queue: Arc<TaskQueue>,
    session: Arc<BrowserSession>,
    worker: Arc<QueueWorker>,
    worker_handle: JoinHandle<()>,
}

impl ArchiveService {
    /// Fails fatally only on invalid configuration or an unlaunchable
    /// browser; a missing or corrupt queue snapshot is not fatal.
    pub async fn start(config: Config) -> Result<Self, ArchiveError> {
        config.validate()?;

        let session = Arc::new(BrowserSession::new(config.clone()));
        session.launch().await?;

        let queue = Arc::new(TaskQueue::new());
        queue.restore(&config.queue_snapshot_path()).await;

        let executor = CaptureExecutor::new(config.clone());
        let worker = Arc::new(QueueWorker::new(
            queue.clone(),
            session.clone(),
            executor,
            config.task_pacing,
        ));
        let worker_handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run().await })
        };

        info!("Archive service started");
        Ok(Self {
            config,
            queue,
            session,
            worker,
            worker_handle,
        })
    }

    /// Intake boundary: always accepts, no backpressure. The caller owns
    /// request acknowledgment.
    pub async fn enqueue(&self, task: CaptureTask) {
        info!("Enqueued capture task: {}", task.url);
        self.queue.enqueue(task).await;
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.len().await
    }

    pub fn worker_stats(&self) -> WorkerStats {
        self.worker.stats()
    }

    /// Cooperative shutdown: the in-flight task finishes, remaining tasks are
    /// snapshotted to disk, and the browser session is torn down last.
    pub async fn shutdown(self) {
        info!("Shutting down archive service");
        self.queue.close();
        if let Err(e) = self.worker_handle.await {
            error!("Worker task failed: {}", e);
        }

        let remaining = self.queue.drain_all().await;
        if !remaining.is_empty() {
            let path = self.config.queue_snapshot_path();
            if let Err(e) = TaskQueue::snapshot(&remaining, &path).await {
                error!("Failed to snapshot {} pending task(s): {}", remaining.len(), e);
            }
        }

        self.session.teardown().await;
        info!("Archive service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_requires_save_path() {
        let result = ArchiveService::start(Config::default()).await;
        assert!(matches!(result, Err(ArchiveError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_failed_launch_preserves_queue_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            save_path: dir.path().join("archive"),
            run_dir: dir.path().to_path_buf(),
            browser_path: Some("/nonexistent/chrome".to_string()),
            ..Default::default()
        };
        let snapshot = config.queue_snapshot_path();
        let task = CaptureTask {
            url: "https://example.com".to_string(),
            title: "t".to_string(),
            publish_time: "2024-01-01 00:00:00".to_string(),
            nickname: None,
            copyright_flag: 0,
        };
        TaskQueue::snapshot(&[task], &snapshot).await.unwrap();

        let result = ArchiveService::start(config).await;
        assert!(result.is_err());
        assert!(
            snapshot.exists(),
            "pending tasks must survive a failed startup"
        );
    }
}
