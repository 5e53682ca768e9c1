//! # Page Archiver
//!
//! An asynchronous web-page archival service. Capture tasks (URL + metadata)
//! are queued and drained by a single background worker that drives one
//! Chrome/Chromium instance over the Chrome DevTools Protocol, writing up to
//! three artifacts per page:
//!
//! - a PDF via print-to-PDF
//! - an MHTML full-page snapshot
//! - a rewritten HTML export of the rendered DOM
//!
//! Artifacts land in `<save_path>/<nickname>/<sanitized title>.<ext>` and
//! carry the task's publish time as their modification time. A capture whose
//! PDF and MHTML artifacts already exist is skipped without navigating.
//!
//! ## Reliability model
//!
//! - Single consumer, strict FIFO, unbounded queue.
//! - A dead browser is relaunched automatically and the in-flight task is
//!   retried without loss.
//! - Pending tasks are snapshotted to disk at shutdown and restored (and the
//!   snapshot deleted) at the next startup: at-least-once delivery.
//! - A slow page is bounded by a navigation timeout plus a stop-loading
//!   recovery; capture proceeds with whatever content rendered.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use page_archiver::{ArchiveService, CaptureTask, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         save_path: "/srv/archive".into(),
//!         ..Default::default()
//!     };
//!     let service = ArchiveService::start(config).await?;
//!
//!     service
//!         .enqueue(CaptureTask {
//!             url: "https://example.com".to_string(),
//!             title: "Example".to_string(),
//!             publish_time: "2024-01-01 00:00:00".to_string(),
//!             nickname: None,
//!             copyright_flag: 0,
//!         })
//!         .await;
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Configuration, task types, and browser launch settings
pub mod config;

/// Error types and CDP failure classification
pub mod error;

/// Browser engine lifecycle management
pub mod browser_session;

/// Per-task capture pipeline
pub mod capture;

/// Durable FIFO of pending capture tasks
pub mod task_queue;

/// Single-consumer processing loop
pub mod worker;

/// Service orchestration and graceful shutdown
pub mod archive_service;

/// Filename, markup, and timestamp helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use archive_service::*;
pub use browser_session::*;
pub use capture::*;
pub use config::*;
pub use error::*;
pub use task_queue::*;
pub use utils::*;
pub use worker::*;
