//! Per-task capture pipeline
//!
//! Given one tab and one task, drives navigation, stabilizes the page, and
//! produces the enabled artifacts. Format captures are independent: an empty
//! payload or a page-level failure in one format is logged and skipped while
//! the rest proceed. Only a dead browser connection aborts the task, and that
//! surfaces as `SessionDead` so the worker can relaunch and retry.

use crate::{
    apply_publish_time, artifact_path, artifacts_complete, is_connection_lost, sanitize_filename,
    ArchiveError, CaptureFormat, CaptureTask, Config, MarkupRewriter,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureSnapshotFormat, CaptureSnapshotParams, PrintToPdfParams, StopLoadingParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use std::path::{Path, PathBuf};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Incremental scroll to the bottom of the document to trigger lazy-loaded
/// resources, then a short in-page settle.
const SCROLL_TO_BOTTOM: &str = r#"
    async () => {
        const delay = (ms) => new Promise((resolve) => setTimeout(resolve, ms));
        let total = 0;
        const step = 300;
        while (total < document.body.scrollHeight) {
            window.scrollBy(0, step);
            await delay(200);
            total += step;
        }
        window.scrollTo(0, document.body.scrollHeight);
        await delay(1000);
    }
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// All enabled formats were attempted.
    Completed,
    /// Both completion-marker artifacts already existed; no navigation
    /// happened.
    Skipped,
}

pub struct CaptureExecutor {
    config: Config,
    rewriter: MarkupRewriter,
}

impl CaptureExecutor {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            rewriter: MarkupRewriter::new(),
        }
    }

    /// Run the pipeline for one task. The tab is closed on the way out no
    /// matter which step failed.
    pub async fn run(&self, page: Page, task: &CaptureTask) -> Result<CaptureOutcome, ArchiveError> {
        let result = self.run_inner(&page, task).await;
        if let Err(e) = page.close().await {
            debug!("Error closing tab: {}", e);
        }
        result
    }

    async fn run_inner(
        &self,
        page: &Page,
        task: &CaptureTask,
    ) -> Result<CaptureOutcome, ArchiveError> {
        let base = self.destination(task).await?;

        if artifacts_complete(&base) {
            info!(
                "Artifacts already exist, skipping capture: {}",
                base.display()
            );
            return Ok(CaptureOutcome::Skipped);
        }

        self.navigate(page, &task.url).await?;
        self.stabilize(page).await?;

        for format in &self.config.formats {
            let path = artifact_path(&base, *format);
            match format {
                CaptureFormat::Pdf => self.capture_pdf(page, &path, task).await?,
                CaptureFormat::Mhtml => self.capture_mhtml(page, &path, task).await?,
                CaptureFormat::Html => self.capture_html(page, &path, task).await?,
            }
        }

        Ok(CaptureOutcome::Completed)
    }

    /// `<save_path>/<nickname|default>/<sanitized title>`, creating the
    /// directory if absent.
    async fn destination(&self, task: &CaptureTask) -> Result<PathBuf, ArchiveError> {
        let dir = self.config.save_path.join(task.folder());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir.join(sanitize_filename(&task.title)))
    }

    /// Load the URL with a bounded wait. A timeout is recovered locally by
    /// stopping the load and capturing whatever rendered; a hard navigation
    /// error is logged and capture proceeds with the current page state. Only
    /// a lost connection propagates.
    async fn navigate(&self, page: &Page, url: &str) -> Result<(), ArchiveError> {
        let load = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), CdpError>(())
        };

        match timeout(self.config.navigation_timeout, load).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if is_connection_lost(&e) => Err(ArchiveError::SessionDead(e.to_string())),
            Ok(Err(e)) => {
                warn!("Navigation to {} failed, capturing current state: {}", url, e);
                Ok(())
            }
            Err(_) => {
                info!("Navigation to {} timed out, stopping page load", url);
                match timeout(
                    self.config.stop_loading_timeout,
                    page.execute(StopLoadingParams::default()),
                )
                .await
                {
                    Ok(Ok(_)) => debug!("Page load stopped"),
                    Ok(Err(e)) => debug!("Stop-loading failed: {}", e),
                    Err(_) => debug!("Stop-loading timed out"),
                }
                Ok(())
            }
        }
    }

    /// Scroll to the bottom so lazy resources load, then settle.
    async fn stabilize(&self, page: &Page) -> Result<(), ArchiveError> {
        match page.evaluate_function(SCROLL_TO_BOTTOM).await {
            Ok(_) => {}
            Err(e) if is_connection_lost(&e) => {
                return Err(ArchiveError::SessionDead(e.to_string()))
            }
            Err(e) => debug!("Scroll stabilization failed: {}", e),
        }
        tokio::time::sleep(self.config.settle_delay).await;
        Ok(())
    }

    async fn capture_pdf(
        &self,
        page: &Page,
        path: &Path,
        task: &CaptureTask,
    ) -> Result<(), ArchiveError> {
        let params = PrintToPdfParams {
            landscape: Some(true),
            print_background: Some(true),
            prefer_css_page_size: Some(true),
            ..Default::default()
        };
        let response = match page.execute(params).await {
            Ok(response) => response,
            Err(e) if is_connection_lost(&e) => {
                return Err(ArchiveError::SessionDead(e.to_string()))
            }
            Err(e) => {
                warn!("PDF capture failed for {}: {}", task.url, e);
                return Ok(());
            }
        };
        // The PDF payload arrives base64-encoded in a `Binary` wrapper.
        let data: &str = response.data.as_ref();
        if data.is_empty() {
            warn!("PDF capture returned no data for {}", task.url);
            return Ok(());
        }
        let bytes = match BASE64.decode(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("PDF payload for {} is not valid base64: {}", task.url, e);
                return Ok(());
            }
        };
        self.write_artifact(path, &bytes, task).await;
        Ok(())
    }

    async fn capture_mhtml(
        &self,
        page: &Page,
        path: &Path,
        task: &CaptureTask,
    ) -> Result<(), ArchiveError> {
        let params = CaptureSnapshotParams {
            format: Some(CaptureSnapshotFormat::Mhtml),
        };
        let response = match page.execute(params).await {
            Ok(response) => response,
            Err(e) if is_connection_lost(&e) => {
                return Err(ArchiveError::SessionDead(e.to_string()))
            }
            Err(e) => {
                warn!("MHTML capture failed for {}: {}", task.url, e);
                return Ok(());
            }
        };
        if response.data.is_empty() {
            warn!("MHTML capture returned no data for {}", task.url);
            return Ok(());
        }
        self.write_artifact(path, response.data.as_bytes(), task).await;
        Ok(())
    }

    async fn capture_html(
        &self,
        page: &Page,
        path: &Path,
        task: &CaptureTask,
    ) -> Result<(), ArchiveError> {
        let content = match page.content().await {
            Ok(content) => content,
            Err(e) if is_connection_lost(&e) => {
                return Err(ArchiveError::SessionDead(e.to_string()))
            }
            Err(e) => {
                warn!("HTML export failed for {}: {}", task.url, e);
                return Ok(());
            }
        };
        if content.is_empty() {
            warn!("HTML export returned no content for {}", task.url);
            return Ok(());
        }
        let rewritten = self.rewriter.rewrite(&content);
        self.write_artifact(path, rewritten.as_bytes(), task).await;
        Ok(())
    }

    /// Write one artifact and stamp it with the task's publish time. Disk
    /// failures are per-format failures: logged, siblings unaffected.
    async fn write_artifact(&self, path: &Path, bytes: &[u8], task: &CaptureTask) {
        match tokio::fs::write(path, bytes).await {
            Ok(()) => {
                info!("Saved artifact: {}", path.display());
                apply_publish_time(path, &task.publish_time);
            }
            Err(e) => warn!("Failed to write {}: {}", path.display(), e),
        }
    }
}
