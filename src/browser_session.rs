//! Lifecycle management for the single shared browser engine
//!
//! One `BrowserSession` owns one Chrome process and its browsing context.
//! `launch()` is idempotent and doubles as the crash-recovery primitive: it
//! tears down whatever is left of a dead process before starting fresh. The
//! session never self-heals; the worker decides when a capture failure means
//! the session is gone and calls `launch()` again.

use crate::{build_browser_config, is_connection_lost, ArchiveError, Config};
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Launching,
    Ready,
    Closing,
    Closed,
}

struct SessionInner {
    browser: Browser,
    /// Task polling the CDP event stream; the stream ending means the browser
    /// process or its connection is gone.
    handler: JoinHandle<()>,
}

pub struct BrowserSession {
    config: Config,
    state: StdMutex<SessionState>,
    inner: Mutex<Option<SessionInner>>,
    /// Serializes launch/teardown so concurrent crash-triggered restarts
    /// cannot race. Tab creation is deliberately not behind this lock.
    lifecycle: Mutex<()>,
}

impl BrowserSession {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: StdMutex::new(SessionState::Uninitialized),
            inner: Mutex::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock poisoned")
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().expect("session state lock poisoned") = state;
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Idempotent: returns immediately when already Ready. Otherwise tears
    /// down any stale process, starts a fresh engine with the hardened flag
    /// set, and opens one initial tab to prove the context is usable before
    /// flipping to Ready.
    pub async fn launch(&self) -> Result<(), ArchiveError> {
        let _guard = self.lifecycle.lock().await;
        if self.state() == SessionState::Ready {
            return Ok(());
        }

        self.set_state(SessionState::Launching);
        self.close_engine().await;

        let browser_config = build_browser_config(&self.config)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ArchiveError::BrowserLaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
            info!("CDP handler stream ended");
        });

        let initial_tab = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ArchiveError::BrowserLaunchFailed(e.to_string()))?;
        // The tab handle is dropped but the tab stays open, keeping the
        // context warm between tasks.
        drop(initial_tab);

        *self.inner.lock().await = Some(SessionInner {
            browser,
            handler: handler_task,
        });
        self.set_state(SessionState::Ready);
        info!("Browser session ready");
        Ok(())
    }

    /// Open a fresh tab for one capture. Rejected with `SessionNotReady`
    /// while a launch is in progress or before the first launch completes.
    pub async fn new_tab(&self) -> Result<Page, ArchiveError> {
        if self.state() != SessionState::Ready {
            return Err(ArchiveError::SessionNotReady);
        }
        let inner = self.inner.lock().await;
        let session = inner.as_ref().ok_or(ArchiveError::SessionNotReady)?;
        session
            .browser
            .new_page("about:blank")
            .await
            .map_err(ArchiveError::from_cdp)
    }

    /// Best-effort shutdown of the engine and its connection.
    pub async fn teardown(&self) {
        let _guard = self.lifecycle.lock().await;
        self.set_state(SessionState::Closing);
        self.close_engine().await;
        self.set_state(SessionState::Closed);
        info!("Browser session closed");
    }

    /// Close each resource independently and swallow already-closed errors;
    /// a failure closing one must not prevent closing the next.
    async fn close_engine(&self) {
        let mut slot = self.inner.lock().await;
        if let Some(mut session) = slot.take() {
            if let Err(e) = session.browser.close().await {
                if is_connection_lost(&e) {
                    debug!("Browser already closed: {}", e);
                } else {
                    warn!("Error closing browser: {}", e);
                }
            }
            session.handler.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> BrowserSession {
        BrowserSession::new(Config {
            save_path: "/tmp/archive".into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_new_tab_before_launch_is_rejected() {
        let session = session();
        assert_eq!(session.state(), SessionState::Uninitialized);
        let err = session.new_tab().await.unwrap_err();
        assert!(matches!(err, ArchiveError::SessionNotReady));
        assert!(err.requires_relaunch());
    }

    #[tokio::test]
    async fn test_teardown_without_launch_is_safe() {
        let session = session();
        session.teardown().await;
        assert_eq!(session.state(), SessionState::Closed);
    }
}
