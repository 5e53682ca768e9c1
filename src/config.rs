//! Configuration and task types with serde serialization/deserialization
//!
//! The service consumes a fully resolved [`Config`]; parsing a config file into
//! it is the binary's job. Timing constants default to values tuned for a
//! single shared browser instance and are overridable for tests.

use crate::ArchiveError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Folder used when a task carries no nickname.
pub const DEFAULT_FOLDER: &str = "default";

/// Filename of the queue snapshot written under the run directory at shutdown.
pub const QUEUE_SNAPSHOT_FILE: &str = "pending-tasks.json";

/// Main configuration for the archival service.
///
/// # Examples
///
/// ```rust
/// use page_archiver::Config;
///
/// let config = Config {
///     save_path: "/srv/archive".into(),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Run the browser without a visible window (default: true)
    pub headless: bool,

    /// Path to the Chrome/Chromium executable (default: auto-detect)
    pub browser_path: Option<String>,

    /// Root directory for captured artifacts. Required; startup fails when
    /// empty.
    pub save_path: PathBuf,

    /// Formats captured for each task (default: all three)
    pub formats: Vec<CaptureFormat>,

    /// Directory holding the queue snapshot file (default: current directory)
    pub run_dir: PathBuf,

    /// Browser viewport applied to every tab
    pub viewport: Viewport,

    /// Bound on waiting for a page to reach network quiescence (default: 15s)
    pub navigation_timeout: Duration,

    /// Bound on the stop-loading recovery command after a navigation timeout
    /// (default: 2s)
    pub stop_loading_timeout: Duration,

    /// Wait after the scroll-to-bottom pass before capturing (default: 3s)
    pub settle_delay: Duration,

    /// Pause between tasks, bounding load on the browser engine (default: 5s)
    pub task_pacing: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            headless: true,
            browser_path: None,
            save_path: PathBuf::new(),
            formats: CaptureFormat::all(),
            run_dir: PathBuf::from("."),
            viewport: Viewport::default(),
            navigation_timeout: Duration::from_secs(15),
            stop_loading_timeout: Duration::from_secs(2),
            settle_delay: Duration::from_secs(3),
            task_pacing: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// The save path is the only setting without a usable default.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.save_path.as_os_str().is_empty() {
            return Err(ArchiveError::ConfigurationError(
                "save_path is not configured".to_string(),
            ));
        }
        if self.formats.is_empty() {
            return Err(ArchiveError::ConfigurationError(
                "at least one capture format must be enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Location of the queue snapshot file for this run.
    pub fn queue_snapshot_path(&self) -> PathBuf {
        self.run_dir.join(QUEUE_SNAPSHOT_FILE)
    }
}

/// Browser viewport applied to the browsing context.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 980,
        }
    }
}

/// Output formats producible for a single task. Each format is captured
/// independently; a failure in one never aborts the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFormat {
    /// Print-to-PDF page description document
    Pdf,
    /// MHTML full-page snapshot
    Mhtml,
    /// Rewritten export of the rendered markup
    Html,
}

impl CaptureFormat {
    pub fn all() -> Vec<CaptureFormat> {
        vec![CaptureFormat::Pdf, CaptureFormat::Mhtml, CaptureFormat::Html]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CaptureFormat::Pdf => "pdf",
            CaptureFormat::Mhtml => "mhtml",
            CaptureFormat::Html => "html",
        }
    }

    /// Parse a comma-separated allow-list such as `"pdf,mhtml"`.
    pub fn parse_list(value: &str) -> Result<Vec<CaptureFormat>, ArchiveError> {
        let mut formats = Vec::new();
        for token in value.split(',') {
            let token = token.trim().to_ascii_lowercase();
            if token.is_empty() {
                continue;
            }
            let format = match token.as_str() {
                "pdf" => CaptureFormat::Pdf,
                "mhtml" => CaptureFormat::Mhtml,
                "html" => CaptureFormat::Html,
                other => {
                    return Err(ArchiveError::ConfigurationError(format!(
                        "unknown capture format: {other}"
                    )))
                }
            };
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        if formats.is_empty() {
            return Err(ArchiveError::ConfigurationError(
                "empty capture format list".to_string(),
            ));
        }
        Ok(formats)
    }
}

/// One request to archive a single URL. Immutable once enqueued; identity is
/// structural and duplicates are processed independently.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CaptureTask {
    pub url: String,

    /// Source of the artifact filename after sanitization.
    pub title: String,

    /// `"YYYY-MM-DD HH:MM:SS"`; applied to artifacts as their modification
    /// time.
    pub publish_time: String,

    /// Destination sub-folder under the save path.
    #[serde(default)]
    pub nickname: Option<String>,

    #[serde(default)]
    pub copyright_flag: i64,
}

impl CaptureTask {
    /// Folder the task's artifacts land in.
    pub fn folder(&self) -> &str {
        self.nickname.as_deref().unwrap_or(DEFAULT_FOLDER)
    }
}

/// Fixed hardened flag set for the browser engine: sandboxing off for
/// container compatibility, automation-detection surfaces suppressed,
/// background throttling disabled, certificate errors tolerated.
pub fn browser_launch_args(config: &Config) -> Vec<String> {
    vec![
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--deny-permission-prompts".to_string(),
        "--disable-notifications".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-breakpad".to_string(),
        "--disable-client-side-phishing-detection".to_string(),
        "--disable-component-extensions-with-background-pages".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-extensions".to_string(),
        "--disable-features=TranslateUI".to_string(),
        "--disable-hang-monitor".to_string(),
        "--disable-ipc-flooding-protection".to_string(),
        "--disable-popup-blocking".to_string(),
        "--disable-prompt-on-repost".to_string(),
        "--disable-sync".to_string(),
        "--force-color-profile=srgb".to_string(),
        "--metrics-recording-only".to_string(),
        "--no-first-run".to_string(),
        "--password-store=basic".to_string(),
        "--use-mock-keychain".to_string(),
        "--ignore-certificate-errors".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
    ]
}

/// Build the chromiumoxide launch configuration from the resolved settings.
pub fn build_browser_config(
    config: &Config,
) -> Result<chromiumoxide::browser::BrowserConfig, ArchiveError> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(browser_launch_args(config));

    if !config.headless {
        builder = builder.with_head();
    }

    if let Some(path) = &config.browser_path {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(ArchiveError::BrowserLaunchFailed)
}
