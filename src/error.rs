use chromiumoxide::error::CdpError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    #[error("browser session is not ready")]
    SessionNotReady,

    #[error("browser session lost: {0}")]
    SessionDead(String),

    #[error("browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("unrecoverable task failure: {0}")]
    Unrecoverable(String),
}

impl ArchiveError {
    /// True when only a full browser relaunch can recover; the worker retries
    /// the same task after relaunching instead of dropping it.
    pub fn requires_relaunch(&self) -> bool {
        matches!(
            self,
            ArchiveError::SessionDead(_) | ArchiveError::SessionNotReady
        )
    }

    /// Classify a CDP failure: a dead browser connection becomes `SessionDead`,
    /// anything else is a page-level failure the caller logs and moves past.
    pub fn from_cdp(err: CdpError) -> Self {
        if is_connection_lost(&err) {
            ArchiveError::SessionDead(err.to_string())
        } else {
            ArchiveError::Unrecoverable(err.to_string())
        }
    }
}

/// A dead browser surfaces as a websocket failure or a dropped command
/// channel, and commands racing a closing target come back as "Target
/// closed". Anything else is a page-level failure and must not trigger a
/// relaunch, even when its message happens to mention a connection.
pub fn is_connection_lost(err: &CdpError) -> bool {
    matches!(err, CdpError::Ws(_) | CdpError::ChannelSendError(_))
        || err.to_string().contains("Target closed")
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        ArchiveError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        ArchiveError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromiumoxide::error::ChannelError;
    use futures::channel::oneshot::Canceled;

    #[test]
    fn test_dropped_command_channel_is_connection_loss() {
        let err = CdpError::ChannelSendError(ChannelError::from(Canceled));
        assert!(is_connection_lost(&err));
        assert!(ArchiveError::from_cdp(err).requires_relaunch());
    }

    #[test]
    fn test_page_level_errors_are_not_connection_loss() {
        assert!(!is_connection_lost(&CdpError::NoResponse));

        // A message mentioning a connection is not enough on its own.
        let serde_err = serde_json::from_str::<i32>("connection closed").unwrap_err();
        let err = CdpError::Serde(serde_err);
        assert!(!is_connection_lost(&err));
        assert!(!ArchiveError::from_cdp(err).requires_relaunch());
    }
}
