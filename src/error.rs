use std::time::Duration;
use thiserror::Error;

/// Categorizes errors for hook decision-making.
///
/// This is a lightweight, copyable view of [`Error`] so `on_error` hooks can
/// branch on the failure class without matching on transport internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upgrade was rejected or the connection could not be opened
    Handshake,
    /// The handshake did not complete within its timeout
    Timeout,
    /// Runtime I/O or protocol failure on an open session
    Transport,
    /// Retry bound reached, no further automatic attempts
    ReconnectExhausted,
    /// Operation refused because of the session's lifecycle phase
    Lifecycle,
    /// An event hook panicked
    Handler,
    /// Other error
    Other,
}

/// Errors that can occur in resilient-ws
#[derive(Error, Debug)]
pub enum Error {
    /// The transport rejected the upgrade or could not reach the endpoint
    #[error("Handshake with {url} failed: {reason}")]
    Handshake { url: String, reason: String },

    /// Handshake did not finish in time
    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),

    /// WebSocket transport error on an open session
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A session is already connecting or open on this client
    #[error("A session is already active on this client")]
    AlreadyActive,

    /// The connect attempt was aborted by a caller close
    #[error("Session closed before it opened")]
    Closed,

    /// Reconnection gave up after the configured number of attempts
    #[error("Reconnection abandoned after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// Outbound structured value could not be serialized
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// An event hook panicked
    #[error("Event hook failed: {0}")]
    Handler(String),
}

impl Error {
    /// Get the kind of this error for decision-making.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Handshake { .. } => ErrorKind::Handshake,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::WebSocket(_) => ErrorKind::Transport,
            Error::ReconnectExhausted { .. } => ErrorKind::ReconnectExhausted,
            Error::AlreadyActive | Error::Closed => ErrorKind::Lifecycle,
            Error::Handler(_) => ErrorKind::Handler,
            Error::Json(_) => ErrorKind::Other,
        }
    }

    /// Handshake failure; credentials in `url` are redacted
    pub(crate) fn handshake(url: &str, reason: impl Into<String>) -> Self {
        Error::Handshake {
            url: crate::transport::redact_url(url),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::handshake("ws://x", "refused").kind(), ErrorKind::Handshake);
        assert_eq!(Error::Timeout(Duration::from_secs(1)).kind(), ErrorKind::Timeout);
        assert_eq!(Error::AlreadyActive.kind(), ErrorKind::Lifecycle);
        assert_eq!(
            Error::ReconnectExhausted { attempts: 5 }.kind(),
            ErrorKind::ReconnectExhausted
        );
    }

    #[test]
    fn test_handshake_display_names_url() {
        let err = Error::handshake("ws://127.0.0.1:9", "connection refused");
        assert_eq!(
            err.to_string(),
            "Handshake with ws://127.0.0.1:9/ failed: connection refused"
        );

        let err = Error::handshake("wss://user:pw@example.com/feed", "rejected");
        assert!(!err.to_string().contains("pw"));
    }
}
