//! Error taxonomy for backend interaction.
//!
//! [`ErrorKind`] is the small, copyable classification stored in feed state
//! and matched on by the presentation layer. [`FetchError`] pairs a kind with
//! a human-readable detail for logs and status lines.

use std::time::Duration;

use thiserror::Error;

/// Classified failure of a backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    #[error("request timed out")]
    Timeout,
    #[error("authentication required")]
    AuthRequired,
    #[error("server error")]
    ServerError,
    #[error("backend unreachable")]
    NetworkUnreachable,
    #[error("malformed response")]
    MalformedResponse,
}

/// The three fixed ways a feed error is shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPresentation {
    /// Recoverable; retried automatically.
    Transient,
    /// Fatal for the feed until the caller re-authenticates.
    Authentication,
    /// Retried with backoff.
    Server,
}

impl ErrorPresentation {
    pub fn label(self) -> &'static str {
        match self {
            ErrorPresentation::Transient => "connection problem, retrying",
            ErrorPresentation::Authentication => "session expired, re-authenticate",
            ErrorPresentation::Server => "server error, retrying",
        }
    }
}

impl ErrorKind {
    pub fn presentation(self) -> ErrorPresentation {
        match self {
            ErrorKind::Timeout | ErrorKind::NetworkUnreachable => ErrorPresentation::Transient,
            ErrorKind::AuthRequired => ErrorPresentation::Authentication,
            ErrorKind::ServerError | ErrorKind::MalformedResponse => ErrorPresentation::Server,
        }
    }

    /// Whether the poller keeps retrying after this error.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::AuthRequired)
    }

    /// Classify a non-success HTTP status. Returns `None` for 2xx.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 | 403 => Some(ErrorKind::AuthRequired),
            _ => Some(ErrorKind::ServerError),
        }
    }
}

/// A failed backend request: its classification plus detail text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct FetchError {
    kind: ErrorKind,
    detail: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(ErrorKind::Timeout, format!("no response after {}ms", after.as_millis()))
    }

    pub fn unreachable(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::NetworkUnreachable, detail.to_string())
    }

    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::MalformedResponse, detail.to_string())
    }

    /// Error for a non-2xx status, or `None` when the status is a success.
    pub fn from_status(status: u16) -> Option<Self> {
        ErrorKind::from_status(status).map(|kind| Self::new(kind, format!("HTTP {status}")))
    }
}
