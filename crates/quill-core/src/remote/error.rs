//! Remote error handling
//!
//! Every failure of a single remote request is a `RemoteError`. The client
//! uses `is_transient` to decide whether to retry.

use std::time::Duration;

use thiserror::Error;

/// Statuses that are retried with backoff
const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Errors from a single remote request
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The remote answered with a non-success status
    #[error("Remote returned {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(String),

    /// The response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// A transient failure that kept recurring
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<RemoteError>,
    },
}

impl RemoteError {
    /// Status error without a code or retry hint
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Status {
            status,
            code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Rate-limited or server-unavailable
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Status { status, .. } if TRANSIENT_STATUSES.contains(status))
    }

    /// Explicit retry hint carried by the failure
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status, looking through exhausted retries
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::RetriesExhausted { last, .. } => last.status_code(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Decode(e.to_string())
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;
