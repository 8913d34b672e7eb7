//! Error types for the network layer.

use thiserror::Error;

/// Result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors surfaced by the network client. Retryable variants are retried
/// internally up to the configured attempt count before reaching callers.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server answered with a non-success status.
    #[error("http status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Anything else the HTTP stack reported.
    #[error("transport error: {0}")]
    Transport(String),
}

impl NetworkError {
    /// Timeouts, connection failures, and 5xx responses are worth retrying;
    /// 4xx responses and decode failures are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Timeout | NetworkError::Connect(_) => true,
            NetworkError::Status { status, .. } => *status >= 500,
            NetworkError::Decode(_) | NetworkError::Transport(_) => false,
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetworkError::Timeout
        } else if e.is_connect() {
            NetworkError::Connect(e.to_string())
        } else {
            NetworkError::Transport(e.to_string())
        }
    }
}
