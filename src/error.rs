use reqwest::StatusCode;
use thiserror::Error;

/// Failure raised by a [`Transport`](crate::transport::Transport) before any
/// HTTP status was observed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Timeouts, refused or reset connections. Retried like throttling.
    #[error("network error: {0}")]
    Retryable(String),
    /// The request could not be built or sent at all.
    #[error("request error: {0}")]
    Fatal(String),
}

/// Terminal outcome of a [`RetryingFetcher`](crate::fetcher::RetryingFetcher) call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("gave up after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Status code when the failure came from an HTTP response
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
