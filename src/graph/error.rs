use std::time::Duration;

use thiserror::Error;

use crate::auth::error::AuthError;

/// Errors from a single Microsoft Graph call.
///
/// `is_retryable()` separates throttling and server faults from permanent
/// failures so idempotent reads can back off and try again.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("Unexpected response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("Token refresh after HTTP 401 failed: {0}")]
    Reauth(#[from] AuthError),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl GraphError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GraphError::Status { status, .. } => *status == 429 || *status >= 500,
            GraphError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            GraphError::Malformed { .. } => false,
            GraphError::Reauth(_) => false,
            GraphError::NotFound(_) => false,
        }
    }

    /// Server-requested delay on throttled responses.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GraphError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
