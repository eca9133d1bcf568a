use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by upstream generation providers.
pub enum UpstreamError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("{operation} request failed: {reason}")]
    RequestFailed {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} returned no content")]
    EmptyResponse { operation: &'static str },

    #[error("{operation} returned an unusable response: {reason}")]
    InvalidResponse {
        operation: &'static str,
        reason: String,
    },
}

impl UpstreamError {
    pub fn operation(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { operation, .. }
            | UpstreamError::RequestFailed { operation, .. }
            | UpstreamError::EmptyResponse { operation }
            | UpstreamError::InvalidResponse { operation, .. } => operation,
        }
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;
