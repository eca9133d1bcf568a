use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("embedding quota exhausted: {reason}")]
    QuotaExceeded { reason: String },

    #[error("invalid embedding input: {reason}")]
    InvalidInput { reason: String },

    #[error("embedding request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("invalid embedding response: {reason}")]
    InvalidResponse { reason: String },

    #[error("invalid embedder configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl EmbeddingError {
    /// Returns `true` for failures where retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Timeout { .. }
                | EmbeddingError::QuotaExceeded { .. }
                | EmbeddingError::RequestFailed { .. }
        )
    }
}
