use thiserror::Error;

use crate::constants::DimValidationError;
use crate::embedding::EmbeddingError;
use crate::error::ErrorKind;
use crate::payload::PayloadError;
use crate::storage::StorageError;

use super::similarity::SimilarityError;

#[derive(Debug, Error)]
/// Errors returned by [`super::KnowledgeStore`] and its backends.
pub enum StoreError {
    /// Embedding provider failed.
    #[error("embedding failed: {source}")]
    Embedding {
        #[source]
        source: EmbeddingError,
    },

    /// Persistence layer failed.
    #[error("storage operation '{operation}' failed: {reason}")]
    Storage {
        operation: &'static str,
        reason: String,
    },

    /// A persisted record could not be decoded.
    #[error("corrupt entry {entry_id}: {reason}")]
    Corrupt { entry_id: String, reason: String },

    #[error("confidence {value} outside [0, 1]")]
    InvalidConfidence { value: f64 },

    #[error("feedback score {value} outside [0, 1]")]
    InvalidFeedback { value: f64 },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("similarity failed: {0}")]
    Similarity(#[from] SimilarityError),

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("invalid store configuration: {reason}")]
    Config { reason: String },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Embedding { .. } => ErrorKind::EmbeddingFailure,
            StoreError::Storage { .. } | StoreError::Corrupt { .. } => ErrorKind::StorageFailure,
            StoreError::InvalidConfidence { .. }
            | StoreError::InvalidFeedback { .. }
            | StoreError::DimensionMismatch { .. }
            | StoreError::Similarity(_)
            | StoreError::InvalidInput { .. }
            | StoreError::Config { .. } => ErrorKind::ValidationFailure,
        }
    }

    pub(crate) fn storage(operation: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Storage {
            operation,
            reason: err.to_string(),
        }
    }

    pub(crate) fn corrupt(entry_id: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        StoreError::Corrupt {
            entry_id: entry_id.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<EmbeddingError> for StoreError {
    fn from(source: EmbeddingError) -> Self {
        StoreError::Embedding { source }
    }
}

impl From<DimValidationError> for StoreError {
    fn from(err: DimValidationError) -> Self {
        match err {
            DimValidationError::DimensionMismatch { expected, actual } => {
                StoreError::DimensionMismatch { expected, actual }
            }
            DimValidationError::ZeroDimension => StoreError::Config {
                reason: err.to_string(),
            },
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::storage("snapshot", err)
    }
}

impl From<PayloadError> for StoreError {
    fn from(err: PayloadError) -> Self {
        StoreError::storage("encode_payload", err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::storage("sqlite", err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
