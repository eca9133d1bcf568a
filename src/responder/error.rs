use thiserror::Error;

use crate::error::ErrorKind;
use crate::knowledge::{Category, EntryId, StoreError};
use crate::upstream::UpstreamError;

use super::types::RequestPhase;

#[derive(Debug, Error)]
/// Errors returned by [`super::SmartResponder`].
pub enum ResponderError {
    #[error("knowledge store '{operation}' failed: {source}")]
    Store {
        operation: &'static str,
        category: Option<Category>,
        #[source]
        source: StoreError,
    },

    #[error("upstream generation for {category} failed: {source}")]
    Upstream {
        category: Category,
        #[source]
        source: UpstreamError,
    },

    #[error("upstream returned an unusable {category} payload: {reason}")]
    InvalidUpstreamPayload { category: Category, reason: String },

    #[error("rating {rating} outside 1..=5")]
    InvalidRating { rating: u8 },

    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("entry {entry_id} not found")]
    NotFound { entry_id: EntryId },

    #[error("request deadline of {budget_ms}ms exceeded while {phase}")]
    DeadlineExceeded { phase: RequestPhase, budget_ms: u64 },

    #[error("invalid responder configuration: {reason}")]
    Config { reason: String },
}

impl ResponderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResponderError::Store { source, .. } => source.kind(),
            ResponderError::Upstream { .. } | ResponderError::InvalidUpstreamPayload { .. } => {
                ErrorKind::UpstreamFailure
            }
            ResponderError::InvalidRating { .. }
            | ResponderError::InvalidQuery { .. }
            | ResponderError::Config { .. } => ErrorKind::ValidationFailure,
            ResponderError::NotFound { .. } => ErrorKind::NotFound,
            ResponderError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
        }
    }

    pub(crate) fn store(operation: &'static str, category: Option<Category>) -> impl FnOnce(StoreError) -> Self {
        move |source| ResponderError::Store {
            operation,
            category,
            source,
        }
    }
}

pub type ResponderResult<T> = Result<T, ResponderError>;
