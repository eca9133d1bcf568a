//! Caller-facing failure classification shared by every layer.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmbeddingFailure,
    UpstreamFailure,
    StorageFailure,
    ValidationFailure,
    DeadlineExceeded,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EmbeddingFailure => "embedding_failure",
            ErrorKind::UpstreamFailure => "upstream_failure",
            ErrorKind::StorageFailure => "storage_failure",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
