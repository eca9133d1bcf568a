use std::path::PathBuf;

use thiserror::Error;

use super::mmap::MmapError;

#[derive(Error, Debug)]
/// Errors returned by the on-disk layer.
pub enum StorageError {
    /// IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mmap error.
    #[error("mmap error: {0}")]
    Mmap(#[from] MmapError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Snapshot written by an incompatible build.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },

    /// Embedding bytes are not a whole number of f32 values.
    #[error("embedding byte length {len} is not a multiple of 4")]
    InvalidEmbeddingBytes { len: usize },

    /// Parent directory could not be created.
    #[error("storage path unavailable: {path}")]
    StorageUnavailable { path: PathBuf },
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
