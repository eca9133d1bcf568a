//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.
//!
//! # Dimension Invariants
//!
//! Every entry in a knowledge store shares one embedding dimension. The dimension is
//! producer-determined (the embedding provider decides it), so it is carried at runtime:
//!
//! 1. Use [`DimConfig`] to pin the dimension up front when it is known
//! 2. Use [`validate_embedding_dim`] at module boundaries to catch mismatches early
//! 3. [`DEFAULT_EMBEDDING_DIM`] remains the default for the bundled providers

pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Minimum cosine similarity for a cached answer to be reused.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;
/// Results requested from the store per lookup.
pub const DEFAULT_SEARCH_LIMIT: usize = 3;
/// Candidates scored per lookup (top entries of the category by confidence, then usage).
pub const DEFAULT_CANDIDATE_WINDOW: usize = 50;
/// Confidence assigned to freshly generated entries.
pub const DEFAULT_INITIAL_CONFIDENCE: f64 = 0.8;
/// Weight kept from the previous confidence when feedback arrives.
pub const CONFIDENCE_RETENTION: f64 = 0.7;

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.3;
pub const DEFAULT_DAYS_UNUSED: u32 = 90;

pub const DEFAULT_AVG_TOKENS_PER_CALL: u64 = 2000;
pub const DEFAULT_COST_PER_1K_TOKENS: f64 = 0.01;

/// Number of entries reported in `topEntries`.
pub const DEFAULT_TOP_ENTRIES: usize = 10;

/// Runtime dimension configuration for the knowledge store.
///
/// Use this when the embedding dimension is known before the first entry is written.
/// The [`validate`](DimConfig::validate) method rejects degenerate values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimConfig {
    /// The embedding vector dimension (number of floats).
    pub embedding_dim: usize,
}

impl Default for DimConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl DimConfig {
    /// Creates a new dimension configuration with the specified embedding dimension.
    pub fn new(embedding_dim: usize) -> Self {
        Self { embedding_dim }
    }

    /// Returns an error if `embedding_dim` is zero.
    pub fn validate(&self) -> Result<(), DimValidationError> {
        if self.embedding_dim == 0 {
            return Err(DimValidationError::ZeroDimension);
        }
        Ok(())
    }
}

/// Error returned when dimension validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimValidationError {
    /// Embedding dimension cannot be zero.
    ZeroDimension,
    /// Runtime dimension does not match expected dimension.
    DimensionMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for DimValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroDimension => write!(f, "embedding dimension cannot be zero"),
            Self::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "dimension mismatch: expected {}, got {}",
                    expected, actual
                )
            }
        }
    }
}

impl std::error::Error for DimValidationError {}

/// Validates that a runtime embedding dimension matches the expected dimension.
///
/// # Example
///
/// ```
/// use lumen::constants::{validate_embedding_dim, DEFAULT_EMBEDDING_DIM};
///
/// let embedder_dim = 1536;
/// validate_embedding_dim(embedder_dim, DEFAULT_EMBEDDING_DIM).unwrap();
/// ```
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
