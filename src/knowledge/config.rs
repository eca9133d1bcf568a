use std::time::Duration;

use crate::constants::{
    DEFAULT_CANDIDATE_WINDOW, DEFAULT_SEARCH_LIMIT, DEFAULT_SIMILARITY_THRESHOLD,
    DEFAULT_TOP_ENTRIES, DimConfig,
};

use super::error::{StoreError, StoreResult};

pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum candidates scored per search (ordered by confidence, then usage).
    pub candidate_window: usize,
    pub default_threshold: f32,
    pub default_limit: usize,
    /// Pins the embedding dimension before the first write when set.
    pub embedding_dim: Option<usize>,
    pub embed_timeout: Duration,
    /// Number of entries reported in `stats().top_entries`.
    pub top_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            candidate_window: DEFAULT_CANDIDATE_WINDOW,
            default_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            default_limit: DEFAULT_SEARCH_LIMIT,
            embedding_dim: None,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            top_entries: DEFAULT_TOP_ENTRIES,
        }
    }
}

impl StoreConfig {
    pub fn candidate_window(mut self, window: usize) -> Self {
        self.candidate_window = window;
        self
    }

    pub fn embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = Some(dim);
        self
    }

    pub fn embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn top_entries(mut self, n: usize) -> Self {
        self.top_entries = n;
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.candidate_window == 0 {
            return Err(StoreError::Config {
                reason: "candidate_window must be > 0".to_string(),
            });
        }
        if self.default_limit == 0 {
            return Err(StoreError::Config {
                reason: "default_limit must be > 0".to_string(),
            });
        }
        if !(-1.0..=1.0).contains(&self.default_threshold) {
            return Err(StoreError::Config {
                reason: format!(
                    "default_threshold must be in [-1, 1], got {}",
                    self.default_threshold
                ),
            });
        }
        if let Some(dim) = self.embedding_dim {
            DimConfig::new(dim).validate()?;
        }
        if self.embed_timeout.is_zero() {
            return Err(StoreError::Config {
                reason: "embed_timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
