use crate::constants::{
    DEFAULT_AVG_TOKENS_PER_CALL, DEFAULT_COST_PER_1K_TOKENS, DEFAULT_DAYS_UNUSED,
    DEFAULT_INITIAL_CONFIDENCE, DEFAULT_MIN_CONFIDENCE, DEFAULT_SEARCH_LIMIT,
    DEFAULT_SIMILARITY_THRESHOLD,
};

use super::error::{ResponderError, ResponderResult};

/// Confidence score for `helpful = true` without a rating.
pub const HELPFUL_DEFAULT_SCORE: f64 = 0.9;
/// Confidence score for `helpful = false`.
pub const UNHELPFUL_SCORE: f64 = 0.3;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Which entries a maintenance pass deletes.
///
/// An entry goes when its confidence is below `min_confidence` **or** it was
/// never used within the last `days_unused` days.
pub struct MaintenancePolicy {
    pub min_confidence: f64,
    pub days_unused: u32,
}

impl Default for MaintenancePolicy {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            days_unused: DEFAULT_DAYS_UNUSED,
        }
    }
}

impl MaintenancePolicy {
    pub fn validate(&self) -> ResponderResult<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ResponderError::Config {
                reason: format!(
                    "min_confidence must be in [0, 1], got {}",
                    self.min_confidence
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponderConfig {
    /// Minimum cosine similarity for a cache hit.
    pub similarity_threshold: f32,
    /// Maximum matches considered per lookup.
    pub search_limit: usize,
    /// Confidence assigned to freshly generated entries.
    pub initial_confidence: f64,
    /// Tokens one upstream call is assumed to cost.
    pub avg_tokens_per_call: u64,
    /// Currency units per 1000 tokens.
    pub cost_per_1k_tokens: f64,
    pub maintenance: MaintenancePolicy,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            search_limit: DEFAULT_SEARCH_LIMIT,
            initial_confidence: DEFAULT_INITIAL_CONFIDENCE,
            avg_tokens_per_call: DEFAULT_AVG_TOKENS_PER_CALL,
            cost_per_1k_tokens: DEFAULT_COST_PER_1K_TOKENS,
            maintenance: MaintenancePolicy::default(),
        }
    }
}

impl ResponderConfig {
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn initial_confidence(mut self, confidence: f64) -> Self {
        self.initial_confidence = confidence;
        self
    }

    pub fn cost_model(mut self, avg_tokens_per_call: u64, cost_per_1k_tokens: f64) -> Self {
        self.avg_tokens_per_call = avg_tokens_per_call;
        self.cost_per_1k_tokens = cost_per_1k_tokens;
        self
    }

    pub fn maintenance(mut self, policy: MaintenancePolicy) -> Self {
        self.maintenance = policy;
        self
    }

    pub fn validate(&self) -> ResponderResult<()> {
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ResponderError::Config {
                reason: format!(
                    "similarity_threshold must be in [-1, 1], got {}",
                    self.similarity_threshold
                ),
            });
        }
        if self.search_limit == 0 {
            return Err(ResponderError::Config {
                reason: "search_limit must be > 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.initial_confidence) {
            return Err(ResponderError::Config {
                reason: format!(
                    "initial_confidence must be in [0, 1], got {}",
                    self.initial_confidence
                ),
            });
        }
        if !self.cost_per_1k_tokens.is_finite() || self.cost_per_1k_tokens < 0.0 {
            return Err(ResponderError::Config {
                reason: format!(
                    "cost_per_1k_tokens must be >= 0, got {}",
                    self.cost_per_1k_tokens
                ),
            });
        }
        self.maintenance.validate()
    }
}

/// Maps user feedback to a confidence score in `[0, 1]`.
pub fn feedback_score(helpful: bool, rating: Option<u8>) -> ResponderResult<f64> {
    if let Some(r) = rating
        && !(MIN_RATING..=MAX_RATING).contains(&r)
    {
        return Err(ResponderError::InvalidRating { rating: r });
    }

    Ok(match (helpful, rating) {
        (false, _) => UNHELPFUL_SCORE,
        (true, Some(r)) => f64::from(r) / f64::from(MAX_RATING),
        (true, None) => HELPFUL_DEFAULT_SCORE,
    })
}
