use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::constants::{CONFIDENCE_RETENTION, validate_embedding_dim};
use crate::embedding::{Embedder, embed_with_timeout};
use crate::payload::ResponsePayload;

use super::backend::KnowledgeBackend;
use super::config::StoreConfig;
use super::error::{StoreError, StoreResult};
use super::similarity::rank_candidates;
use super::types::{
    Category, EntryId, EntrySummary, KnowledgeEntry, KnowledgeStats, ScoredEntry,
};

const UNPINNED: usize = 0;

fn check_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Owner of all knowledge entries.
///
/// Cheap to clone; clones share the backend, embedder, pinned dimension and
/// write gate. `store` and `cleanup` are serialized through the gate; reads and
/// per-entry updates run concurrently and rely on the backend's atomicity.
pub struct KnowledgeStore<B: KnowledgeBackend> {
    backend: Arc<B>,
    embedder: Arc<dyn Embedder>,
    config: Arc<StoreConfig>,
    dim: Arc<AtomicUsize>,
    write_gate: Arc<Mutex<()>>,
}

impl<B: KnowledgeBackend> Clone for KnowledgeStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            embedder: Arc::clone(&self.embedder),
            config: Arc::clone(&self.config),
            dim: Arc::clone(&self.dim),
            write_gate: Arc::clone(&self.write_gate),
        }
    }
}

impl<B: KnowledgeBackend> std::fmt::Debug for KnowledgeStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("backend", &self.backend.name())
            .field("embedder", &self.embedder.model())
            .field("embedding_dim", &self.embedding_dim())
            .field("config", &self.config)
            .finish()
    }
}

impl<B: KnowledgeBackend> KnowledgeStore<B> {
    /// Builds a store over `backend`, pinning the embedding dimension from the
    /// config or from data already persisted.
    pub async fn open(
        backend: B,
        embedder: Arc<dyn Embedder>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        config.validate()?;

        let persisted = backend.embedding_dim().await?;
        let pinned = match (config.embedding_dim, persisted) {
            (Some(expected), Some(actual)) => {
                validate_embedding_dim(actual, expected)?;
                expected
            }
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => embedder.dimension().unwrap_or(UNPINNED),
        };

        info!(
            backend = backend.name(),
            model = embedder.model(),
            embedding_dim = pinned,
            candidate_window = config.candidate_window,
            "Knowledge store opened"
        );

        Ok(Self {
            backend: Arc::new(backend),
            embedder,
            config: Arc::new(config),
            dim: Arc::new(AtomicUsize::new(pinned)),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Pinned embedding dimension, `None` until known.
    pub fn embedding_dim(&self) -> Option<usize> {
        match self.dim.load(Ordering::Acquire) {
            UNPINNED => None,
            d => Some(d),
        }
    }

    /// Pins the dimension on first use and rejects any later mismatch.
    fn check_dim(&self, actual: usize) -> StoreResult<()> {
        match self
            .dim
            .compare_exchange(UNPINNED, actual, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(embedding_dim = actual, "Embedding dimension pinned");
                Ok(())
            }
            Err(expected) if expected == actual => Ok(()),
            Err(expected) => Err(StoreError::DimensionMismatch { expected, actual }),
        }
    }

    async fn embed(&self, text: &str) -> StoreResult<Vec<f32>> {
        let embedding =
            embed_with_timeout(self.embedder.as_ref(), text, self.config.embed_timeout).await?;
        if embedding.is_empty() {
            return Err(StoreError::Embedding {
                source: crate::embedding::EmbeddingError::InvalidResponse {
                    reason: "provider returned an empty embedding".to_string(),
                },
            });
        }
        Ok(embedding)
    }

    /// Embeds `query_text` and persists a new entry with `usage_count = 0`.
    #[instrument(skip(self, topic, query_text, response), fields(category = %category, query_len = query_text.len()))]
    pub async fn store(
        &self,
        category: Category,
        topic: &str,
        query_text: &str,
        response: ResponsePayload,
        initial_confidence: f64,
    ) -> StoreResult<EntryId> {
        if !check_unit_interval(initial_confidence) {
            return Err(StoreError::InvalidConfidence {
                value: initial_confidence,
            });
        }
        if query_text.trim().is_empty() {
            return Err(StoreError::InvalidInput {
                reason: "query text must not be empty".to_string(),
            });
        }
        response
            .check_category(category)
            .map_err(|e| StoreError::InvalidInput {
                reason: e.to_string(),
            })?;

        let embedding = self.embed(query_text).await?;
        self.check_dim(embedding.len())?;

        let entry = KnowledgeEntry {
            id: EntryId::new(),
            category,
            topic: topic.to_string(),
            query_text: query_text.to_string(),
            response,
            embedding,
            confidence: initial_confidence,
            usage_count: 0,
            created_at: Utc::now(),
            last_used_at: None,
        };
        let id = entry.id;

        let _gate = self.write_gate.lock().await;
        self.backend.insert(entry).await?;

        info!(entry_id = %id, "Knowledge entry stored");
        Ok(id)
    }

    /// Semantic lookup restricted to `category`.
    #[instrument(skip(self, query_text), fields(category = %category, query_len = query_text.len()))]
    pub async fn search(
        &self,
        query_text: &str,
        category: Category,
        threshold: f32,
        limit: usize,
    ) -> StoreResult<Vec<ScoredEntry>> {
        if !threshold.is_finite() {
            return Err(StoreError::InvalidInput {
                reason: format!("threshold must be finite, got {}", threshold),
            });
        }
        if limit == 0 {
            return Err(StoreError::InvalidInput {
                reason: "limit must be > 0".to_string(),
            });
        }

        let embedding = self.embed(query_text).await?;

        match self.embedding_dim() {
            Some(expected) if expected != embedding.len() => {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
            None => {
                debug!("No entries stored yet, nothing to search");
                return Ok(Vec::new());
            }
        }

        let candidates = self
            .backend
            .candidates(category, self.config.candidate_window)
            .await?;
        let candidate_count = candidates.len();

        let results = rank_candidates(&embedding, candidates, threshold, limit)?;

        debug!(
            candidates = candidate_count,
            matches = results.len(),
            best = results.first().map(|r| r.similarity),
            "Search complete"
        );
        Ok(results)
    }

    /// Records a hit. Returns the new usage count, `None` if the entry vanished.
    #[instrument(skip(self), fields(entry_id = %id))]
    pub async fn increment_usage(&self, id: EntryId) -> StoreResult<Option<u64>> {
        let count = self.backend.increment_usage(id, Utc::now()).await?;
        if count.is_none() {
            debug!("Entry vanished before usage increment");
        }
        Ok(count)
    }

    /// Blends `feedback_score` into the entry's confidence. Returns the new
    /// confidence, `None` if the entry vanished.
    #[instrument(skip(self), fields(entry_id = %id))]
    pub async fn update_confidence(&self, id: EntryId, feedback_score: f64) -> StoreResult<Option<f64>> {
        if !check_unit_interval(feedback_score) {
            return Err(StoreError::InvalidFeedback {
                value: feedback_score,
            });
        }

        let confidence = self
            .backend
            .apply_feedback(id, feedback_score, CONFIDENCE_RETENTION)
            .await?;

        match confidence {
            Some(c) => debug!(confidence = c, "Confidence updated"),
            None => warn!("Feedback for unknown entry"),
        }
        Ok(confidence)
    }

    /// Deletes low-confidence entries and entries never used within `days_unused`.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, min_confidence: f64, days_unused: u32) -> StoreResult<u64> {
        if !check_unit_interval(min_confidence) {
            return Err(StoreError::InvalidConfidence {
                value: min_confidence,
            });
        }
        let unused_before = Utc::now() - TimeDelta::days(i64::from(days_unused));

        let _gate = self.write_gate.lock().await;
        let deleted = self.backend.cleanup(min_confidence, unused_before).await?;

        info!(deleted, "Cleanup complete");
        Ok(deleted)
    }

    pub async fn stats(&self) -> StoreResult<KnowledgeStats> {
        self.backend.stats(self.config.top_entries).await
    }

    /// Lexical lookup for diagnostics; every whitespace-separated term must match.
    ///
    /// Case folding is ASCII-only on every backend (SQLite's `LOWER` folds
    /// nothing else), so `Ödem` matches `ödem` only case-sensitively.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn full_text_search(&self, text: &str, limit: usize) -> StoreResult<Vec<EntrySummary>> {
        let terms: Vec<String> = text.split_whitespace().map(|t| t.to_ascii_lowercase()).collect();
        if terms.is_empty() {
            return Err(StoreError::InvalidInput {
                reason: "search text must not be empty".to_string(),
            });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.backend.full_text_search(&terms, limit).await
    }

    pub async fn get(&self, id: EntryId) -> StoreResult<Option<KnowledgeEntry>> {
        self.backend.get(id).await
    }

    /// Flushes backend state (snapshot for the memory backend).
    pub async fn flush(&self) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;
        self.backend.flush().await
    }
}
