//! In-process memoization of embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use moka::sync::Cache;
use tracing::debug;

use super::error::EmbeddingError;
use super::provider::Embedder;
use crate::hashing::hash_model_query;

pub const DEFAULT_MEMO_CAPACITY: u64 = 10_000;

/// Wraps another [`Embedder`] and remembers its successful outputs.
///
/// Keys are scoped to the inner model so a model swap never serves stale vectors.
/// Failures are never cached.
pub struct MemoEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Cache<[u8; 32], Arc<Vec<f32>>>,
}

impl std::fmt::Debug for MemoEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoEmbedder")
            .field("model", &self.inner.model())
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl MemoEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(capacity),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

#[async_trait]
impl Embedder for MemoEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = hash_model_query(self.inner.model(), text);

        if let Some(hit) = self.cache.get(&key) {
            debug!(text_len = text.len(), "Embedding memo hit");
            return Ok(hit.as_ref().clone());
        }

        let embedding = self.inner.embed(text).await?;
        self.cache.insert(key, Arc::new(embedding.clone()));
        Ok(embedding)
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
