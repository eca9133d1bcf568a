use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::EmbeddingError;
use super::provider::Embedder;
use super::stub::StubEmbedder;

pub const MOCK_MODEL_NAME: &str = "mock-embedder";

/// Scriptable embedder for tests.
///
/// Texts registered with [`MockEmbedder::set_vector`] return that exact vector;
/// anything else falls back to a deterministic stub vector.
pub struct MockEmbedder {
    vectors: RwLock<HashMap<String, Vec<f32>>>,
    fallback: StubEmbedder,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: RwLock<Option<Duration>>,
}

impl MockEmbedder {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            vectors: RwLock::new(HashMap::new()),
            fallback: StubEmbedder::new(embedding_dim),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: RwLock::new(None),
        }
    }

    pub fn set_vector(&self, text: impl Into<String>, vector: Vec<f32>) {
        self.vectors.write().insert(text.into(), vector);
    }

    pub fn with_vector(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.set_vector(text, vector);
        self
    }

    /// Makes every subsequent call fail with [`EmbeddingError::RequestFailed`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Adds latency before every call returns.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::AcqRel);

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::Acquire) {
            return Err(EmbeddingError::RequestFailed {
                reason: "mock embedder set to fail".to_string(),
            });
        }

        if let Some(vector) = self.vectors.read().get(text) {
            return Ok(vector.clone());
        }

        Ok(self.fallback.embed_sync(text))
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.fallback.embedding_dim())
    }

    fn model(&self) -> &str {
        MOCK_MODEL_NAME
    }
}
