use std::time::Duration;

use async_trait::async_trait;

use super::error::EmbeddingError;

#[async_trait]
/// Turns text into a fixed-length vector.
pub trait Embedder: Send + Sync {
    /// Embeds a single piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Output dimension, when known before the first call.
    fn dimension(&self) -> Option<usize>;

    /// Model identifier (used for logging and memo scoping).
    fn model(&self) -> &str;
}

/// Runs [`Embedder::embed`] with a hard deadline.
///
/// Dropping the inner future on expiry cancels the in-flight request.
pub async fn embed_with_timeout(
    embedder: &dyn Embedder,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>, EmbeddingError> {
    match tokio::time::timeout(timeout, embedder.embed(text)).await {
        Ok(result) => result,
        Err(_) => Err(EmbeddingError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
