//! OpenAI-compatible `/v1/embeddings` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::error::EmbeddingError;
use super::provider::Embedder;

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
/// Configuration for [`HttpEmbedder`].
pub struct HttpEmbedderConfig {
    /// Base URL (without the `/v1/embeddings` suffix).
    pub base_url: String,
    /// Bearer token, if the endpoint needs one.
    pub api_key: Option<String>,
    /// Embedding model name.
    pub model: String,
    /// Requested output dimension (sent as `dimensions` when set).
    pub dimensions: Option<usize>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpEmbedderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EMBEDDING_URL.to_string(),
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: None,
            timeout: DEFAULT_EMBEDDING_TIMEOUT,
        }
    }
}

impl HttpEmbedderConfig {
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.base_url.trim().is_empty() {
            return Err(EmbeddingError::InvalidConfig {
                reason: "base_url must not be empty".to_string(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(EmbeddingError::InvalidConfig {
                reason: "model must not be empty".to_string(),
            });
        }
        if self.dimensions == Some(0) {
            return Err(EmbeddingError::InvalidConfig {
                reason: "dimensions must be > 0".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(EmbeddingError::InvalidConfig {
                reason: "timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedder backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: HttpEmbedderConfig,
    url: String,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("url", &self.url)
            .field("model", &self.config.model)
            .field("dimensions", &self.config.dimensions)
            .finish_non_exhaustive()
    }
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::InvalidConfig {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        let url = config.embeddings_url();
        Ok(Self {
            client,
            config,
            url,
        })
    }

    pub fn config(&self) -> &HttpEmbedderConfig {
        &self.config
    }

    fn map_transport_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            }
        } else {
            EmbeddingError::RequestFailed {
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput {
                reason: "text must not be empty".to_string(),
            });
        }

        let mut body = serde_json::json!({
            "model": self.config.model,
            "input": text,
        });
        if let Some(dims) = self.config.dimensions {
            body["dimensions"] = serde_json::json!(dims);
        }

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        debug!(text_len = text.len(), model = %self.config.model, "Requesting embedding");

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = %status, "Embedding endpoint returned an error");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => {
                    EmbeddingError::QuotaExceeded { reason: detail }
                }
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    EmbeddingError::InvalidInput { reason: detail }
                }
                _ => EmbeddingError::RequestFailed {
                    reason: format!("HTTP {}: {}", status, detail),
                },
            });
        }

        let parsed: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        let embedding = parsed
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse {
                reason: "response contained no embeddings".to_string(),
            })?;

        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse {
                reason: "embedding is empty".to_string(),
            });
        }

        if let Some(dims) = self.config.dimensions
            && embedding.len() != dims
        {
            return Err(EmbeddingError::InvalidResponse {
                reason: format!("expected {} dimensions, got {}", dims, embedding.len()),
            });
        }

        Ok(embedding)
    }

    fn dimension(&self) -> Option<usize> {
        self.config.dimensions
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
