//! HTTP client helpers for tests.

use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_TIMEOUT_SECS);

pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
}

/// Status, `X-Lumen-Source` / `X-Lumen-Status` headers and JSON body of one exchange.
#[derive(Debug)]
pub struct Exchange {
    pub status: u16,
    pub source: Option<String>,
    pub lumen_status: Option<String>,
    pub body: Value,
}

impl Exchange {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TestClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url, path)
    }

    async fn exchange(resp: reqwest::Response) -> Result<Exchange, TestClientError> {
        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        };
        let source = header("x-lumen-source");
        let lumen_status = header("x-lumen-status");
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(Exchange {
            status,
            source,
            lumen_status,
            body,
        })
    }

    pub async fn respond(
        &self,
        query: &str,
        category: &str,
        context: Value,
    ) -> Result<Exchange, TestClientError> {
        let resp = self
            .client
            .post(self.url("/v1/responses"))
            .json(&serde_json::json!({
                "query": query,
                "category": category,
                "context": context,
            }))
            .send()
            .await?;
        Self::exchange(resp).await
    }

    pub async fn post_raw(&self, path: &str, body: Value) -> Result<Exchange, TestClientError> {
        let resp = self.client.post(self.url(path)).json(&body).send().await?;
        Self::exchange(resp).await
    }

    pub async fn feedback(
        &self,
        entry_id: &Value,
        helpful: bool,
        rating: Option<u8>,
    ) -> Result<Exchange, TestClientError> {
        let mut body = serde_json::json!({ "entryId": entry_id, "helpful": helpful });
        if let Some(rating) = rating {
            body["rating"] = rating.into();
        }
        self.post_raw("/v1/feedback", body).await
    }

    pub async fn stats(&self) -> Result<Exchange, TestClientError> {
        let resp = self.client.get(self.url("/v1/stats")).send().await?;
        Self::exchange(resp).await
    }

    pub async fn maintenance(&self) -> Result<Exchange, TestClientError> {
        let resp = self.client.post(self.url("/v1/maintenance")).send().await?;
        Self::exchange(resp).await
    }

    pub async fn search(&self, q: &str, limit: Option<usize>) -> Result<Exchange, TestClientError> {
        let mut request = self.client.get(self.url("/v1/knowledge/search")).query(&[("q", q)]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        Self::exchange(request.send().await?).await
    }

    pub async fn health(&self) -> Result<Exchange, TestClientError> {
        let resp = self.client.get(self.url("/healthz")).send().await?;
        Self::exchange(resp).await
    }
}
