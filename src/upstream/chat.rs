//! Upstream provider backed by the `genai` multi-provider client.

use std::time::Duration;

use async_trait::async_trait;
use genai::Client;
use genai::chat::{ChatMessage, ChatRequest};
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};

use crate::payload::{ClinicalPearls, Interpretation, TeachingQuestions};

use super::error::{UpstreamError, UpstreamResult};
use super::prompts;
use super::provider::{
    OP_INTERPRETATION, OP_PEARLS, OP_QUESTIONS, ReportType, RequestContext, UpstreamProvider,
};

pub const DEFAULT_UPSTREAM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct GenaiUpstream {
    client: Client,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for GenaiUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiUpstream")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GenaiUpstream {
    /// Uses `Client::default()`, which resolves provider keys from the environment.
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(Client::default(), model, timeout)
    }

    pub fn with_client(client: Client, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        system: &str,
        user: String,
    ) -> UpstreamResult<T> {
        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)]);

        let response =
            match tokio::time::timeout(self.timeout, self.client.exec_chat(&self.model, request, None))
                .await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    error!(operation, model = %self.model, error = %e, "Upstream request failed");
                    return Err(UpstreamError::RequestFailed {
                        operation,
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    error!(operation, model = %self.model, "Upstream request timed out");
                    return Err(UpstreamError::Timeout {
                        operation,
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
            };

        let text = response
            .first_text()
            .filter(|t| !t.trim().is_empty())
            .ok_or(UpstreamError::EmptyResponse { operation })?;

        debug!(operation, reply_len = text.len(), "Upstream reply received");
        parse_reply(operation, text)
    }
}

/// Parses the JSON object embedded in a model reply.
pub fn parse_reply<T: DeserializeOwned>(operation: &'static str, reply: &str) -> UpstreamResult<T> {
    let json = prompts::extract_json_object(reply).ok_or_else(|| UpstreamError::InvalidResponse {
        operation,
        reason: "reply contains no JSON object".to_string(),
    })?;

    serde_json::from_str(json).map_err(|e| UpstreamError::InvalidResponse {
        operation,
        reason: e.to_string(),
    })
}

#[async_trait]
impl UpstreamProvider for GenaiUpstream {
    #[instrument(skip(self, query, context), fields(model = %self.model, query_len = query.len()))]
    async fn generate_interpretation(
        &self,
        query: &str,
        context: &RequestContext,
    ) -> UpstreamResult<Interpretation> {
        self.complete_json(
            OP_INTERPRETATION,
            prompts::INTERPRETATION_SYSTEM,
            prompts::interpretation_user(query, context),
        )
        .await
    }

    #[instrument(skip(self, interpretation), fields(model = %self.model))]
    async fn generate_pearls(
        &self,
        interpretation: &str,
        report_type: ReportType,
    ) -> UpstreamResult<ClinicalPearls> {
        self.complete_json(
            OP_PEARLS,
            prompts::PEARLS_SYSTEM,
            prompts::pearls_user(interpretation, report_type),
        )
        .await
    }

    #[instrument(skip(self, interpretation), fields(model = %self.model))]
    async fn generate_questions(
        &self,
        interpretation: &str,
        report_type: ReportType,
    ) -> UpstreamResult<TeachingQuestions> {
        self.complete_json(
            OP_QUESTIONS,
            prompts::QUESTIONS_SYSTEM,
            prompts::questions_user(interpretation, report_type),
        )
        .await
    }

    fn name(&self) -> &str {
        "genai"
    }
}
