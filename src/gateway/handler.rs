use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::knowledge::{Category, EntryId, KnowledgeBackend};
use crate::upstream::RequestContext;

use super::error::GatewayError;
use super::state::HandlerState;
use super::{LUMEN_SOURCE_HEADER, LUMEN_STATUS_HEADER};

/// Results returned by `/v1/knowledge/search` when `limit` is absent.
pub const DEFAULT_SEARCH_RESULTS: usize = 20;
pub const MAX_SEARCH_RESULTS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResponseRequest {
    pub query: String,
    pub category: Category,
    #[serde(default)]
    pub context: RequestContext,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FeedbackRequest {
    pub entry_id: EntryId,
    pub helpful: bool,
    #[serde(default)]
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub entry_id: EntryId,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<usize>,
}

/// Parses a JSON body, reporting schema problems as 400s instead of axum's 422.
fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, GatewayError> {
    serde_json::from_value(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request schema: {}", e)))
}

#[instrument(skip(state, body), fields(category = tracing::field::Empty))]
pub async fn responses_handler<B: KnowledgeBackend>(
    State(state): State<HandlerState<B>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let request: ResponseRequest = parse_body(body)?;
    tracing::Span::current().record("category", request.category.as_str());

    let outcome = state
        .responder
        .get_response_within(
            &request.query,
            request.category,
            &request.context,
            state.request_timeout,
        )
        .await?;

    debug!(source = %outcome.source, entry_id = %outcome.entry_id, "Responding");

    let mut headers = HeaderMap::new();
    headers.insert(
        LUMEN_SOURCE_HEADER,
        HeaderValue::from_static(outcome.source.as_str()),
    );

    Ok((StatusCode::OK, headers, Json(outcome)).into_response())
}

#[instrument(skip(state, body))]
pub async fn feedback_handler<B: KnowledgeBackend>(
    State(state): State<HandlerState<B>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<FeedbackResponse>, GatewayError> {
    let request: FeedbackRequest = parse_body(body)?;

    let confidence = state
        .responder
        .submit_feedback(request.entry_id, request.helpful, request.rating)
        .await?;

    Ok(Json(FeedbackResponse {
        entry_id: request.entry_id,
        confidence,
    }))
}

#[instrument(skip(state))]
pub async fn stats_handler<B: KnowledgeBackend>(
    State(state): State<HandlerState<B>>,
) -> Result<Response, GatewayError> {
    let stats = state.responder.get_stats().await?;
    Ok(Json(stats).into_response())
}

/// Always 200; failures are reported inside the body.
#[instrument(skip(state))]
pub async fn maintenance_handler<B: KnowledgeBackend>(
    State(state): State<HandlerState<B>>,
) -> Response {
    let report = state.responder.perform_maintenance().await;

    let mut headers = HeaderMap::new();
    let status = if report.is_clean() { "ok" } else { "partial" };
    headers.insert(LUMEN_STATUS_HEADER, HeaderValue::from_static(status));

    (StatusCode::OK, headers, Json(report)).into_response()
}

#[instrument(skip(state, params), fields(q_len = params.q.len()))]
pub async fn knowledge_search_handler<B: KnowledgeBackend>(
    State(state): State<HandlerState<B>>,
    Query(params): Query<SearchParams>,
) -> Result<Response, GatewayError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_RESULTS)
        .min(MAX_SEARCH_RESULTS);

    let entries = state.responder.search_knowledge(&params.q, limit).await?;
    Ok(Json(entries).into_response())
}
