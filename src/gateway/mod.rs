//! HTTP gateway (Axum) in front of [`crate::responder::SmartResponder`].
//!
//! This module is primarily used by the `lumen` server binary.

pub mod error;
pub mod handler;
pub mod state;


use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use error::{ErrorResponse, GatewayError, status_for};
pub use handler::{
    feedback_handler, knowledge_search_handler, maintenance_handler, responses_handler,
    stats_handler,
};
pub use state::HandlerState;

use crate::knowledge::KnowledgeBackend;

/// Response header naming where a payload came from (`cache` / `upstream`).
pub const LUMEN_SOURCE_HEADER: &str = "X-Lumen-Source";
/// Response header carrying a short machine-readable status.
pub const LUMEN_STATUS_HEADER: &str = "X-Lumen-Status";
pub const LUMEN_STATUS_HEALTHY: &str = "healthy";

pub fn create_router_with_state<B: KnowledgeBackend>(state: HandlerState<B>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/v1/responses", post(responses_handler))
        .route("/v1/feedback", post(feedback_handler))
        .route("/v1/stats", get(stats_handler))
        .route("/v1/maintenance", post(maintenance_handler))
        .route("/v1/knowledge/search", get(knowledge_search_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` resolves, drains in-flight requests, then flushes
/// the knowledge store once more.
///
/// Requests that finish during the drain may still write, so the final flush
/// runs only after `axum::serve` has returned.
pub async fn serve_until_shutdown<B, F>(
    listener: TcpListener,
    state: HandlerState<B>,
    shutdown: F,
) -> std::io::Result<()>
where
    B: KnowledgeBackend,
    F: Future<Output = ()> + Send + 'static,
{
    let responder = state.responder.clone();
    let app = create_router_with_state(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    match responder.flush().await {
        Ok(()) => tracing::info!("Knowledge store flushed after drain"),
        Err(e) => tracing::error!(error = %e, "Final knowledge store flush failed"),
    }
    Ok(())
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        LUMEN_STATUS_HEADER,
        HeaderValue::from_static(LUMEN_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}
