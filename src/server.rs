//! HTTP search API.
//!
//! `POST /api/search` takes `{"query": "...", "limit": 5}` and answers
//! `{"results": [...], "count": n, "query": "..."}`. Failures surface as a
//! small stable error body; raw provider/store messages never reach the
//! client. A malformed payload is rejected before the engine is touched,
//! with the same `{error, message}` body as every other failure.
//!
//! This module is only available when the `server` feature is enabled.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::document::SearchResult;
use crate::error::SearchError;
use crate::query::QueryEngine;

/// Search request body.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Maximum result count; clamped by the engine. Falls back to the
    /// configured `top_k` when omitted.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Search response body.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Ranked results, best first.
    pub results: Vec<SearchResult>,
    /// Number of results returned.
    pub count: usize,
    /// The query as the engine saw it.
    pub query: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// [`SearchError`] mapped onto HTTP statuses with sanitized bodies.
struct ApiError(SearchError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self.0 {
            SearchError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation", msg.clone())
            }
            SearchError::ProviderUnavailable { .. } => (
                StatusCode::BAD_GATEWAY,
                "provider_unavailable",
                "search is temporarily unavailable".to_string(),
            ),
            SearchError::StoreUnavailable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "search is temporarily unavailable".to_string(),
            ),
            SearchError::DimensionMismatch { .. } | SearchError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal search error".to_string(),
            ),
        };
        if status.is_server_error() {
            error!(error = %self.0, "search request failed");
        }
        (status, Json(ErrorBody { error: kind, message })).into_response()
    }
}

/// Handler state: the engine plus the limit used when the client omits one.
#[derive(Clone)]
struct AppState {
    engine: Arc<QueryEngine>,
    default_limit: usize,
}

/// Build the API router over a shared query engine.
///
/// `default_limit` is the configured `top_k`, applied when a request does
/// not carry its own `limit`.
pub fn router(engine: Arc<QueryEngine>, default_limit: usize) -> Router {
    Router::new()
        .route("/api/search", post(search))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { engine, default_limit })
}

async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError(SearchError::Validation(rejection.body_text())))?;
    let limit = request.limit.unwrap_or(state.default_limit);
    let results = state.engine.search(&request.query, limit).await.map_err(ApiError)?;
    Ok(Json(SearchResponse {
        count: results.len(),
        query: request.query,
        results,
    }))
}

async fn healthz() -> &'static str {
    "ok"
}
