use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AppState;
use super::error::ApiError;
use crate::query::{FaqAnswer, query_faq};

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub const NO_MATCH_DETAIL: &str = "No semantic match found";

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /
#[inline]
pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

/// GET /health
#[inline]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// POST /query
#[inline]
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<FaqAnswer>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    debug!("Query: {:?}", question);
    let answer = query_faq(&state.store, &state.embedder, question, state.top_k).await?;

    if !answer.is_match() {
        return Err(ApiError::NotFound(NO_MATCH_DETAIL.to_string()));
    }

    Ok(Json(answer))
}
