use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::FaqError;

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400, request parsed but unusable
    BadRequest(String),
    /// 404, nothing in the store to answer with
    NotFound(String),
    /// 500, embedding or store failure
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => {
                error!("Request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<FaqError> for ApiError {
    fn from(err: FaqError) -> Self {
        Self::Internal(err.to_string())
    }
}
