//! Maps `EngineError` (and the lower-level errors that feed into it) onto
//! HTTP responses, via [`EngineError::status_hint`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine::EngineError;
use serde_json::json;

pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl From<db::DbError> for ApiError {
    fn from(e: db::DbError) -> Self {
        ApiError(EngineError::from(e))
    }
}

impl From<state::StateError> for ApiError {
    fn from(e: state::StateError) -> Self {
        ApiError(EngineError::from(e))
    }
}

/// Wraps a raw `String` reason (e.g. a row->domain `TryFrom` failure) as an
/// internal error, matching how the `engine` crate itself treats those.
pub fn internal(message: impl Into<String>) -> ApiError {
    ApiError(EngineError::Internal(message.into()))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.status_hint() {
            "bad_request" => StatusCode::BAD_REQUEST,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "unprocessable" => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self.0 {
            EngineError::ValidationFailed(errors) => json!({
                "error": "validation_failed",
                "errors": errors,
            }),
            other => json!({
                "error": status.canonical_reason().unwrap_or("error"),
                "message": other.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
