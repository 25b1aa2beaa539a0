use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use seatline_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    /// Some of the requested seats are held by another session.
    #[error("seats are held by another session")]
    SeatsHeld(Vec<String>),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::SeatsHeld(seat_ids) => {
                let body = Json(json!({
                    "error": "seats are held by another session",
                    "seat_ids": seat_ids,
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Dependency unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Conflict(msg) => AppError::ConflictError(msg),
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::Transient(msg) => AppError::ServiceUnavailable(msg),
            CoreError::InvariantViolation(msg) => AppError::InternalServerError(format!("invariant violation: {}", msg)),
            CoreError::InternalError(msg) => AppError::InternalServerError(msg),
        }
    }
}
