use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// GET /metrics
pub async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let encoder = TextEncoder::new();
    let families = state.registry.gather();
    let mut buf = Vec::new();
    encoder
        .encode(&families, &mut buf)
        .map_err(|e| AppError::InternalServerError(format!("metrics encode error: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], buf))
}
