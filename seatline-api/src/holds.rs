use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use seatline_core::AcquireOutcome;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HoldSeatsRequest {
    pub session_id: String,
    pub seat_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HoldSeatsResponse {
    pub expires_at: DateTime<Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/{trip_id}/holds", post(hold_seats))
        .route("/v1/holds/{session_id}", delete(release_holds))
}

/// POST /v1/trips/{trip_id}/holds
/// Soft-locks seats for a selection session, all or nothing.
async fn hold_seats(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Json(req): Json<HoldSeatsRequest>,
) -> Result<Json<HoldSeatsResponse>, AppError> {
    match state.coordinator.hold_seats(trip_id, &req.seat_ids, &req.session_id).await? {
        AcquireOutcome::Acquired { expires_at } => {
            tracing::debug!("Session {} holds {} seat(s) on trip {}", req.session_id, req.seat_ids.len(), trip_id);
            Ok(Json(HoldSeatsResponse { expires_at }))
        }
        AcquireOutcome::Conflict(seat_ids) => Err(AppError::SeatsHeld(seat_ids)),
    }
}

/// DELETE /v1/holds/{session_id}
async fn release_holds(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let released = state.coordinator.release_holds(&session_id).await?;
    tracing::debug!("Released {} soft lock(s) for session {}", released, session_id);
    Ok(StatusCode::NO_CONTENT)
}
