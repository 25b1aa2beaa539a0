use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use seatline_core::SeatInventoryRecord;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/trips/{trip_id}/seats", get(seat_map))
}

/// GET /v1/trips/{trip_id}/seats
async fn seat_map(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Vec<SeatInventoryRecord>>, AppError> {
    let seats = state.coordinator.seat_map(trip_id).await?;
    if seats.is_empty() {
        return Err(AppError::NotFoundError(format!("trip {} has no seat map", trip_id)));
    }
    Ok(Json(seats))
}
