use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use seatline_booking::CreateBookingRequest;
use seatline_core::Booking;

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
    pub trip_id: Uuid,
    pub seat_ids: Vec<String>,
    pub total_amount: i64,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingBody {
    pub reason: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Mounted behind `customer_auth_middleware`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(body): Json<CreateBookingBody>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .coordinator
        .create_booking(CreateBookingRequest {
            trip_id: body.trip_id,
            seat_ids: body.seat_ids,
            user_id: claims.sub,
            total_amount: body.total_amount,
            session_id: body.session_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = owned_booking(&state, &claims, id).await?;
    Ok(Json(booking))
}

/// POST /v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBookingBody>,
) -> Result<Json<Booking>, AppError> {
    owned_booking(&state, &claims, id).await?;

    let reason = body.reason.unwrap_or_else(|| "cancelled by customer".to_string());
    let settlement = state.coordinator.cancel_booking(id, &reason).await?;
    Ok(Json(settlement.booking))
}

// Other customers' bookings are reported as missing rather than forbidden
async fn owned_booking(state: &AppState, claims: &CustomerClaims, id: Uuid) -> Result<Booking, AppError> {
    let booking = state.coordinator.get_booking(id).await?;
    if booking.user_id != claims.sub {
        return Err(AppError::NotFoundError(format!("booking {}", id)));
    }
    Ok(booking)
}
