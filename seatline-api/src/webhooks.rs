use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use seatline_core::BookingStatus;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum PaymentEventKind {
    #[serde(rename = "payment.succeeded")]
    Succeeded,
    #[serde(rename = "payment.failed")]
    Failed,
}

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub booking_id: Uuid,
    pub event: PaymentEventKind,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    /// `false` when the booking had already been settled by another event.
    pub applied: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
/// Receive payment outcomes from the payment provider. Redeliveries are safe.
async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<WebhookAck>, AppError> {
    tracing::info!("Received webhook: {:?} for booking {}", payload.event, payload.booking_id);

    let settlement = match payload.event {
        PaymentEventKind::Succeeded => state.coordinator.confirm_payment(payload.booking_id).await?,
        PaymentEventKind::Failed => {
            let reason = payload.reason.as_deref().unwrap_or("payment failed");
            state.coordinator.fail_payment(payload.booking_id, reason).await?
        }
    };

    Ok(Json(WebhookAck {
        booking_id: payload.booking_id,
        status: settlement.booking.status,
        applied: settlement.applied,
    }))
}
