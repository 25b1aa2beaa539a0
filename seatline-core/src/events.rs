use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreResult;

/// Lifecycle notifications handed to the delivery pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    Created {
        booking_id: Uuid,
        trip_id: Uuid,
        user_id: String,
        seat_ids: Vec<String>,
        expires_at: DateTime<Utc>,
    },
    Confirmed {
        booking_id: Uuid,
        user_id: String,
    },
    Cancelled {
        booking_id: Uuid,
        user_id: String,
        reason: String,
    },
    Expired {
        booking_id: Uuid,
        user_id: String,
    },
    /// Money arrived for a booking that had already been settled another way.
    PaymentAfterSettlement {
        booking_id: Uuid,
        user_id: String,
    },
}

impl BookingEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            BookingEvent::Created { .. } => "booking.created",
            BookingEvent::Confirmed { .. } => "booking.confirmed",
            BookingEvent::Cancelled { .. } => "booking.cancelled",
            BookingEvent::Expired { .. } => "booking.expired",
            BookingEvent::PaymentAfterSettlement { .. } => "booking.payment_after_settlement",
        }
    }

    pub fn booking_id(&self) -> Uuid {
        match self {
            BookingEvent::Created { booking_id, .. }
            | BookingEvent::Confirmed { booking_id, .. }
            | BookingEvent::Cancelled { booking_id, .. }
            | BookingEvent::Expired { booking_id, .. }
            | BookingEvent::PaymentAfterSettlement { booking_id, .. } => *booking_id,
        }
    }
}

#[async_trait]
pub trait BookingEventPublisher: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> CoreResult<()>;
}
