use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use seatline_core::{Booking, CoreError, CoreResult};

/// Tunables applied by the coordinator to every booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPolicy {
    /// How long a pending booking holds its seats awaiting payment.
    pub payment_window: Duration,
    pub soft_lock_ttl: Duration,
    pub max_seats_per_booking: usize,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            payment_window: Duration::minutes(15),
            soft_lock_ttl: Duration::minutes(10),
            max_seats_per_booking: 10,
        }
    }
}

impl BookingPolicy {
    /// A zero window would expire bookings the moment they are created.
    pub fn new(payment_window: Duration, soft_lock_ttl: Duration, max_seats_per_booking: usize) -> CoreResult<Self> {
        if payment_window <= Duration::zero() {
            return Err(CoreError::ValidationError("payment window must be positive".to_string()));
        }
        if soft_lock_ttl <= Duration::zero() {
            return Err(CoreError::ValidationError("soft lock TTL must be positive".to_string()));
        }
        if max_seats_per_booking == 0 {
            return Err(CoreError::ValidationError("max seats per booking must be at least 1".to_string()));
        }
        Ok(Self { payment_window, soft_lock_ttl, max_seats_per_booking })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub trip_id: Uuid,
    pub seat_ids: Vec<String>,
    pub user_id: String,
    pub total_amount: i64,
    /// Selection session whose soft locks this booking converts.
    pub session_id: Option<String>,
}

/// Result of a settlement event.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    /// The booking as it stands after the event.
    pub booking: Booking,
    /// `false` when another event had already settled the booking.
    pub applied: bool,
}
