use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Reserved,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Reserved => "reserved",
            SeatStatus::Booked => "booked",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "reserved" => Ok(SeatStatus::Reserved),
            "booked" => Ok(SeatStatus::Booked),
            other => Err(CoreError::InternalError(format!("unknown seat status '{}'", other))),
        }
    }
}

/// Authoritative state of one seat on one trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatInventoryRecord {
    pub trip_id: Uuid,
    pub seat_id: String,
    pub status: SeatStatus,
    pub holder_user_id: Option<String>,
    pub holder_booking_id: Option<Uuid>,
    pub held_until: Option<DateTime<Utc>>,
}

impl SeatInventoryRecord {
    pub fn available(trip_id: Uuid, seat_id: impl Into<String>) -> Self {
        Self {
            trip_id,
            seat_id: seat_id.into(),
            status: SeatStatus::Available,
            holder_user_id: None,
            holder_booking_id: None,
            held_until: None,
        }
    }

    pub fn is_held_by(&self, booking_id: Uuid) -> bool {
        self.holder_booking_id == Some(booking_id)
    }

    /// Holder fields must agree with the status.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            SeatStatus::Available => {
                self.holder_user_id.is_none()
                    && self.holder_booking_id.is_none()
                    && self.held_until.is_none()
            }
            SeatStatus::Reserved => self.holder_booking_id.is_some() && self.held_until.is_some(),
            SeatStatus::Booked => self.holder_booking_id.is_some() && self.held_until.is_none(),
        }
    }
}

/// Result of a conditional (compare-and-set) seat write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// The row did not match the expected state. Not a system error.
    Conflict,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }

    pub fn from_rows_affected(rows: u64) -> Self {
        if rows == 1 {
            TransitionOutcome::Applied
        } else {
            TransitionOutcome::Conflict
        }
    }
}

/// Per-seat inventory table. Every mutation is a single-row conditional update.
#[async_trait]
pub trait SeatInventoryStore: Send + Sync {
    /// Seeds `available` rows for a trip's seat map; existing rows are left untouched.
    async fn initialize_trip(&self, trip_id: Uuid, seat_ids: &[String]) -> CoreResult<u64>;

    /// `available -> reserved`, stamping holder fields and the absolute `held_until`.
    /// A deadline that is not in the future is a validation error.
    async fn try_reserve(
        &self,
        trip_id: Uuid,
        seat_id: &str,
        user_id: &str,
        booking_id: Uuid,
        held_until: DateTime<Utc>,
    ) -> CoreResult<TransitionOutcome>;

    /// `reserved (by booking_id) -> booked`, clearing `held_until`.
    async fn confirm(&self, trip_id: Uuid, seat_id: &str, booking_id: Uuid) -> CoreResult<TransitionOutcome>;

    /// `reserved (by booking_id) -> available`, clearing holder fields.
    async fn release(&self, trip_id: Uuid, seat_id: &str, booking_id: Uuid) -> CoreResult<TransitionOutcome>;

    async fn get(&self, trip_id: Uuid, seat_id: &str) -> CoreResult<Option<SeatInventoryRecord>>;

    async fn bulk_query_by_trip(&self, trip_id: Uuid) -> CoreResult<Vec<SeatInventoryRecord>>;
}
