use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Booking status in the lifecycle. Everything but `Pending` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "expired" => Ok(BookingStatus::Expired),
            other => Err(CoreError::InternalError(format!("unknown booking status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(CoreError::InternalError(format!("unknown payment status '{}'", other))),
        }
    }
}

/// The aggregate root. Never deleted; terminal bookings are kept for audit and refunds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub user_id: String,
    pub seat_ids: Vec<String>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Minor currency units.
    pub total_amount: i64,
    /// Payment deadline.
    pub expires_at: DateTime<Utc>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        trip_id: Uuid,
        user_id: String,
        seat_ids: Vec<String>,
        total_amount: i64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            user_id,
            seat_ids,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_amount,
            expires_at,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `confirmed` if and only if `paid`.
    pub fn is_consistent(&self) -> bool {
        (self.status == BookingStatus::Confirmed) == (self.payment_status == PaymentStatus::Paid)
    }

    /// Applies a transition in memory, mirroring what the repository writes.
    pub fn apply(&mut self, transition: &StatusTransition, now: DateTime<Utc>) {
        self.status = transition.to;
        if let Some(payment_status) = transition.payment_status {
            self.payment_status = payment_status;
        }
        if transition.reason.is_some() {
            self.cancel_reason = transition.reason.clone();
        }
        self.updated_at = now;
    }
}

/// A conditional `pending -> terminal` write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub to: BookingStatus,
    pub payment_status: Option<PaymentStatus>,
    pub reason: Option<String>,
}

impl StatusTransition {
    pub fn confirm() -> Self {
        Self { to: BookingStatus::Confirmed, payment_status: Some(PaymentStatus::Paid), reason: None }
    }

    pub fn payment_failed(reason: impl Into<String>) -> Self {
        Self {
            to: BookingStatus::Cancelled,
            payment_status: Some(PaymentStatus::Failed),
            reason: Some(reason.into()),
        }
    }

    pub fn cancel(reason: impl Into<String>) -> Self {
        Self { to: BookingStatus::Cancelled, payment_status: None, reason: Some(reason.into()) }
    }

    pub fn expire() -> Self {
        Self { to: BookingStatus::Expired, payment_status: None, reason: None }
    }
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    /// `UPDATE ... WHERE id = ? AND status = 'pending'`.
    /// Returns `true` only for the single caller whose write matched.
    async fn transition_from_pending(
        &self,
        id: Uuid,
        transition: &StatusTransition,
        now: DateTime<Utc>,
    ) -> CoreResult<bool>;
}
