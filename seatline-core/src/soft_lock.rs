use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreResult;

/// Advisory, session-scoped hold taken while a customer is still selecting seats.
///
/// Soft locks carry no user identity and grant no authority: the seat inventory
/// reservation made at booking time is the only conflict check that counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoftLock {
    pub trip_id: Uuid,
    pub seat_id: String,
    pub session_id: String,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SoftLock {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { expires_at: DateTime<Utc> },
    /// Seats actively locked by another session. Nothing was written.
    Conflict(Vec<String>),
}

#[async_trait]
pub trait SoftLockStore: Send + Sync {
    /// All-or-nothing. Seats already held by `session_id` are refreshed.
    async fn acquire(
        &self,
        trip_id: Uuid,
        seat_ids: &[String],
        session_id: &str,
        ttl: Duration,
    ) -> CoreResult<AcquireOutcome>;

    /// Drops every lock owned by the session. Returns how many were removed.
    async fn release(&self, session_id: &str) -> CoreResult<u64>;

    /// The unexpired lock on a seat, if any.
    async fn active_lock(&self, trip_id: Uuid, seat_id: &str) -> CoreResult<Option<SoftLock>>;

    async fn is_held(&self, trip_id: Uuid, seat_id: &str) -> CoreResult<bool> {
        Ok(self.active_lock(trip_id, seat_id).await?.is_some())
    }

    /// Deletes expired rows. Cleanup only; reads already ignore expired locks.
    async fn sweep_expired(&self) -> CoreResult<u64>;
}
