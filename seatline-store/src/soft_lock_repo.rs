use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use seatline_core::{AcquireOutcome, Clock, CoreError, CoreResult, SoftLock, SoftLockStore};

/// `soft_locks` table, one row per (trip, seat) while a selection hold is live.
pub struct PgSoftLockStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgSoftLockStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[derive(sqlx::FromRow)]
struct SoftLockRow {
    trip_id: Uuid,
    seat_id: String,
    session_id: String,
    locked_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SoftLockRow> for SoftLock {
    fn from(row: SoftLockRow) -> Self {
        SoftLock {
            trip_id: row.trip_id,
            seat_id: row.seat_id,
            session_id: row.session_id,
            locked_at: row.locked_at,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait]
impl SoftLockStore for PgSoftLockStore {
    async fn acquire(
        &self,
        trip_id: Uuid,
        seat_ids: &[String],
        session_id: &str,
        ttl: Duration,
    ) -> CoreResult<AcquireOutcome> {
        // ON CONFLICT cannot touch the same row twice in one statement
        let requested: Vec<String> = seat_ids.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        if requested.is_empty() {
            return Err(CoreError::ValidationError("at least one seat is required".to_string()));
        }

        let now = self.clock.now();
        let expires_at = now + ttl;

        let mut tx = self.pool.begin().await.map_err(CoreError::transient)?;

        // A row is taken over only if it is ours already or has lapsed.
        let acquired: Vec<String> = sqlx::query_scalar(
            r#"
            INSERT INTO soft_locks (trip_id, seat_id, session_id, locked_at, expires_at)
            SELECT $1, seat_id, $3, $4, $5 FROM UNNEST($2::text[]) AS seat_id
            ON CONFLICT (trip_id, seat_id) DO UPDATE
            SET session_id = EXCLUDED.session_id,
                locked_at = EXCLUDED.locked_at,
                expires_at = EXCLUDED.expires_at
            WHERE soft_locks.session_id = EXCLUDED.session_id
               OR soft_locks.expires_at <= EXCLUDED.locked_at
            RETURNING seat_id
            "#,
        )
        .bind(trip_id)
        .bind(&requested)
        .bind(session_id)
        .bind(now)
        .bind(expires_at)
        .fetch_all(&mut *tx)
        .await
        .map_err(CoreError::transient)?;

        if acquired.len() < requested.len() {
            tx.rollback().await.map_err(CoreError::transient)?;
            let conflicts: Vec<String> = requested
                .into_iter()
                .filter(|seat| !acquired.contains(seat))
                .collect();
            debug!("Soft lock for session {} on trip {} blocked by {:?}", session_id, trip_id, conflicts);
            return Ok(AcquireOutcome::Conflict(conflicts));
        }

        tx.commit().await.map_err(CoreError::transient)?;
        Ok(AcquireOutcome::Acquired { expires_at })
    }

    async fn release(&self, session_id: &str) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM soft_locks WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(CoreError::transient)?;

        Ok(result.rows_affected())
    }

    async fn active_lock(&self, trip_id: Uuid, seat_id: &str) -> CoreResult<Option<SoftLock>> {
        let row: Option<SoftLockRow> = sqlx::query_as(
            r#"
            SELECT trip_id, seat_id, session_id, locked_at, expires_at
            FROM soft_locks WHERE trip_id = $1 AND seat_id = $2 AND expires_at > $3
            "#,
        )
        .bind(trip_id)
        .bind(seat_id)
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        Ok(row.map(SoftLock::from))
    }

    async fn sweep_expired(&self) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM soft_locks WHERE expires_at <= $1")
            .bind(self.clock.now())
            .execute(&self.pool)
            .await
            .map_err(CoreError::transient)?;

        Ok(result.rows_affected())
    }
}
