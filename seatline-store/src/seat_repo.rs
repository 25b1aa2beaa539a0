use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use seatline_core::{
    Clock, CoreError, CoreResult, SeatInventoryRecord, SeatInventoryStore, TransitionOutcome,
};

/// `seat_inventory` table. Each mutation is one `UPDATE ... WHERE status = <expected>`;
/// Postgres row locking guarantees at most one winner per seat.
pub struct PgSeatInventoryStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgSeatInventoryStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    trip_id: Uuid,
    seat_id: String,
    status: String,
    holder_user_id: Option<String>,
    holder_booking_id: Option<Uuid>,
    held_until: Option<DateTime<Utc>>,
}

impl TryFrom<SeatRow> for SeatInventoryRecord {
    type Error = CoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(SeatInventoryRecord {
            trip_id: row.trip_id,
            seat_id: row.seat_id,
            status: row.status.parse()?,
            holder_user_id: row.holder_user_id,
            holder_booking_id: row.holder_booking_id,
            held_until: row.held_until,
        })
    }
}

#[async_trait]
impl SeatInventoryStore for PgSeatInventoryStore {
    async fn initialize_trip(&self, trip_id: Uuid, seat_ids: &[String]) -> CoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO seat_inventory (trip_id, seat_id, status, updated_at)
            SELECT $1, seat_id, 'available', $3 FROM UNNEST($2::text[]) AS seat_id
            ON CONFLICT (trip_id, seat_id) DO NOTHING
            "#,
        )
        .bind(trip_id)
        .bind(seat_ids)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        Ok(result.rows_affected())
    }

    async fn try_reserve(
        &self,
        trip_id: Uuid,
        seat_id: &str,
        user_id: &str,
        booking_id: Uuid,
        held_until: DateTime<Utc>,
    ) -> CoreResult<TransitionOutcome> {
        let now = self.clock.now();
        if held_until <= now {
            return Err(CoreError::ValidationError(format!("hold deadline {} is not in the future", held_until)));
        }
        let result = sqlx::query(
            r#"
            UPDATE seat_inventory
            SET status = 'reserved', holder_user_id = $3, holder_booking_id = $4,
                held_until = $5, updated_at = $6
            WHERE trip_id = $1 AND seat_id = $2 AND status = 'available'
            "#,
        )
        .bind(trip_id)
        .bind(seat_id)
        .bind(user_id)
        .bind(booking_id)
        .bind(held_until)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        Ok(TransitionOutcome::from_rows_affected(result.rows_affected()))
    }

    async fn confirm(&self, trip_id: Uuid, seat_id: &str, booking_id: Uuid) -> CoreResult<TransitionOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE seat_inventory
            SET status = 'booked', held_until = NULL, updated_at = $4
            WHERE trip_id = $1 AND seat_id = $2 AND status = 'reserved' AND holder_booking_id = $3
            "#,
        )
        .bind(trip_id)
        .bind(seat_id)
        .bind(booking_id)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        Ok(TransitionOutcome::from_rows_affected(result.rows_affected()))
    }

    async fn release(&self, trip_id: Uuid, seat_id: &str, booking_id: Uuid) -> CoreResult<TransitionOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE seat_inventory
            SET status = 'available', holder_user_id = NULL, holder_booking_id = NULL,
                held_until = NULL, updated_at = $4
            WHERE trip_id = $1 AND seat_id = $2 AND status = 'reserved' AND holder_booking_id = $3
            "#,
        )
        .bind(trip_id)
        .bind(seat_id)
        .bind(booking_id)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        Ok(TransitionOutcome::from_rows_affected(result.rows_affected()))
    }

    async fn get(&self, trip_id: Uuid, seat_id: &str) -> CoreResult<Option<SeatInventoryRecord>> {
        let row: Option<SeatRow> = sqlx::query_as(
            r#"
            SELECT trip_id, seat_id, status, holder_user_id, holder_booking_id, held_until
            FROM seat_inventory WHERE trip_id = $1 AND seat_id = $2
            "#,
        )
        .bind(trip_id)
        .bind(seat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        row.map(SeatInventoryRecord::try_from).transpose()
    }

    async fn bulk_query_by_trip(&self, trip_id: Uuid) -> CoreResult<Vec<SeatInventoryRecord>> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            r#"
            SELECT trip_id, seat_id, status, holder_user_id, holder_booking_id, held_until
            FROM seat_inventory WHERE trip_id = $1 ORDER BY seat_id
            "#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        rows.into_iter().map(SeatInventoryRecord::try_from).collect()
    }
}
