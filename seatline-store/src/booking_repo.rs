use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use seatline_core::{Booking, BookingRepository, CoreError, CoreResult, StatusTransition};

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    trip_id: Uuid,
    user_id: String,
    seat_ids: Vec<String>,
    status: String,
    payment_status: String,
    total_amount: i64,
    expires_at: DateTime<Utc>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            trip_id: row.trip_id,
            user_id: row.user_id,
            seat_ids: row.seat_ids,
            status: row.status.parse()?,
            payment_status: row.payment_status.parse()?,
            total_amount: row.total_amount,
            expires_at: row.expires_at,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, trip_id, user_id, seat_ids, status, payment_status,
                                  total_amount, expires_at, cancel_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(booking.id)
        .bind(booking.trip_id)
        .bind(&booking.user_id)
        .bind(&booking.seat_ids)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.total_amount)
        .bind(booking.expires_at)
        .bind(&booking.cancel_reason)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, trip_id, user_id, seat_ids, status, payment_status, total_amount,
                   expires_at, cancel_reason, created_at, updated_at
            FROM bookings WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        row.map(Booking::try_from).transpose()
    }

    async fn transition_from_pending(
        &self,
        id: Uuid,
        transition: &StatusTransition,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2,
                payment_status = COALESCE($3, payment_status),
                cancel_reason = COALESCE($4, cancel_reason),
                updated_at = $5
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(transition.to.as_str())
        .bind(transition.payment_status.map(|p| p.as_str()))
        .bind(&transition.reason)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(CoreError::transient)?;

        Ok(result.rows_affected() == 1)
    }
}
