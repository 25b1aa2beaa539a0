use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use seatline_core::{
    AcquireOutcome, Booking, BookingEvent, BookingEventPublisher, BookingRepository, BookingStatus,
    Clock, CoreError, CoreResult, DelayedJob, DelayedScheduler, SeatInventoryRecord,
    SeatInventoryStore, SeatStatus, SoftLockStore, StatusTransition, TransitionOutcome,
};

use crate::models::{BookingPolicy, CreateBookingRequest, Settlement};

const SCHEDULE_ATTEMPTS: u32 = 3;
const SCHEDULE_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(50);

/// Ties seat reservations, booking status and scheduled expiry together.
///
/// Every settlement path (payment, failure, cancel, expiry) follows the same
/// two steps:
///
/// 1. a conditional `pending -> terminal` write on the booking. Exactly one
///    caller wins; losers see `false` and change nothing on the booking.
/// 2. seat reconciliation derived from the booking's current status. Seat
///    writes are themselves conditional, so re-running them is harmless and a
///    redelivered event finishes whatever a crashed handler left undone.
///
/// Only the winner of step 1 publishes a lifecycle event.
pub struct BookingCoordinator {
    seats: Arc<dyn SeatInventoryStore>,
    soft_locks: Arc<dyn SoftLockStore>,
    bookings: Arc<dyn BookingRepository>,
    scheduler: Arc<dyn DelayedScheduler>,
    events: Arc<dyn BookingEventPublisher>,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
}

impl BookingCoordinator {
    pub fn new(
        seats: Arc<dyn SeatInventoryStore>,
        soft_locks: Arc<dyn SoftLockStore>,
        bookings: Arc<dyn BookingRepository>,
        scheduler: Arc<dyn DelayedScheduler>,
        events: Arc<dyn BookingEventPublisher>,
        clock: Arc<dyn Clock>,
        policy: BookingPolicy,
    ) -> Self {
        Self { seats, soft_locks, bookings, scheduler, events, clock, policy }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Transient scheduler failures get a few quick retries before the booking is abandoned.
    async fn schedule_expiry(&self, job: &DelayedJob) -> CoreResult<()> {
        let mut attempt = 1;
        loop {
            match self.scheduler.schedule(job.queue_name(), job).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retriable() && attempt < SCHEDULE_ATTEMPTS => {
                    warn!("Scheduling expiry for booking {} failed (attempt {}): {}", job.payload.booking_id, attempt, e);
                    tokio::time::sleep(SCHEDULE_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ------------------------------------------------------------------
    // Selection holds
    // ------------------------------------------------------------------

    pub async fn hold_seats(&self, trip_id: Uuid, seat_ids: &[String], session_id: &str) -> CoreResult<AcquireOutcome> {
        if session_id.trim().is_empty() {
            return Err(CoreError::ValidationError("session_id must not be empty".to_string()));
        }
        if seat_ids.len() > self.policy.max_seats_per_booking {
            return Err(CoreError::ValidationError(format!(
                "at most {} seats may be held at once",
                self.policy.max_seats_per_booking
            )));
        }
        self.soft_locks.acquire(trip_id, seat_ids, session_id, self.policy.soft_lock_ttl).await
    }

    pub async fn release_holds(&self, session_id: &str) -> CoreResult<u64> {
        self.soft_locks.release(session_id).await
    }

    pub async fn seat_map(&self, trip_id: Uuid) -> CoreResult<Vec<SeatInventoryRecord>> {
        self.seats.bulk_query_by_trip(trip_id).await
    }

    // ------------------------------------------------------------------
    // Booking creation
    // ------------------------------------------------------------------

    pub async fn create_booking(&self, req: CreateBookingRequest) -> CoreResult<Booking> {
        self.validate(&req)?;
        self.check_soft_locks(req.trip_id, &req.seat_ids, req.session_id.as_deref()).await?;

        let now = self.clock.now();
        let booking = Booking::new(
            req.trip_id,
            req.user_id,
            req.seat_ids,
            req.total_amount,
            now,
            now + self.policy.payment_window,
        );

        // 1. Reserve every seat, undoing our own reservations on the first failure
        let mut reserved: Vec<&str> = Vec::with_capacity(booking.seat_ids.len());
        for seat_id in &booking.seat_ids {
            let outcome = self
                .seats
                .try_reserve(booking.trip_id, seat_id, &booking.user_id, booking.id, booking.expires_at)
                .await;
            match outcome {
                Ok(TransitionOutcome::Applied) => reserved.push(seat_id),
                Ok(TransitionOutcome::Conflict) => {
                    self.rollback_reservations(&booking, &reserved).await;
                    info!("Booking attempt on trip {} lost seat {}", booking.trip_id, seat_id);
                    return Err(CoreError::Conflict(format!("seat {} is no longer available", seat_id)));
                }
                Err(e) => {
                    self.rollback_reservations(&booking, &reserved).await;
                    return Err(e);
                }
            }
        }

        // 2. Persist the aggregate
        if let Err(e) = self.bookings.insert(&booking).await {
            self.rollback_reservations(&booking, &reserved).await;
            return Err(e);
        }

        // 3. Schedule the payment timeout. Without it nothing would ever free these seats.
        let job = DelayedJob::booking_expiry(booking.id, booking.expires_at);
        if let Err(e) = self.schedule_expiry(&job).await {
            error!("Could not schedule expiry for booking {}: {}", booking.id, e);
            if let Err(cancel_err) = self.settle(booking.id, StatusTransition::cancel("expiry scheduling failed")).await {
                error!("Could not cancel unscheduled booking {}: {}", booking.id, cancel_err);
            }
            return Err(e);
        }

        // 4. The reservation now supersedes the selection hold
        if let Some(session_id) = &req.session_id {
            if let Err(e) = self.soft_locks.release(session_id).await {
                warn!("Failed to release soft locks for session {}: {}", session_id, e);
            }
        }

        info!(
            "Booking {} created for {} seat(s) on trip {}, payment due {}",
            booking.id,
            booking.seat_ids.len(),
            booking.trip_id,
            booking.expires_at
        );
        self.publish(BookingEvent::Created {
            booking_id: booking.id,
            trip_id: booking.trip_id,
            user_id: booking.user_id.clone(),
            seat_ids: booking.seat_ids.clone(),
            expires_at: booking.expires_at,
        })
        .await;

        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))
    }

    // ------------------------------------------------------------------
    // Settlement events
    // ------------------------------------------------------------------

    pub async fn confirm_payment(&self, booking_id: Uuid) -> CoreResult<Settlement> {
        let settlement = self.settle(booking_id, StatusTransition::confirm()).await?;
        let booking = &settlement.booking;

        if settlement.applied {
            info!("Booking {} confirmed", booking_id);
            self.publish(BookingEvent::Confirmed { booking_id, user_id: booking.user_id.clone() }).await;
        } else if booking.status != BookingStatus::Confirmed {
            warn!("Payment received for booking {} which is already {}", booking_id, booking.status);
            self.publish(BookingEvent::PaymentAfterSettlement { booking_id, user_id: booking.user_id.clone() })
                .await;
        }
        Ok(settlement)
    }

    pub async fn fail_payment(&self, booking_id: Uuid, reason: &str) -> CoreResult<Settlement> {
        let settlement = self.settle(booking_id, StatusTransition::payment_failed(reason)).await?;
        if settlement.applied {
            info!("Booking {} cancelled after failed payment: {}", booking_id, reason);
            self.publish(BookingEvent::Cancelled {
                booking_id,
                user_id: settlement.booking.user_id.clone(),
                reason: reason.to_string(),
            })
            .await;
        }
        Ok(settlement)
    }

    /// Cancelling an already cancelled or expired booking is a no-op;
    /// cancelling a confirmed one is a conflict.
    pub async fn cancel_booking(&self, booking_id: Uuid, reason: &str) -> CoreResult<Settlement> {
        let settlement = self.settle(booking_id, StatusTransition::cancel(reason)).await?;
        if settlement.booking.status == BookingStatus::Confirmed {
            return Err(CoreError::Conflict(format!("booking {} is already confirmed", booking_id)));
        }
        if settlement.applied {
            info!("Booking {} cancelled: {}", booking_id, reason);
            self.publish(BookingEvent::Cancelled {
                booking_id,
                user_id: settlement.booking.user_id.clone(),
                reason: reason.to_string(),
            })
            .await;
        }
        Ok(settlement)
    }

    /// Fired by the expiry worker at the payment deadline.
    pub async fn expire_booking(&self, booking_id: Uuid) -> CoreResult<Settlement> {
        let settlement = self.settle(booking_id, StatusTransition::expire()).await?;
        if settlement.applied {
            info!("Booking {} expired unpaid, seats released", booking_id);
            self.publish(BookingEvent::Expired { booking_id, user_id: settlement.booking.user_id.clone() }).await;
        }
        Ok(settlement)
    }

    async fn settle(&self, booking_id: Uuid, transition: StatusTransition) -> CoreResult<Settlement> {
        let mut booking = self.get_booking(booking_id).await?;

        let mut applied = false;
        if booking.status == BookingStatus::Pending {
            let now = self.clock.now();
            applied = self.bookings.transition_from_pending(booking_id, &transition, now).await?;
            if applied {
                booking.apply(&transition, now);
            } else {
                // Lost the race; act on whatever the winner wrote
                booking = self.get_booking(booking_id).await?;
            }
        }

        if !booking.is_consistent() {
            error!("Booking {} is {} with payment {}", booking.id, booking.status, booking.payment_status);
            return Err(CoreError::InvariantViolation(format!(
                "booking {} status {} disagrees with payment status {}",
                booking.id, booking.status, booking.payment_status
            )));
        }

        self.reconcile_seats(&booking).await?;
        Ok(Settlement { booking, applied })
    }

    /// Drives every seat of a settled booking to the state its status implies.
    async fn reconcile_seats(&self, booking: &Booking) -> CoreResult<()> {
        match booking.status {
            BookingStatus::Pending => Ok(()),
            BookingStatus::Confirmed => {
                let mut missing = Vec::new();
                for seat_id in &booking.seat_ids {
                    if self.seats.confirm(booking.trip_id, seat_id, booking.id).await?.is_applied() {
                        continue;
                    }
                    // Conflict is fine only if an earlier delivery already booked it for us
                    let seat = self.seats.get(booking.trip_id, seat_id).await?;
                    let already_booked = seat
                        .as_ref()
                        .is_some_and(|s| s.status == SeatStatus::Booked && s.is_held_by(booking.id));
                    if !already_booked {
                        missing.push(seat_id.clone());
                    }
                }
                if missing.is_empty() {
                    return Ok(());
                }
                error!("Confirmed booking {} does not hold seats {:?}", booking.id, missing);
                Err(CoreError::InvariantViolation(format!(
                    "confirmed booking {} lost seats {:?}",
                    booking.id, missing
                )))
            }
            BookingStatus::Cancelled | BookingStatus::Expired => {
                for seat_id in &booking.seat_ids {
                    // Conflict means already released, or re-sold after release
                    self.seats.release(booking.trip_id, seat_id, booking.id).await?;
                }
                Ok(())
            }
        }
    }

    async fn rollback_reservations(&self, booking: &Booking, reserved: &[&str]) {
        for seat_id in reserved {
            match self.seats.release(booking.trip_id, seat_id, booking.id).await {
                Ok(TransitionOutcome::Applied) => {}
                Ok(TransitionOutcome::Conflict) => {
                    error!("Rollback of seat {} for booking {} found it no longer ours", seat_id, booking.id)
                }
                Err(e) => error!(
                    "Rollback of seat {} on trip {} for booking {} failed, seat needs manual release: {}",
                    seat_id, booking.trip_id, booking.id, e
                ),
            }
        }
    }

    fn validate(&self, req: &CreateBookingRequest) -> CoreResult<()> {
        if req.user_id.trim().is_empty() {
            return Err(CoreError::ValidationError("user_id must not be empty".to_string()));
        }
        if req.seat_ids.is_empty() || req.seat_ids.len() > self.policy.max_seats_per_booking {
            return Err(CoreError::ValidationError(format!(
                "a booking must have between 1 and {} seats",
                self.policy.max_seats_per_booking
            )));
        }
        if req.seat_ids.iter().any(|s| s.trim().is_empty()) {
            return Err(CoreError::ValidationError("seat ids must not be empty".to_string()));
        }
        let unique: HashSet<&String> = req.seat_ids.iter().collect();
        if unique.len() != req.seat_ids.len() {
            return Err(CoreError::ValidationError("duplicate seat ids".to_string()));
        }
        if req.total_amount < 0 {
            return Err(CoreError::ValidationError("total_amount must not be negative".to_string()));
        }
        Ok(())
    }

    /// Seats soft locked by any other session are off limits.
    async fn check_soft_locks(&self, trip_id: Uuid, seat_ids: &[String], session_id: Option<&str>) -> CoreResult<()> {
        for seat_id in seat_ids {
            if let Some(lock) = self.soft_locks.active_lock(trip_id, seat_id).await? {
                if Some(lock.session_id.as_str()) != session_id {
                    return Err(CoreError::Conflict(format!("seat {} is held by another customer", seat_id)));
                }
            }
        }
        Ok(())
    }

    async fn publish(&self, event: BookingEvent) {
        if let Err(e) = self.events.publish(&event).await {
            warn!("Failed to publish {} for booking {}: {}", event.topic(), event.booking_id(), e);
        }
    }
}

