//! In-process implementations of every store trait.
//!
//! Each operation runs under a single async mutex, which gives the same
//! one-winner-per-conditional-write guarantee the database provides. Used by
//! the test suites and for running the API without Postgres or Redis.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use seatline_core::{
    AcquireOutcome, Booking, BookingEvent, BookingEventPublisher, BookingRepository, Clock,
    CoreError, CoreResult, DelayedJob, DelayedScheduler, SeatInventoryRecord, SeatInventoryStore,
    SeatStatus, SoftLock, SoftLockStore, StatusTransition, TransitionOutcome,
};

type SeatKey = (Uuid, String);

pub struct InMemorySeatInventoryStore {
    seats: Mutex<HashMap<SeatKey, SeatInventoryRecord>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySeatInventoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { seats: Mutex::new(HashMap::new()), clock }
    }

    async fn transition<F>(&self, trip_id: Uuid, seat_id: &str, apply: F) -> TransitionOutcome
    where
        F: FnOnce(&mut SeatInventoryRecord) -> bool + Send,
    {
        let mut seats = self.seats.lock().await;
        match seats.get_mut(&(trip_id, seat_id.to_string())) {
            Some(seat) => {
                if apply(seat) {
                    TransitionOutcome::Applied
                } else {
                    TransitionOutcome::Conflict
                }
            }
            None => TransitionOutcome::Conflict,
        }
    }
}

#[async_trait]
impl SeatInventoryStore for InMemorySeatInventoryStore {
    async fn initialize_trip(&self, trip_id: Uuid, seat_ids: &[String]) -> CoreResult<u64> {
        let mut seats = self.seats.lock().await;
        let mut inserted = 0;
        for seat_id in seat_ids {
            let key = (trip_id, seat_id.clone());
            if !seats.contains_key(&key) {
                seats.insert(key, SeatInventoryRecord::available(trip_id, seat_id.clone()));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn try_reserve(
        &self,
        trip_id: Uuid,
        seat_id: &str,
        user_id: &str,
        booking_id: Uuid,
        held_until: DateTime<Utc>,
    ) -> CoreResult<TransitionOutcome> {
        if held_until <= self.clock.now() {
            return Err(CoreError::ValidationError(format!("hold deadline {} is not in the future", held_until)));
        }
        Ok(self
            .transition(trip_id, seat_id, |seat| {
                if seat.status != SeatStatus::Available {
                    return false;
                }
                seat.status = SeatStatus::Reserved;
                seat.holder_user_id = Some(user_id.to_string());
                seat.holder_booking_id = Some(booking_id);
                seat.held_until = Some(held_until);
                true
            })
            .await)
    }

    async fn confirm(&self, trip_id: Uuid, seat_id: &str, booking_id: Uuid) -> CoreResult<TransitionOutcome> {
        Ok(self
            .transition(trip_id, seat_id, |seat| {
                if seat.status != SeatStatus::Reserved || !seat.is_held_by(booking_id) {
                    return false;
                }
                seat.status = SeatStatus::Booked;
                seat.held_until = None;
                true
            })
            .await)
    }

    async fn release(&self, trip_id: Uuid, seat_id: &str, booking_id: Uuid) -> CoreResult<TransitionOutcome> {
        Ok(self
            .transition(trip_id, seat_id, |seat| {
                if seat.status != SeatStatus::Reserved || !seat.is_held_by(booking_id) {
                    return false;
                }
                *seat = SeatInventoryRecord::available(seat.trip_id, seat.seat_id.clone());
                true
            })
            .await)
    }

    async fn get(&self, trip_id: Uuid, seat_id: &str) -> CoreResult<Option<SeatInventoryRecord>> {
        let seats = self.seats.lock().await;
        Ok(seats.get(&(trip_id, seat_id.to_string())).cloned())
    }

    async fn bulk_query_by_trip(&self, trip_id: Uuid) -> CoreResult<Vec<SeatInventoryRecord>> {
        let seats = self.seats.lock().await;
        let mut records: Vec<SeatInventoryRecord> =
            seats.values().filter(|s| s.trip_id == trip_id).cloned().collect();
        records.sort_by(|a, b| a.seat_id.cmp(&b.seat_id));
        Ok(records)
    }
}

pub struct InMemorySoftLockStore {
    locks: Mutex<HashMap<SeatKey, SoftLock>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySoftLockStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { locks: Mutex::new(HashMap::new()), clock }
    }

    /// Rows physically present, expired or not.
    pub async fn stored_count(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[async_trait]
impl SoftLockStore for InMemorySoftLockStore {
    async fn acquire(
        &self,
        trip_id: Uuid,
        seat_ids: &[String],
        session_id: &str,
        ttl: Duration,
    ) -> CoreResult<AcquireOutcome> {
        if seat_ids.is_empty() {
            return Err(CoreError::ValidationError("at least one seat is required".to_string()));
        }

        let now = self.clock.now();
        let mut locks = self.locks.lock().await;

        let mut conflicts: Vec<String> = seat_ids
            .iter()
            .filter(|seat_id| {
                locks
                    .get(&(trip_id, seat_id.to_string()))
                    .is_some_and(|lock| lock.is_active(now) && lock.session_id != session_id)
            })
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            conflicts.sort();
            conflicts.dedup();
            return Ok(AcquireOutcome::Conflict(conflicts));
        }

        let expires_at = now + ttl;
        for seat_id in seat_ids {
            locks.insert(
                (trip_id, seat_id.clone()),
                SoftLock {
                    trip_id,
                    seat_id: seat_id.clone(),
                    session_id: session_id.to_string(),
                    locked_at: now,
                    expires_at,
                },
            );
        }
        Ok(AcquireOutcome::Acquired { expires_at })
    }

    async fn release(&self, session_id: &str) -> CoreResult<u64> {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| lock.session_id != session_id);
        Ok((before - locks.len()) as u64)
    }

    async fn active_lock(&self, trip_id: Uuid, seat_id: &str) -> CoreResult<Option<SoftLock>> {
        let now = self.clock.now();
        let locks = self.locks.lock().await;
        Ok(locks
            .get(&(trip_id, seat_id.to_string()))
            .filter(|lock| lock.is_active(now))
            .cloned())
    }

    async fn sweep_expired(&self) -> CoreResult<u64> {
        let now = self.clock.now();
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| lock.is_active(now));
        Ok((before - locks.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: Mutex<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        let mut bookings = self.bookings.lock().await;
        if bookings.contains_key(&booking.id) {
            return Err(CoreError::InvariantViolation(format!("booking {} inserted twice", booking.id)));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.lock().await.get(&id).cloned())
    }

    async fn transition_from_pending(
        &self,
        id: Uuid,
        transition: &StatusTransition,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let mut bookings = self.bookings.lock().await;
        match bookings.get_mut(&id) {
            Some(booking) if !booking.status.is_terminal() => {
                booking.apply(transition, now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub struct InMemoryDelayedScheduler {
    queues: Mutex<HashMap<String, Vec<DelayedJob>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryDelayedScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { queues: Mutex::new(HashMap::new()), clock }
    }

    /// Snapshot of a queue without removing anything.
    pub async fn peek(&self, queue: &str) -> Vec<DelayedJob> {
        self.queues.lock().await.get(queue).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl DelayedScheduler for InMemoryDelayedScheduler {
    async fn schedule(&self, queue: &str, job: &DelayedJob) -> CoreResult<()> {
        let mut queues = self.queues.lock().await;
        let jobs = queues.entry(queue.to_string()).or_default();
        if !jobs.contains(job) {
            jobs.push(job.clone());
        }
        Ok(())
    }

    async fn poll(&self, queue: &str, limit: usize) -> CoreResult<Vec<DelayedJob>> {
        let now = self.clock.now();
        let mut queues = self.queues.lock().await;
        let Some(jobs) = queues.get_mut(queue) else {
            return Ok(Vec::new());
        };

        jobs.sort_by_key(|job| job.due_at);
        let due = jobs.iter().take_while(|job| job.due_at <= now).count().min(limit);
        Ok(jobs.drain(..due).collect())
    }

    async fn len(&self, queue: &str) -> CoreResult<u64> {
        Ok(self.queues.lock().await.get(queue).map_or(0, |jobs| jobs.len() as u64))
    }
}

/// Keeps every published event for assertions.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<BookingEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<BookingEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl BookingEventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &BookingEvent) -> CoreResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
