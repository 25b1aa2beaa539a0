#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use seatline_booking::{BookingCoordinator, BookingPolicy, CreateBookingRequest, ExpiryWorker, WorkerConfig};
use seatline_core::{
    BookingRepository, Clock, DelayedScheduler, ManualClock, SeatInventoryRecord, SeatInventoryStore,
    SeatStatus, SoftLockStore,
};
use seatline_store::{
    InMemoryBookingRepository, InMemoryDelayedScheduler, InMemorySeatInventoryStore,
    InMemorySoftLockStore, RecordingEventPublisher,
};

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub seats: Arc<dyn SeatInventoryStore>,
    pub soft_locks: Arc<InMemorySoftLockStore>,
    pub bookings: Arc<InMemoryBookingRepository>,
    pub scheduler: Arc<InMemoryDelayedScheduler>,
    pub events: Arc<RecordingEventPublisher>,
    pub coordinator: Arc<BookingCoordinator>,
    pub trip_id: Uuid,
}

impl Harness {
    pub async fn new(seat_ids: &[&str]) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let seats: Arc<dyn SeatInventoryStore> = Arc::new(InMemorySeatInventoryStore::new(clock.clone()));
        Self::with_seat_store(clock, seats, seat_ids).await
    }

    pub async fn with_seat_store(
        clock: Arc<ManualClock>,
        seats: Arc<dyn SeatInventoryStore>,
        seat_ids: &[&str],
    ) -> Self {
        let soft_locks = Arc::new(InMemorySoftLockStore::new(clock.clone()));
        let bookings = Arc::new(InMemoryBookingRepository::new());
        let scheduler = Arc::new(InMemoryDelayedScheduler::new(clock.clone()));
        let events = Arc::new(RecordingEventPublisher::new());

        let trip_id = Uuid::new_v4();
        seats.initialize_trip(trip_id, &to_strings(seat_ids)).await.unwrap();

        let coordinator = Arc::new(BookingCoordinator::new(
            seats.clone(),
            soft_locks.clone() as Arc<dyn SoftLockStore>,
            bookings.clone() as Arc<dyn BookingRepository>,
            scheduler.clone() as Arc<dyn DelayedScheduler>,
            events.clone(),
            clock.clone(),
            BookingPolicy::default(),
        ));

        Self { clock, seats, soft_locks, bookings, scheduler, events, coordinator, trip_id }
    }

    pub fn request(&self, user_id: &str, seat_ids: &[&str]) -> CreateBookingRequest {
        CreateBookingRequest {
            trip_id: self.trip_id,
            seat_ids: to_strings(seat_ids),
            user_id: user_id.to_string(),
            total_amount: 2500 * seat_ids.len() as i64,
            session_id: None,
        }
    }

    pub fn worker(&self) -> ExpiryWorker {
        self.worker_with(WorkerConfig::default())
    }

    pub fn worker_with(&self, config: WorkerConfig) -> ExpiryWorker {
        ExpiryWorker::new(self.scheduler.clone(), self.coordinator.clone(), self.clock.clone(), config)
    }

    pub async fn seat(&self, seat_id: &str) -> SeatInventoryRecord {
        self.seats.get(self.trip_id, seat_id).await.unwrap().unwrap()
    }

    pub async fn seat_status(&self, seat_id: &str) -> SeatStatus {
        self.seat(seat_id).await.status
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }
}

pub fn to_strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}
