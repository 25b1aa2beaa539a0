pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod memory;
pub mod redis_repo;
pub mod seat_repo;
pub mod soft_lock_repo;

pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use memory::{
    InMemoryBookingRepository, InMemoryDelayedScheduler, InMemorySeatInventoryStore,
    InMemorySoftLockStore, RecordingEventPublisher,
};
pub use redis_repo::{RedisClient, RedisDelayedScheduler};
pub use seat_repo::PgSeatInventoryStore;
pub use soft_lock_repo::PgSoftLockStore;
