pub mod coordinator;
pub mod metrics;
pub mod models;
pub mod sweeper;
pub mod worker;

pub use coordinator::BookingCoordinator;
pub use metrics::WorkerMetrics;
pub use models::{BookingPolicy, CreateBookingRequest, Settlement};
pub use sweeper::SoftLockSweeper;
pub use worker::{ExpiryWorker, TickReport, WorkerConfig};
