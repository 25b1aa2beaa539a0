pub mod booking;
pub mod clock;
pub mod events;
pub mod scheduler;
pub mod seat;
pub mod soft_lock;

pub use booking::{Booking, BookingRepository, BookingStatus, PaymentStatus, StatusTransition};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{BookingEvent, BookingEventPublisher};
pub use scheduler::{dead_letter_queue, DelayedJob, DelayedScheduler, JobPayload, JobType};
pub use seat::{SeatInventoryRecord, SeatInventoryStore, SeatStatus, TransitionOutcome};
pub use soft_lock::{AcquireOutcome, SoftLock, SoftLockStore};

/// Error taxonomy shared by every store and the lifecycle coordinator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Expected outcome of losing a race: the seat or booking is no longer in the required state.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    /// The backing store could not be reached; safe to retry with backoff.
    #[error("Transient failure: {0}")]
    Transient(String),
    /// A programming error. Never retried, never swallowed.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }

    pub fn transient(err: impl std::fmt::Display) -> Self {
        CoreError::Transient(err.to_string())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        CoreError::InternalError(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
