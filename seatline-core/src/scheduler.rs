use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreResult;

/// One queue per job category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    BookingExpiry,
}

impl JobType {
    pub fn queue_name(&self) -> &'static str {
        match self {
            JobType::BookingExpiry => "booking_expiry",
        }
    }
}

/// Jobs carry identifiers only; handlers re-read everything else at fire time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobPayload {
    pub booking_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelayedJob {
    pub id: Uuid,
    pub job_type: JobType,
    pub payload: JobPayload,
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt: u32,
}

impl DelayedJob {
    pub fn new(job_type: JobType, payload: JobPayload, due_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            payload,
            due_at,
            attempt: 0,
        }
    }

    pub fn booking_expiry(booking_id: Uuid, due_at: DateTime<Utc>) -> Self {
        Self::new(JobType::BookingExpiry, JobPayload { booking_id }, due_at)
    }

    /// The same job, one attempt later, due again at `due_at`.
    pub fn retry_at(&self, due_at: DateTime<Utc>) -> Self {
        Self {
            id: self.id,
            job_type: self.job_type,
            payload: self.payload.clone(),
            due_at,
            attempt: self.attempt + 1,
        }
    }

    pub fn queue_name(&self) -> &'static str {
        self.job_type.queue_name()
    }
}

/// Where jobs that can no longer be retried are parked for operators.
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{}:dead", queue)
}

/// Time-ordered work queue with an atomic pop.
#[async_trait]
pub trait DelayedScheduler: Send + Sync {
    /// Inserts `job` keyed by its `due_at`.
    async fn schedule(&self, queue: &str, job: &DelayedJob) -> CoreResult<()>;

    /// Removes and returns up to `limit` jobs with `due_at <= now`.
    /// Two concurrent pollers never receive the same job.
    async fn poll(&self, queue: &str, limit: usize) -> CoreResult<Vec<DelayedJob>>;

    async fn len(&self, queue: &str) -> CoreResult<u64>;
}
