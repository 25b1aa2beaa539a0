use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use seatline_core::{
    dead_letter_queue, Clock, CoreError, CoreResult, DelayedJob, DelayedScheduler, JobType,
};

use crate::coordinator::BookingCoordinator;
use crate::metrics::WorkerMetrics;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: JobType::BookingExpiry.queue_name().to_string(),
            batch_size: 50,
            poll_interval: Duration::from_secs(1),
            max_attempts: 5,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// `base * 2^attempt`, capped, plus up to 20% jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base.saturating_mul(2u32.saturating_pow(attempt.min(16)));
        let capped = exp.min(self.backoff_max);
        let jitter_ms = (capped.as_millis() as u64) / 5;
        let jitter = if jitter_ms == 0 { 0 } else { rand::thread_rng().gen_range(0..=jitter_ms) };
        capped + Duration::from_millis(jitter)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub polled: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

enum Disposition {
    Retried,
    DeadLettered,
}

/// Drains due jobs and hands each to the coordinator.
///
/// Jobs are popped before they are processed. A handler failure never aborts
/// the batch: retriable errors are re-scheduled with backoff, everything else
/// (and retries past `max_attempts`) is parked on the dead-letter queue.
pub struct ExpiryWorker {
    scheduler: Arc<dyn DelayedScheduler>,
    coordinator: Arc<BookingCoordinator>,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
    metrics: Option<WorkerMetrics>,
}

impl ExpiryWorker {
    pub fn new(
        scheduler: Arc<dyn DelayedScheduler>,
        coordinator: Arc<BookingCoordinator>,
        clock: Arc<dyn Clock>,
        config: WorkerConfig,
    ) -> Self {
        Self { scheduler, coordinator, clock, config, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: WorkerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Expiry worker started on queue {}", self.config.queue);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.tick().await {
                // A full batch means more may be due already
                Ok(report) => report.polled < self.config.batch_size,
                Err(e) => {
                    error!("Polling {} failed: {}", self.config.queue, e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!("Expiry worker on {} stopped", self.config.queue);
    }

    /// One poll-and-process round.
    pub async fn tick(&self) -> CoreResult<TickReport> {
        let jobs = self.scheduler.poll(&self.config.queue, self.config.batch_size).await?;
        let mut report = TickReport { polled: jobs.len(), ..Default::default() };
        if jobs.is_empty() {
            return Ok(report);
        }
        debug!("Polled {} job(s) from {}", jobs.len(), self.config.queue);

        for job in jobs {
            match self.dispatch(&job).await {
                Ok(()) => {
                    report.succeeded += 1;
                    self.record("succeeded");
                }
                Err(err) => match self.handle_failure(job, err).await {
                    Disposition::Retried => {
                        report.retried += 1;
                        self.record("retried");
                    }
                    Disposition::DeadLettered => {
                        report.dead_lettered += 1;
                        self.record("dead_lettered");
                    }
                },
            }
        }

        if let Some(metrics) = &self.metrics {
            if let Ok(len) = self.scheduler.len(&self.config.queue).await {
                metrics.set_backlog(len);
            }
        }
        Ok(report)
    }

    async fn dispatch(&self, job: &DelayedJob) -> CoreResult<()> {
        match job.job_type {
            JobType::BookingExpiry => {
                let settlement = self.coordinator.expire_booking(job.payload.booking_id).await?;
                if !settlement.applied {
                    debug!(
                        "Expiry for booking {} was a no-op, booking is {}",
                        job.payload.booking_id, settlement.booking.status
                    );
                }
                Ok(())
            }
        }
    }

    async fn handle_failure(&self, job: DelayedJob, err: CoreError) -> Disposition {
        if err.is_retriable() && job.attempt + 1 < self.config.max_attempts {
            let delay = self.config.backoff(job.attempt);
            let due_at = self.clock.now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::seconds(60));
            let retry = job.retry_at(due_at);
            warn!(
                "Job {} for booking {} failed (attempt {}): {}; retrying at {}",
                job.id, job.payload.booking_id, retry.attempt, err, due_at
            );
            match self.scheduler.schedule(&self.config.queue, &retry).await {
                Ok(()) => return Disposition::Retried,
                Err(e) => error!("Could not re-schedule job {}: {}", job.id, e),
            }
        } else if matches!(err, CoreError::InvariantViolation(_)) {
            error!("Job {} for booking {} hit an invariant violation: {}", job.id, job.payload.booking_id, err);
        } else {
            error!("Job {} for booking {} gave up after attempt {}: {}", job.id, job.payload.booking_id, job.attempt + 1, err);
        }

        self.dead_letter(job).await;
        Disposition::DeadLettered
    }

    async fn dead_letter(&self, job: DelayedJob) {
        let queue = dead_letter_queue(&self.config.queue);
        let parked = DelayedJob { due_at: self.clock.now(), ..job };
        if let Err(e) = self.scheduler.schedule(&queue, &parked).await {
            // Last resort: the job only survives in the log
            let raw = serde_json::to_string(&parked).unwrap_or_else(|_| format!("{:?}", parked));
            error!("Could not dead-letter job {} ({})", raw, e);
        }
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_job(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = WorkerConfig {
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_millis(1000),
            ..Default::default()
        };

        let first = config.backoff(0);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(120));

        let third = config.backoff(2);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(480));

        let capped = config.backoff(30);
        assert!(capped >= Duration::from_millis(1000) && capped <= Duration::from_millis(1200));
    }
}
