use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use seatline_core::SoftLockStore;

use crate::metrics::WorkerMetrics;

/// Periodically deletes lapsed soft locks. Storage hygiene only.
pub struct SoftLockSweeper {
    soft_locks: Arc<dyn SoftLockStore>,
    interval: Duration,
    metrics: Option<WorkerMetrics>,
}

impl SoftLockSweeper {
    pub fn new(soft_locks: Arc<dyn SoftLockStore>, interval: Duration) -> Self {
        Self { soft_locks, interval, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: WorkerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn sweep_once(&self) -> u64 {
        match self.soft_locks.sweep_expired().await {
            Ok(removed) => {
                if removed > 0 {
                    debug!("Swept {} expired soft lock(s)", removed);
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_swept(removed);
                }
                removed
            }
            Err(e) => {
                warn!("Soft lock sweep failed: {}", e);
                0
            }
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Soft lock sweeper started, every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Soft lock sweeper stopped");
    }
}
