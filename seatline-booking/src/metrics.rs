use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

/// Counters for the background loops, registered on the API's registry.
#[derive(Clone)]
pub struct WorkerMetrics {
    jobs: IntCounterVec,
    backlog: IntGauge,
    swept: IntCounterVec,
}

impl WorkerMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let jobs = IntCounterVec::new(
            Opts::new("seatline_expiry_jobs_total", "Expiry jobs handled, by outcome"),
            &["outcome"],
        )?;
        let backlog = IntGauge::new("seatline_expiry_backlog", "Jobs waiting in the expiry queue")?;
        let swept = IntCounterVec::new(
            Opts::new("seatline_soft_locks_swept_total", "Expired soft locks removed by the sweeper"),
            &["store"],
        )?;

        registry.register(Box::new(jobs.clone()))?;
        registry.register(Box::new(backlog.clone()))?;
        registry.register(Box::new(swept.clone()))?;

        Ok(Self { jobs, backlog, swept })
    }

    pub fn record_job(&self, outcome: &str) {
        self.jobs.with_label_values(&[outcome]).inc();
    }

    pub fn set_backlog(&self, len: u64) {
        self.backlog.set(len as i64);
    }

    pub fn record_swept(&self, count: u64) {
        self.swept.with_label_values(&["soft_locks"]).inc_by(count);
    }

    pub fn job_count(&self, outcome: &str) -> u64 {
        self.jobs.with_label_values(&[outcome]).get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once_per_registry() {
        let registry = Registry::new();
        let metrics = WorkerMetrics::new(&registry).unwrap();
        metrics.record_job("succeeded");
        metrics.record_job("succeeded");
        assert_eq!(metrics.job_count("succeeded"), 2);

        assert!(WorkerMetrics::new(&registry).is_err());
    }
}
