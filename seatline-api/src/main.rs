use anyhow::Context;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seatline_api::{app, AppState, AuthConfig};
use seatline_booking::{BookingCoordinator, BookingPolicy, ExpiryWorker, SoftLockSweeper, WorkerConfig, WorkerMetrics};
use seatline_core::{Clock, DelayedScheduler, SoftLockStore, SystemClock};
use seatline_store::app_config::{BookingRules, Config, WorkerSettings};
use seatline_store::{
    DbClient, EventProducer, PgBookingRepository, PgSeatInventoryStore, PgSoftLockStore, RedisClient,
    RedisDelayedScheduler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatline_api=debug,seatline_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Seatline API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let rules = match db.fetch_booking_rules(config.booking.clone()).await {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!("Could not load business rules, using configured defaults: {}", e);
            config.booking.clone()
        }
    };
    tracing::info!(
        "Payment window {}s, soft lock {}s, max {} seats",
        rules.payment_window_seconds,
        rules.soft_lock_seconds,
        rules.max_seats_per_booking
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Redis Connection
    let redis = RedisClient::new(&config.redis.url).await.context("Failed to connect to Redis")?;
    redis.ping().await.context("Redis did not answer PING")?;
    let scheduler: Arc<dyn DelayedScheduler> = Arc::new(RedisDelayedScheduler::new(redis, clock.clone()));

    // Kafka Connection
    let producer = EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?;

    let policy = booking_policy(&rules)?;
    let soft_locks: Arc<dyn SoftLockStore> = Arc::new(PgSoftLockStore::new(db.pool.clone(), clock.clone()));
    let coordinator = Arc::new(BookingCoordinator::new(
        Arc::new(PgSeatInventoryStore::new(db.pool.clone(), clock.clone())),
        soft_locks.clone(),
        Arc::new(PgBookingRepository::new(db.pool.clone())),
        scheduler.clone(),
        Arc::new(producer),
        clock.clone(),
        policy,
    ));

    let registry = Registry::new();
    let metrics = WorkerMetrics::new(&registry).context("Failed to register worker metrics")?;

    // Background loops
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = ExpiryWorker::new(scheduler, coordinator.clone(), clock, worker_config(&config.worker))
        .with_metrics(metrics.clone());
    let worker_rx = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_rx).await });

    let sweeper = SoftLockSweeper::new(soft_locks, Duration::from_secs(config.worker.sweep_interval_seconds))
        .with_metrics(metrics);
    let sweeper_handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let app_state = AppState {
        coordinator,
        auth: AuthConfig { secret: config.auth.jwt_secret.clone() },
        registry,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("Failed to bind listener")?;
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down background workers");
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(worker_handle, sweeper_handle);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn booking_policy(rules: &BookingRules) -> anyhow::Result<BookingPolicy> {
    let payment_window = seconds(rules.payment_window_seconds).context("payment_window_seconds out of range")?;
    let soft_lock_ttl = seconds(rules.soft_lock_seconds).context("soft_lock_seconds out of range")?;
    BookingPolicy::new(payment_window, soft_lock_ttl, rules.max_seats_per_booking).context("Invalid booking rules")
}

fn seconds(value: u64) -> Option<chrono::Duration> {
    chrono::Duration::try_seconds(i64::try_from(value).ok()?)
}

fn worker_config(settings: &WorkerSettings) -> WorkerConfig {
    WorkerConfig {
        batch_size: settings.batch_size,
        poll_interval: Duration::from_millis(settings.poll_interval_ms),
        max_attempts: settings.max_attempts,
        backoff_base: Duration::from_millis(settings.backoff_base_ms),
        backoff_max: Duration::from_millis(settings.backoff_max_ms),
        ..Default::default()
    }
}
