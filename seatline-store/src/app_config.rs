use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub booking: BookingRules,
    #[serde(default)]
    pub worker: WorkerSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BookingRules {
    pub payment_window_seconds: u64,
    pub soft_lock_seconds: u64,
    #[serde(default = "default_max_seats")]
    pub max_seats_per_booking: usize,
}

fn default_max_seats() -> usize { 10 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            payment_window_seconds: 900,
            soft_lock_seconds: 600,
            max_seats_per_booking: default_max_seats(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorkerSettings {
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            poll_interval_ms: 1000,
            max_attempts: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 60_000,
            sweep_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `SEATLINE_BOOKING__PAYMENT_WINDOW_SECONDS=600`
            .add_source(config::Environment::with_prefix("SEATLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
