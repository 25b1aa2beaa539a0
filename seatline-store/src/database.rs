use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;
use serde_json::Value;

use crate::app_config::BookingRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlays `business_rules` rows onto the file-based defaults.
    pub async fn fetch_booking_rules(&self, defaults: BookingRules) -> Result<BookingRules, sqlx::Error> {
        #[derive(sqlx::FromRow)]
        struct RuleRow {
            rule_key: String,
            rule_value: Value,
        }

        let rows: Vec<RuleRow> = sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        Ok(apply_rule_overrides(defaults, rows.into_iter().map(|r| (r.rule_key, r.rule_value))))
    }
}

// Expected row format: {"value": <number>}
fn apply_rule_overrides(mut rules: BookingRules, rows: impl IntoIterator<Item = (String, Value)>) -> BookingRules {
    for (key, value) in rows {
        let Some(v) = value.get("value").and_then(Value::as_u64) else {
            continue;
        };
        match key.as_str() {
            "payment_window_seconds" => rules.payment_window_seconds = v,
            "soft_lock_seconds" => rules.soft_lock_seconds = v,
            "max_seats_per_booking" => rules.max_seats_per_booking = v as usize,
            _ => {}
        }
    }
    rules
}
