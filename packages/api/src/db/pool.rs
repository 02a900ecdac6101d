//! Database connection pool with bounded startup retries.

use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::settings::DatabaseSettings;

/// Open the pool, retrying the first connection with linear backoff.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    let options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(0)
        .idle_timeout(settings.idle_timeout())
        .acquire_timeout(settings.acquire_timeout());

    let attempts = settings.connect_attempts.max(1);
    let mut attempt = 1;
    loop {
        match options.clone().connect(&settings.url).await {
            Ok(pool) => {
                tracing::info!(attempt, "connected to database");
                return Ok(pool);
            }
            Err(err) if attempt < attempts => {
                let delay = backoff(attempt, settings.connect_backoff_ms);
                tracing::warn!(attempt, ?delay, error = %err, "database connection failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff(attempt: u32, step_ms: u64) -> Duration {
    Duration::from_millis(step_ms.saturating_mul(u64::from(attempt)))
}

pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
