//! PostgreSQL bootstrap: pooled connection with bounded retries, then migrations.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use store::{PostgresStore, StoreError};
use thiserror::Error;

use crate::config::Config;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that stop the server from reaching its database.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Every connection attempt failed.
    #[error("Could not connect to database after {attempts} attempt(s): {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// Connected, but the schema could not be prepared.
    #[error("Database setup failed: {0}")]
    Store(#[from] StoreError),
}

/// Connects to `url`, retrying up to `config.db_connect_retries` times.
///
/// At least one attempt is always made.
#[tracing::instrument(skip_all, fields(retries = config.db_connect_retries))]
pub async fn connect_with_retry(url: &str, config: &Config) -> Result<PgPool, BootstrapError> {
    let attempts = config.db_connect_retries.max(1);

    let mut attempt = 1;
    loop {
        let result = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await;

        match result {
            Ok(pool) => {
                tracing::info!(attempt, "connected to database");
                return Ok(pool);
            }
            Err(source) if attempt >= attempts => {
                tracing::error!(attempt, error = %source, "giving up on database connection");
                return Err(BootstrapError::Connect { attempts, source });
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    attempts,
                    error = %e,
                    delay_ms = config.db_retry_delay_ms,
                    "database connection failed, retrying"
                );
                tokio::time::sleep(config.db_retry_delay()).await;
                attempt += 1;
            }
        }
    }
}

/// Connects and migrates, returning a ready store.
pub async fn open_postgres(url: &str, config: &Config) -> Result<PostgresStore, BootstrapError> {
    let pool = connect_with_retry(url, config).await?;
    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    tracing::info!("database migrations applied");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gives_up_after_configured_attempts() {
        let config = Config {
            db_connect_retries: 2,
            db_retry_delay_ms: 1,
            ..Config::default()
        };

        let err = connect_with_retry("not a database url", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Connect { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_zero_retries_still_tries_once() {
        let config = Config {
            db_connect_retries: 0,
            db_retry_delay_ms: 1,
            ..Config::default()
        };

        let err = connect_with_retry("not a database url", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Connect { attempts: 1, .. }));
    }
}
