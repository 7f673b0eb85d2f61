//! Database connector
//!
//! Opens the connection pool described by [`DatabaseConfig`] and verifies it
//! with a ping before a [`DatabaseHandle`] is handed out. Failures are
//! returned as values; nothing here panics on an unreachable store.

use std::time::Duration;

use duplex_common::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::{info, warn};

use crate::completion::{Completion, spawn_completion};
use crate::handle::DatabaseHandle;

/// Ceiling for every pool timeout; the pool adds these to `Instant::now()`.
const MAX_POOL_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("failed to open database pool: {0}")]
    Open(#[source] DbErr),

    #[error("database liveness check failed: {0}")]
    Ping(#[source] DbErr),

    #[error("database did not answer within {0:?}")]
    Timeout(Duration),
}

/// Open the pool and verify liveness, retrying up to
/// `config.connect_retries` extra times with a fixed backoff.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseHandle, ConnectError> {
    let mut attempt: u32 = 0;
    loop {
        match connect_once(config).await {
            Ok(connection) => {
                info!(
                    driver = %config.driver,
                    url = %config.redacted_url(),
                    attempt = attempt.saturating_add(1),
                    "Database connection verified"
                );
                return Ok(DatabaseHandle::new(connection, config.driver));
            }
            Err(e) if attempt < config.connect_retries => {
                attempt += 1;
                warn!(
                    error = %e,
                    attempt,
                    retries = config.connect_retries,
                    "Database connection attempt failed, retrying in {:?}",
                    config.retry_backoff
                );
                tokio::time::sleep(config.retry_backoff).await;
            }
            Err(e) => {
                warn!(error = %e, url = %config.redacted_url(), "Failed to connect to database");
                return Err(e);
            }
        }
    }
}

/// Run [`connect`] on its own task.
///
/// Exactly one value is delivered through the returned [`Completion`].
pub fn spawn_connect(config: DatabaseConfig) -> Completion<Result<DatabaseHandle, ConnectError>> {
    spawn_completion(async move { connect(&config).await })
}

fn bounded(timeout: Duration) -> Duration {
    timeout.min(MAX_POOL_TIMEOUT)
}

async fn connect_once(config: &DatabaseConfig) -> Result<DatabaseConnection, ConnectError> {
    let connect_timeout = bounded(config.connect_timeout);
    let acquire_timeout = bounded(config.acquire_timeout);

    // `max_idle_conns` is the pool's warm floor, not a cap on idle connections
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_open_conns.max(1))
        .min_connections(config.max_idle_conns)
        .connect_timeout(connect_timeout)
        .acquire_timeout(acquire_timeout)
        .idle_timeout(bounded(config.conn_max_idle_time))
        .max_lifetime(bounded(config.conn_max_lifetime))
        .sqlx_logging(false);

    tracing::debug!(
        max_connections = config.max_open_conns,
        min_connections = config.max_idle_conns,
        connect_timeout = ?connect_timeout,
        idle_timeout = ?config.conn_max_idle_time,
        max_lifetime = ?config.conn_max_lifetime,
        "Database connection pool configured"
    );

    // Outer bound on the whole open
    let limit = connect_timeout.saturating_add(acquire_timeout);
    let connection = tokio::time::timeout(limit, Database::connect(opt))
        .await
        .map_err(|_| ConnectError::Timeout(limit))?
        .map_err(ConnectError::Open)?;

    match tokio::time::timeout(acquire_timeout, connection.ping()).await {
        Ok(Ok(())) => Ok(connection),
        Ok(Err(e)) => {
            let _ = connection.close().await;
            Err(ConnectError::Ping(e))
        }
        Err(_) => {
            let _ = connection.close().await;
            Err(ConnectError::Timeout(acquire_timeout))
        }
    }
}
