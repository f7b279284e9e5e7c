//! Database configuration and pool construction.

use std::env;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Postgres connection configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Maximum pool connections.
    pub max_connections: u32,
    /// Timeout for acquiring a connection from the pool.
    pub acquire_timeout: Duration,
}

impl DbConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`: Postgres connection string
    ///
    /// Optional:
    /// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ConfigMissing`] when `DATABASE_URL` is unset, so
    /// callers can fail fast at startup before accepting any work.
    pub fn from_env() -> Result<Self, DbError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| DbError::ConfigMissing {
            var: "DATABASE_URL".to_string(),
        })?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(5),
        })
    }

    /// Create a configuration from a connection string with defaults.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    /// Connect to the database and build a pool.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ConnectionFailed`] if the pool cannot be
    /// established.
    pub async fn connect(&self) -> Result<PgPool, DbError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await
            .map_err(DbError::ConnectionFailed)
    }
}
