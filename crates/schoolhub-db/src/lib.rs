//! # SchoolHub DB
//!
//! PostgreSQL pool setup.
//!
//! - `DATABASE_URL`: connection string (required)
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
//! - `DATABASE_ACQUIRE_TIMEOUT_SECONDS`: wait for a free connection (default: 5)

use std::env;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

pub use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Reads the pool configuration. Fails when `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            url: env::var("DATABASE_URL")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            acquire_timeout: Duration::from_secs(
                env::var("DATABASE_ACQUIRE_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            ),
        })
    }

    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
    }
}

/// Connects a pool using the environment configuration.
///
/// # Panics
///
/// Panics when `DATABASE_URL` is missing or the database is unreachable;
/// the server cannot run without it.
pub async fn init_db_pool() -> PgPool {
    let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");

    let pool = config
        .pool_options()
        .connect(&config.url)
        .await
        .expect("Failed to connect to database");

    info!(max_connections = config.max_connections, "Database pool ready");
    pool
}
