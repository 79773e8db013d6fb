//! Database module for handling PostgreSQL connections and operations
//!
//! This module provides connection pooling, configuration, and health checks
//! for the PostgreSQL database backing users and sessions.

use crate::error::{DatabaseError, DatabaseResult};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Pool, Postgres};
use std::env;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_PORT: u16 = 5432;
const DEFAULT_POOL_SIZE: u32 = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database server host name
    pub host: String,
    /// Login role
    pub user: String,
    /// Login password
    pub password: String,
    /// Database name
    pub database: String,
    /// Server port
    pub port: u16,
    /// Maximum number of connections in the pool
    pub pool_size: u32,
    /// Upper bound for acquiring a connection and for each statement
    pub connection_timeout: Duration,
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`: required
    /// - `DB_PORT`: server port (default: 5432)
    /// - `DB_POOL_SIZE`: maximum pool connections (default: 5)
    /// - `DB_TIMEOUT`: connection timeout in seconds (default: 10)
    pub fn from_env() -> DatabaseResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Every required key is checked before returning so that startup fails
    /// on the first call rather than on the first query.
    pub fn from_lookup<F>(lookup: F) -> DatabaseResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> DatabaseResult<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    DatabaseError::Configuration(format!(
                        "Missing required environment variable: {}",
                        key
                    ))
                })
        };

        let host = required("DB_HOST")?;
        let user = required("DB_USER")?;
        let password = required("DB_PASSWORD")?;
        let database = required("DB_NAME")?;

        let port = parse_or(&lookup, "DB_PORT", DEFAULT_PORT)?;
        let pool_size = parse_or(&lookup, "DB_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        let timeout_secs = parse_or(&lookup, "DB_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;

        if pool_size == 0 {
            return Err(DatabaseError::Configuration(
                "DB_POOL_SIZE must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host,
            user,
            password,
            database,
            port,
            pool_size,
            connection_timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> DatabaseResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            DatabaseError::Configuration(format!("Invalid value for {}: {}", key, e))
        }),
    }
}

/// Initialize a PostgreSQL connection pool
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// * `DatabaseResult<Pool<Postgres>>` - PostgreSQL connection pool or error
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<Pool<Postgres>> {
    info!(
        host = %config.host,
        database = %config.database,
        pool_size = config.pool_size,
        "Initializing database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(config.connection_timeout)
        .connect_with(config.connect_options())
        .await
        .map_err(DatabaseError::Connection)?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Check database connectivity
///
/// # Returns
///
/// * `DatabaseResult<bool>` - True if the probe query succeeded, false otherwise
pub async fn health_check(pool: &PgPool) -> DatabaseResult<bool> {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => Ok(true),
        Err(e) => {
            error!("Database health check failed: {}", e);
            Ok(false)
        }
    }
}
