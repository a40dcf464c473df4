//! Event store configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Environment variable holding the `PostgreSQL` connection string.
pub const DATABASE_URL: &str = "DATABASE_URL";
/// Environment variable holding the pool size.
pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// An environment variable is set to something unusable.
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Connection settings for the event store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStoreConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
}

impl EventStoreConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing or
    /// `DATABASE_MAX_CONNECTIONS` is not a positive number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing(DATABASE_URL))?;
        let max_connections =
            parse_or(&lookup, DATABASE_MAX_CONNECTIONS, DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: DATABASE_MAX_CONNECTIONS,
                value: max_connections.to_string(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            database_url,
            max_connections,
        })
    }

    /// Opens a connection pool with these settings.
    ///
    /// # Errors
    ///
    /// Returns the `sqlx` error if the database cannot be reached.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&self.database_url)
            .await
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}
