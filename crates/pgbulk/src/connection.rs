//! Connection pool for the bulk writer.
//!
//! Wraps a sqlx [`PgPool`]. Only establishing the pool is retried, with
//! exponential backoff; statements are never retried here.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::{BulkError, Result};

/// Environment variable overriding [`PoolConfig::min_connections`].
pub const ENV_MIN_CONNECTIONS: &str = "PGBULK_MIN_CONNECTIONS";
/// Environment variable overriding [`PoolConfig::max_connections`].
pub const ENV_MAX_CONNECTIONS: &str = "PGBULK_MAX_CONNECTIONS";
/// Environment variable overriding [`PoolConfig::connect_timeout`] (seconds).
pub const ENV_CONNECT_TIMEOUT: &str = "PGBULK_CONNECT_TIMEOUT";

/// Retry policy for establishing the pool.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = fail immediately)
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Delay growth per attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay before retry `attempt` (0-indexed), capped at `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((delay_ms as u64).min(self.max_delay_ms))
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    /// Acquire timeout in seconds
    pub connect_timeout: u64,
    /// Maximum lifetime of a connection in seconds
    pub max_lifetime: Option<u64>,
    /// Idle timeout in seconds
    pub idle_timeout: Option<u64>,
    pub retry: RetryConfig,
    /// Prepared statements cached per connection; 0 disables the cache.
    /// Bulk statements vary with batch size, so a small cache is usually enough.
    pub statement_cache_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            connect_timeout: 30,
            max_lifetime: Some(1800), // 30 minutes
            idle_timeout: Some(600),  // 10 minutes
            retry: RetryConfig::default(),
            statement_cache_capacity: 100,
        }
    }
}

impl PoolConfig {
    /// Defaults overridden by `PGBULK_MIN_CONNECTIONS`,
    /// `PGBULK_MAX_CONNECTIONS` and `PGBULK_CONNECT_TIMEOUT`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a variable is set but not a valid number.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PoolConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, ENV_MIN_CONNECTIONS)? {
            config.min_connections = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_CONNECTIONS)? {
            config.max_connections = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_CONNECT_TIMEOUT)? {
            config.connect_timeout = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Checks pool bounds.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(BulkError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(BulkError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            BulkError::Configuration(format!("Invalid {}='{}': {}", key, raw, e))
        }),
    }
}

/// Pooled PostgreSQL connection handle.
#[derive(Clone)]
pub struct Connection {
    pool: PgPool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("size", &self.pool.size())
            .field("num_idle", &self.pool.num_idle())
            .finish()
    }
}

impl Connection {
    /// Creates the pool, retrying failed attempts per `config.retry`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty or malformed URI or bad pool
    /// bounds, and a connection error if every attempt fails.
    #[instrument(skip(uri), fields(
        min_connections = config.min_connections,
        max_connections = config.max_connections,
        max_retries = config.retry.max_retries
    ))]
    pub async fn new(uri: &str, config: PoolConfig) -> Result<Self> {
        if uri.is_empty() {
            return Err(BulkError::Configuration(
                "Connection URI cannot be empty".to_string(),
            ));
        }
        config.validate()?;

        info!("Initializing connection pool");

        let mut pool_options = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout));
        if let Some(secs) = config.max_lifetime {
            pool_options = pool_options.max_lifetime(Duration::from_secs(secs));
        }
        if let Some(secs) = config.idle_timeout {
            pool_options = pool_options.idle_timeout(Duration::from_secs(secs));
        }

        let connect_options = PgConnectOptions::from_str(uri)
            .map_err(|e| BulkError::Configuration(format!("Invalid connection URI: {}", e)))?
            .statement_cache_capacity(config.statement_cache_capacity);

        let pool = connect_with_retry(pool_options, connect_options, &config.retry).await?;

        info!("Connection pool initialized");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Pings the database to verify connectivity.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn connect_with_retry(
    pool_options: PgPoolOptions,
    connect_options: PgConnectOptions,
    retry: &RetryConfig,
) -> Result<PgPool> {
    let mut attempt = 0;
    loop {
        match pool_options.clone().connect_with(connect_options.clone()).await {
            Ok(pool) => {
                if attempt > 0 {
                    info!(attempt, "Connection established after retry");
                }
                return Ok(pool);
            }
            Err(e) if attempt < retry.max_retries => {
                let delay = retry.delay_for_attempt(attempt);
                warn!(
                    attempt,
                    max_retries = retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Connection failed, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(BulkError::from(e)),
        }
    }
}
