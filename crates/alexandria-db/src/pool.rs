//! Database connection pool management.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, error, info, warn};

use alexandria_core::defaults;
use alexandria_core::{Error, Result};

/// Pool sizing, timeouts and the startup retry budget.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Also bounds each attempt made by [`connect_with_retry`].
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Option<Duration>,
    /// Attempts made by [`connect_with_retry`] before giving up.
    pub connect_attempts: u32,
    /// Fixed delay between attempts.
    pub connect_retry_delay: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::POOL_MAX_CONNECTIONS,
            min_connections: defaults::POOL_MIN_CONNECTIONS,
            connect_timeout: Duration::from_secs(defaults::POOL_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(defaults::POOL_IDLE_TIMEOUT_SECS),
            max_lifetime: Some(Duration::from_secs(defaults::POOL_MAX_LIFETIME_SECS)),
            connect_attempts: defaults::CONNECT_ATTEMPTS,
            connect_retry_delay: Duration::from_secs(defaults::CONNECT_RETRY_DELAY_SECS),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DB_MAX_CONNECTIONS` | `10` | Pool size ceiling |
    /// | `DB_CONNECT_ATTEMPTS` | `3` | Startup connection attempts |
    /// | `DB_CONNECT_RETRY_SECS` | `10` | Fixed delay between attempts |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_parse::<u32>("DB_MAX_CONNECTIONS") {
            config.max_connections = n.max(1);
        }
        if let Some(n) = env_parse::<u32>("DB_CONNECT_ATTEMPTS") {
            config.connect_attempts = n.max(1);
        }
        if let Some(secs) = env_parse::<u64>("DB_CONNECT_RETRY_SECS") {
            config.connect_retry_delay = Duration::from_secs(secs);
        }

        config
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the startup retry budget.
    pub fn connect_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.connect_retry_delay = delay;
        self
    }

    pub(crate) fn pool_options(&self) -> PgPoolOptions {
        let mut options = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout);

        if let Some(max_lifetime) = self.max_lifetime {
            options = options.max_lifetime(max_lifetime);
        }
        options
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Create a new PostgreSQL connection pool with custom configuration.
/// Makes a single attempt.
pub async fn create_pool_with_config(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "Creating database connection pool"
    );

    let pool = config
        .pool_options()
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Connect with the startup retry budget from `config`.
///
/// Makes `connect_attempts` attempts separated by a fixed
/// `connect_retry_delay`. When every attempt fails the store is unavailable
/// and [`Error::Unavailable`] is returned; callers are expected to fail fast.
pub async fn connect_with_retry(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let attempts = config.connect_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match create_pool_with_config(database_url, config).await {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                warn!(
                    subsystem = "db",
                    component = "pool",
                    op = "connect",
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Error connecting to database, retrying"
                );
                last_error = Some(e);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(config.connect_retry_delay).await;
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempt made".to_string());
    error!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        attempts,
        "Connection failed after all attempts"
    );
    Err(Error::Unavailable(format!(
        "after {} attempts, connection failed: {}",
        attempts, reason
    )))
}

/// Log pool size and idle count; WARN when no connection is idle.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections, potential exhaustion"
        );
    }
}
