//! Database connection configuration, read from the environment.
//!
//! Every variable is optional. Missing or unparseable numbers fall back to
//! their defaults; host, port and dialect are kept as given and only checked
//! when a connection is opened.

use std::fmt;
use std::time::Duration;

use crate::pool::PoolOptions;
use crate::retry::RetryPolicy;

pub const ENV_HOST: &str = "APP_HOST";
pub const ENV_USER: &str = "APP_USER";
pub const ENV_PASSWORD: &str = "APP_PASSWORD";
pub const ENV_DATABASE: &str = "APP_DB";
pub const ENV_PORT: &str = "DB_PORT";
pub const ENV_SSL_ENABLED: &str = "SSL_ENABLED";
pub const ENV_DIALECT: &str = "APP_DIALECT";

pub const ENV_POOL_MAX: &str = "DB_POOL_MAX";
pub const ENV_POOL_MIN: &str = "DB_POOL_MIN";
pub const ENV_POOL_ACQUIRE_MS: &str = "DB_POOL_ACQUIRE_MS";
pub const ENV_POOL_IDLE_MS: &str = "DB_POOL_IDLE_MS";
pub const ENV_POOL_EVICT_MS: &str = "DB_POOL_EVICT_MS";

pub const ENV_RETRY_MAX: &str = "DB_RETRY_MAX";
pub const ENV_RETRY_BACKOFF_BASE_MS: &str = "DB_RETRY_BACKOFF_BASE_MS";
pub const ENV_RETRY_BACKOFF_EXPONENT: &str = "DB_RETRY_BACKOFF_EXPONENT";
pub const ENV_RETRY_TIMEOUT_MS: &str = "DB_RETRY_TIMEOUT_MS";

/// Pool sizing, in the units the environment uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max: u32,
    pub min: u32,
    pub acquire_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub evict_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max: 10,
            min: 2,
            acquire_timeout_ms: 30_000,
            idle_timeout_ms: 10_000,
            evict_interval_ms: 1_000,
        }
    }
}

/// Retry tuning. A timeout of 0 disables the per-attempt limit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_exponent: f64,
    pub attempt_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 3_000,
            backoff_exponent: 1.5,
            attempt_timeout_ms: 10_000,
        }
    }
}

/// Immutable connection settings.
#[derive(Clone, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    /// Raw port string; parsed when connecting.
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub dialect: String,
    pub tls_enabled: bool,
    pub pool: PoolConfig,
    pub retry: RetryConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: "5432".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "tutorials".to_string(),
            dialect: "postgres".to_string(),
            tls_enabled: true,
            pool: PoolConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("dialect", &self.dialect)
            .field("tls_enabled", &self.tls_enabled)
            .field("pool", &self.pool)
            .field("retry", &self.retry)
            .finish()
    }
}

impl DatabaseConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from an arbitrary variable source.
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);

        Self {
            host: text(ENV_HOST, defaults.host),
            port: text(ENV_PORT, defaults.port),
            user: text(ENV_USER, defaults.user),
            password: text(ENV_PASSWORD, defaults.password),
            database: text(ENV_DATABASE, defaults.database),
            dialect: text(ENV_DIALECT, defaults.dialect),
            tls_enabled: lookup(ENV_SSL_ENABLED)
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.tls_enabled),
            pool: PoolConfig {
                max: parse_or(&lookup, ENV_POOL_MAX, defaults.pool.max),
                min: parse_or(&lookup, ENV_POOL_MIN, defaults.pool.min),
                acquire_timeout_ms: parse_or(
                    &lookup,
                    ENV_POOL_ACQUIRE_MS,
                    defaults.pool.acquire_timeout_ms,
                ),
                idle_timeout_ms: parse_or(&lookup, ENV_POOL_IDLE_MS, defaults.pool.idle_timeout_ms),
                evict_interval_ms: parse_or(
                    &lookup,
                    ENV_POOL_EVICT_MS,
                    defaults.pool.evict_interval_ms,
                ),
            },
            retry: RetryConfig {
                max_attempts: parse_or(&lookup, ENV_RETRY_MAX, defaults.retry.max_attempts),
                backoff_base_ms: parse_or(
                    &lookup,
                    ENV_RETRY_BACKOFF_BASE_MS,
                    defaults.retry.backoff_base_ms,
                ),
                backoff_exponent: parse_or(
                    &lookup,
                    ENV_RETRY_BACKOFF_EXPONENT,
                    defaults.retry.backoff_exponent,
                ),
                attempt_timeout_ms: parse_or(
                    &lookup,
                    ENV_RETRY_TIMEOUT_MS,
                    defaults.retry.attempt_timeout_ms,
                ),
            },
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max: self.pool.max,
            min: self.pool.min,
            acquire_timeout: Duration::from_millis(self.pool.acquire_timeout_ms),
            idle_timeout: Duration::from_millis(self.pool.idle_timeout_ms),
            evict_interval: Duration::from_millis(self.pool.evict_interval_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff_base: Duration::from_millis(self.retry.backoff_base_ms),
            backoff_exponent: self.retry.backoff_exponent,
            attempt_timeout: match self.retry.attempt_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }

    /// Longest a single store operation can run with these settings, retries
    /// included. `None` when attempts have no timeout.
    pub fn operation_budget(&self) -> Option<Duration> {
        self.retry_policy()
            .worst_case(self.pool_options().acquire_timeout)
    }

    /// `host:port/database`, safe to log.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

fn parse_or<L, T>(lookup: &L, key: &str, default: T) -> T
where
    L: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
