use persistence::DatabaseConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Headroom on top of the store budget for the handler and serialization.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Built-in defaults, the lowest configuration layer.
const DEFAULTS: &str = r#"
    [server]
    host = "0.0.0.0"
    port = 8080

    [logging]
    level = "info"
    format = "json"

    [security]
    cors_origins = ["http://localhost:8081"]
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    /// Read from the `APP_*` / `DB_*` variables, not from the layered sources.
    #[serde(skip)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on a whole request. Derived from the database settings
    /// when unset; an explicit value must cover a fully retried store call.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from defaults, files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. built-in defaults
    /// 2. config/default.toml (optional)
    /// 3. config/local.toml - local overrides (optional, not in git)
    /// 4. Environment variables with TUTORIALS__ prefix
    ///
    /// Database settings come from [`DatabaseConfig::from_env`].
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("TUTORIALS")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins"),
            )
            .build()?;

        let mut cfg: Self = config.try_deserialize()?;
        cfg.database = DatabaseConfig::from_env();
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Uses only the built-in defaults and the overrides, so no files or
    /// environment variables leak into tests.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.pool.min > self.database.pool.max {
            return Err(ConfigValidationError::InvalidValue(
                "DB_POOL_MIN cannot exceed DB_POOL_MAX".to_string(),
            ));
        }

        if let Some(secs) = self.server.request_timeout_secs {
            let timeout = Duration::from_secs(secs);
            match self.database.operation_budget() {
                Some(budget) if timeout >= budget => {}
                Some(budget) => {
                    return Err(ConfigValidationError::InvalidValue(format!(
                        "request_timeout_secs ({}) must be at least {} s, the worst case of a retried store call",
                        secs,
                        budget.as_secs_f64().ceil()
                    )))
                }
                None => {
                    return Err(ConfigValidationError::InvalidValue(
                        "request_timeout_secs requires DB_RETRY_TIMEOUT_MS to be non-zero"
                            .to_string(),
                    ))
                }
            }
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(ConfigValidationError::InvalidValue(format!(
                "Unknown log format: {}",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Timeout applied to every request. `None` when store calls are
    /// unbounded and no explicit timeout is set.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.server.request_timeout_secs {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => self
                .database
                .operation_budget()
                .map(|budget| budget.saturating_add(REQUEST_TIMEOUT_MARGIN)),
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
