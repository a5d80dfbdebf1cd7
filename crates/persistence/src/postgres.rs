//! PostgreSQL connection factory.

use async_trait::async_trait;
use deadpool::managed::{Manager, Metrics, RecycleResult};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{ConnectOptions, Connection, PgConnection};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};
use crate::pool::ConnectionFactory;

const APPLICATION_NAME: &str = "tutorials";

/// Opens `PgConnection`s from a [`DatabaseConfig`].
///
/// The configuration is only interpreted here, so a bad port or an
/// unsupported dialect surfaces as a terminal error on the first connect.
#[derive(Debug, Clone)]
pub struct PgConnectionFactory {
    config: DatabaseConfig,
}

impl PgConnectionFactory {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Builds connect options from the configuration.
    pub fn connect_options(&self) -> StoreResult<PgConnectOptions> {
        let config = &self.config;

        match config.dialect.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => {}
            other => {
                return Err(StoreError::Terminal(format!(
                    "Unsupported database dialect: {}",
                    other
                )))
            }
        }

        let port: u16 = config
            .port
            .trim()
            .parse()
            .map_err(|_| StoreError::Terminal(format!("Invalid database port: {}", config.port)))?;

        let ssl_mode = if config.tls_enabled {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        };

        Ok(PgConnectOptions::new()
            .host(&config.host)
            .port(port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(ssl_mode)
            .application_name(APPLICATION_NAME))
    }
}

impl Manager for PgConnectionFactory {
    type Type = PgConnection;
    type Error = StoreError;

    async fn create(&self) -> StoreResult<PgConnection> {
        let options = self.connect_options()?;
        debug!(db = %self.config.display_target(), "Opening database connection");
        Ok(options.connect().await?)
    }

    // Broken connections are caught by the statement that hits them; the
    // manager discards those before they come back.
    async fn recycle(
        &self,
        _conn: &mut PgConnection,
        _: &Metrics,
    ) -> RecycleResult<StoreError> {
        Ok(())
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn ping(&self, conn: &mut PgConnection) -> StoreResult<()> {
        Ok(conn.ping().await?)
    }
}
