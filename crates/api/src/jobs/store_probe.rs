//! Background job that checks the store is reachable.

use metrics::gauge;
use persistence::{ConnectionFactory, ConnectionManager};
use tracing::debug;

use super::scheduler::{Job, JobFrequency};

/// Pings the store and publishes `database_up` and `database_ping_seconds`.
pub struct StoreProbeJob<F: ConnectionFactory> {
    manager: ConnectionManager<F>,
}

impl<F: ConnectionFactory> StoreProbeJob<F> {
    pub fn new(manager: ConnectionManager<F>) -> Self {
        Self { manager }
    }
}

#[async_trait::async_trait]
impl<F: ConnectionFactory> Job for StoreProbeJob<F> {
    fn name(&self) -> &'static str {
        "store_probe"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(30)
    }

    async fn execute(&self) -> Result<(), String> {
        match self.manager.ping().await {
            Ok(latency) => {
                gauge!("database_up").set(1.0);
                gauge!("database_ping_seconds").set(latency.as_secs_f64());
                debug!(latency_ms = latency.as_millis() as u64, "Store reachable");
                Ok(())
            }
            Err(e) => {
                gauge!("database_up").set(0.0);
                Err(format!("Store unreachable: {}", e))
            }
        }
    }
}
