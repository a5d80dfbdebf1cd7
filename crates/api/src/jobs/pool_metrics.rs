//! Background job to record connection pool metrics.

use persistence::{ConnectionFactory, ConnectionManager};

use super::scheduler::{Job, JobFrequency};

/// Job that periodically records connection pool gauges.
pub struct PoolMetricsJob<F: ConnectionFactory> {
    manager: ConnectionManager<F>,
}

impl<F: ConnectionFactory> PoolMetricsJob<F> {
    /// Create a new pool metrics job.
    pub fn new(manager: ConnectionManager<F>) -> Self {
        Self { manager }
    }
}

#[async_trait::async_trait]
impl<F: ConnectionFactory> Job for PoolMetricsJob<F> {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(10)
    }

    async fn execute(&self) -> Result<(), String> {
        persistence::metrics::record_pool_metrics(&self.manager.status());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::{MemoryStore, PoolOptions, RetryPolicy};

    #[tokio::test]
    async fn test_pool_metrics_job() {
        let store = MemoryStore::new();
        let manager =
            ConnectionManager::init(store.factory(), PoolOptions::default(), RetryPolicy::default())
                .await
                .unwrap();
        let job = PoolMetricsJob::new(manager);

        assert_eq!(job.name(), "pool_metrics");
        assert_eq!(job.frequency().duration().as_secs(), 10);
        assert!(job.execute().await.is_ok());
    }
}
