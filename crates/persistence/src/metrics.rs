//! Store metrics collection.
//!
//! Provides functions for recording store operation, retry and pool metrics.

use metrics::{counter, gauge, histogram};
use std::time::Instant;

use crate::manager::OperationState;
use crate::pool::PoolStatus;

/// Record how long a single store attempt took.
pub fn record_query_duration(operation: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

/// Record the final state of a store operation.
pub fn record_operation(operation: &str, outcome: OperationState) {
    counter!(
        "database_operations_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record one retry of a store operation.
pub fn record_retry(operation: &str) {
    counter!(
        "database_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record connection pool gauges.
///
/// Call this function periodically to track pool health.
pub fn record_pool_metrics(status: &PoolStatus) {
    gauge!("database_connections_active").set(status.active() as f64);
    gauge!("database_connections_idle").set(status.idle as f64);
    gauge!("database_connections_total").set(status.size as f64);
    gauge!("database_connections_max").set(status.max as f64);
}

/// Times one attempt of a store operation.
///
/// ```ignore
/// let timer = QueryTimer::new("find_by_id");
/// let result = conn.select_by_id(id).await;
/// timer.record();
/// ```
pub struct QueryTimer {
    operation: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    /// Record the elapsed duration to metrics.
    pub fn record(self) {
        record_query_duration(self.operation, self.start.elapsed().as_secs_f64());
    }
}
