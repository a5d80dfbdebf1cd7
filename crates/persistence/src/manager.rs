//! Connection manager: pooled connections plus bounded retry.
//!
//! The manager owns the pool for the whole process. It is created once with
//! [`ConnectionManager::init`], cloned into whatever needs store access and
//! torn down with [`ConnectionManager::shutdown`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::error::{StoreError, StoreResult, TransientKind};
use crate::metrics::{record_operation, record_retry, QueryTimer};
use crate::pool::{ConnectionFactory, Pool, PoolOptions, PoolStatus, PooledConnection};
use crate::retry::RetryPolicy;

/// Boxed, sendable future borrowing for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle of one logical store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Acquiring,
    Acquired,
    Executing,
    Succeeded,
    TransientFailure,
    Exhausted,
    TerminalFailure,
    PoolExhausted,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Pending => "pending",
            OperationState::Acquiring => "acquiring",
            OperationState::Acquired => "acquired",
            OperationState::Executing => "executing",
            OperationState::Succeeded => "succeeded",
            OperationState::TransientFailure => "transient_failure",
            OperationState::Exhausted => "exhausted",
            OperationState::TerminalFailure => "terminal_failure",
            OperationState::PoolExhausted => "pool_exhausted",
        }
    }

    /// Whether the operation is finished in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Succeeded
                | OperationState::Exhausted
                | OperationState::TerminalFailure
                | OperationState::PoolExhausted
        )
    }

    fn after_failure(err: &StoreError, attempts_left: bool) -> Self {
        match err {
            StoreError::PoolExhausted { .. } => OperationState::PoolExhausted,
            StoreError::Transient { .. } if attempts_left => OperationState::TransientFailure,
            StoreError::Transient { .. } => OperationState::Exhausted,
            _ => OperationState::TerminalFailure,
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide gateway to the store.
pub struct ConnectionManager<F: ConnectionFactory> {
    pool: Pool<F>,
    retry: RetryPolicy,
}

impl<F: ConnectionFactory> Clone for ConnectionManager<F> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<F: ConnectionFactory> ConnectionManager<F> {
    /// Builds the pool and warms its minimum connections.
    pub async fn init(factory: F, options: PoolOptions, retry: RetryPolicy) -> StoreResult<Self> {
        info!(
            max = options.max,
            min = options.min,
            acquire_timeout_ms = options.acquire_timeout.as_millis() as u64,
            max_attempts = retry.max_attempts,
            "Initializing connection manager"
        );
        let pool = Pool::init(factory, options).await?;
        info!("{}", pool.status());
        Ok(Self { pool, retry })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn pool(&self) -> &Pool<F> {
        &self.pool
    }

    /// Draws a connection, waiting up to the acquire timeout.
    pub async fn acquire_connection(&self) -> StoreResult<PooledConnection<F>> {
        self.pool.acquire().await
    }

    /// Hands a connection back to the pool.
    pub fn release_connection(&self, conn: PooledConnection<F>) {
        self.pool.release(conn);
    }

    /// Runs `op` on a pooled connection, retrying transient failures with
    /// exponential backoff.
    ///
    /// Each attempt gets a fresh connection and runs `op` once. Anything that is
    /// not [`StoreError::Transient`] is returned straight away; a transient error
    /// on the last attempt is returned as-is.
    pub async fn execute_with_retry<T, Op>(
        &self,
        operation: &'static str,
        mut op: Op,
    ) -> StoreResult<T>
    where
        T: Send,
        Op: for<'c> FnMut(&'c mut F::Type) -> BoxFuture<'c, StoreResult<T>> + Send,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        trace!(operation, state = %OperationState::Pending);

        loop {
            let timer = QueryTimer::new(operation);
            let result = self.attempt(operation, &mut op).await;
            timer.record();

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Store operation succeeded after retry");
                    }
                    trace!(operation, state = %OperationState::Succeeded);
                    record_operation(operation, OperationState::Succeeded);
                    return Ok(value);
                }
                Err(err) => {
                    let state = OperationState::after_failure(&err, attempt < max_attempts);
                    trace!(operation, attempt, state = %state);

                    match state {
                        OperationState::TransientFailure => {
                            let delay = self.retry.backoff(attempt);
                            warn!(
                                operation,
                                attempt,
                                max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "Store operation failed, retrying"
                            );
                            record_retry(operation);
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        OperationState::Exhausted => {
                            error!(
                                operation,
                                attempts = attempt,
                                error = %err,
                                "Store operation failed after all retries"
                            );
                            record_operation(operation, state);
                            return Err(err);
                        }
                        _ => {
                            debug!(operation, error = %err, "Store operation failed");
                            record_operation(operation, state);
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    async fn attempt<T, Op>(&self, operation: &'static str, op: &mut Op) -> StoreResult<T>
    where
        Op: for<'c> FnMut(&'c mut F::Type) -> BoxFuture<'c, StoreResult<T>> + Send,
    {
        trace!(operation, state = %OperationState::Acquiring);
        let mut conn = self.pool.acquire().await?;
        trace!(operation, state = %OperationState::Acquired);

        trace!(operation, state = %OperationState::Executing);
        let statement = op(&mut *conn);
        let result = match self.retry.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, statement).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::transient(
                    TransientKind::Timeout,
                    format!("{} timed out after {} ms", operation, limit.as_millis()),
                )),
            },
            None => statement.await,
        };

        match &result {
            Err(err) if err.poisons_connection() => self.pool.discard(conn),
            _ => self.pool.release(conn),
        }
        result
    }

    /// One round trip to the store, without retry. Returns its latency.
    pub async fn ping(&self) -> StoreResult<Duration> {
        let started = Instant::now();
        let mut conn = self.pool.acquire().await?;
        match self.pool.factory().ping(&mut *conn).await {
            Ok(()) => {
                self.pool.release(conn);
                Ok(started.elapsed())
            }
            Err(err) => {
                self.pool.discard(conn);
                Err(err)
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Closes the pool. Later operations fail with a terminal error.
    pub async fn shutdown(&self) {
        info!("Shutting down connection manager");
        self.pool.close();
    }
}
