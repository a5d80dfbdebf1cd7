//! Bounded connection pool with idle eviction, on top of `deadpool`.
//!
//! `deadpool` enforces `live <= max`, hands idle connections out LIFO and
//! bounds both the wait for a free slot and the connect itself. On top of it
//! this module warms `min` connections at start-up and runs a reaper that
//! closes connections idle longer than `idle_timeout`, never going below
//! `min`, then tops the pool back up to `min`.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool::managed::{self, Manager, Object, PoolError, QueueMode, TimeoutType, Timeouts};
use deadpool::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult, TransientKind};

/// Opens physical connections for a [`Pool`] and checks them for liveness.
///
/// Connection creation and recycling come from [`deadpool::managed::Manager`].
#[async_trait]
pub trait ConnectionFactory: Manager<Error = StoreError> + 'static {
    /// Runs a trivial round trip on the connection.
    async fn ping(&self, conn: &mut Self::Type) -> StoreResult<()>;
}

/// A checked-out connection. Dropping it returns it to the pool.
pub type PooledConnection<F> = Object<F>;

/// Pool sizing and timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    pub max: u32,
    pub min: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub evict_interval: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max: 10,
            min: 2,
            acquire_timeout: Duration::from_millis(30_000),
            idle_timeout: Duration::from_millis(10_000),
            evict_interval: Duration::from_millis(1_000),
        }
    }
}

impl PoolOptions {
    /// Clamps the options so the pool invariants can hold (`1 <= max`, `min <= max`,
    /// non-zero eviction cadence).
    fn normalized(mut self) -> Self {
        if self.max == 0 {
            warn!("Pool max of 0 is unusable, using 1");
            self.max = 1;
        }
        if self.min > self.max {
            warn!(min = self.min, max = self.max, "Pool min exceeds max, clamping");
            self.min = self.max;
        }
        if self.evict_interval.is_zero() {
            self.evict_interval = Duration::from_millis(1);
        }
        self
    }
}

/// Snapshot of the pool state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Live connections, idle and checked out.
    pub size: u32,
    pub idle: u32,
    pub max: u32,
    pub min: u32,
}

impl PoolStatus {
    /// Connections currently checked out.
    pub fn active(&self) -> u32 {
        self.size.saturating_sub(self.idle)
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} connections ({} idle)",
            self.size, self.max, self.idle
        )
    }
}

/// Connection pool shared by every clone of the connection manager.
pub struct Pool<F: ConnectionFactory> {
    inner: managed::Pool<F>,
    options: Arc<PoolOptions>,
    reaper: Arc<JoinHandle<()>>,
}

impl<F: ConnectionFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            options: Arc::clone(&self.options),
            reaper: Arc::clone(&self.reaper),
        }
    }
}

impl<F: ConnectionFactory> Pool<F> {
    /// Builds the pool, opens up to `min` connections and starts the reaper.
    ///
    /// A warm-up connect that fails or exceeds the acquire timeout is logged
    /// and skipped; the reaper keeps trying to reach `min` afterwards.
    pub async fn init(factory: F, options: PoolOptions) -> StoreResult<Self> {
        let options = options.normalized();
        let inner = managed::Pool::builder(factory)
            .max_size(options.max as usize)
            .wait_timeout(Some(options.acquire_timeout))
            .create_timeout(Some(options.acquire_timeout))
            .recycle_timeout(Some(options.acquire_timeout))
            .queue_mode(QueueMode::Lifo)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StoreError::terminal(format!("Invalid pool configuration: {}", e)))?;

        let options = Arc::new(options);
        let mut warm = Vec::with_capacity(options.min as usize);
        for _ in 0..options.min {
            match inner.get().await {
                Ok(conn) => warm.push(conn),
                Err(err) => {
                    let err = map_pool_error(&options, err);
                    warn!(error = %err, opened = warm.len(), "Could not warm pool to min");
                    break;
                }
            }
        }
        drop(warm);

        let reaper = Arc::new(spawn_reaper(inner.clone(), Arc::clone(&options)));
        Ok(Self {
            inner,
            options,
            reaper,
        })
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn factory(&self) -> &F {
        self.inner.manager()
    }

    /// Checks out a connection, opening one if none is idle and `size < max`.
    ///
    /// Fails with [`StoreError::PoolExhausted`] when no slot frees up within the
    /// acquire timeout.
    pub async fn acquire(&self) -> StoreResult<PooledConnection<F>> {
        self.inner
            .get()
            .await
            .map_err(|err| map_pool_error(&self.options, err))
    }

    /// Returns a healthy connection to the idle set.
    pub fn release(&self, conn: PooledConnection<F>) {
        drop(conn);
    }

    /// Removes a connection from the pool and closes it.
    pub fn discard(&self, conn: PooledConnection<F>) {
        drop(Object::take(conn));
    }

    pub fn status(&self) -> PoolStatus {
        let status = self.inner.status();
        PoolStatus {
            size: status.size as u32,
            idle: status.available as u32,
            max: status.max_size as u32,
            min: self.options.min,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Stops the reaper, closes idle connections and rejects further acquires.
    /// Checked-out connections are closed when they come back.
    pub fn close(&self) {
        self.reaper.abort();
        self.inner.close();
        info!("Connection pool closed");
    }
}

fn map_pool_error(options: &PoolOptions, err: PoolError<StoreError>) -> StoreError {
    let limit_ms = options.acquire_timeout.as_millis() as u64;
    match err {
        PoolError::Timeout(TimeoutType::Wait) => {
            warn!(waited_ms = limit_ms, "Connection pool exhausted");
            StoreError::PoolExhausted {
                waited_ms: limit_ms,
            }
        }
        PoolError::Timeout(TimeoutType::Create) => StoreError::transient(
            TransientKind::ConnectionTimedOut,
            format!("Connection not established within {} ms", limit_ms),
        ),
        PoolError::Timeout(TimeoutType::Recycle) => StoreError::transient(
            TransientKind::Connection,
            format!("Connection not recycled within {} ms", limit_ms),
        ),
        PoolError::Backend(err) => err,
        PoolError::Closed => StoreError::terminal("Connection pool is closed"),
        other => StoreError::terminal(other.to_string()),
    }
}

fn spawn_reaper<F: ConnectionFactory>(
    pool: managed::Pool<F>,
    options: Arc<PoolOptions>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(options.evict_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            if pool.is_closed() {
                break;
            }
            evict_idle(&pool, &options);
            top_up(&pool, &options).await;
        }
    })
}

fn evict_idle<F: ConnectionFactory>(pool: &managed::Pool<F>, options: &PoolOptions) {
    let size = pool.status().size;
    let budget = Cell::new(size.saturating_sub(options.min as usize));
    if budget.get() == 0 {
        return;
    }

    let evicted = Cell::new(0usize);
    let _ = pool.retain(|_, metrics| {
        if budget.get() > 0 && metrics.last_used() >= options.idle_timeout {
            budget.set(budget.get() - 1);
            evicted.set(evicted.get() + 1);
            false
        } else {
            true
        }
    });

    if evicted.get() > 0 {
        debug!(evicted = evicted.get(), "Evicted idle connections");
    }
}

async fn top_up<F: ConnectionFactory>(pool: &managed::Pool<F>, options: &PoolOptions) {
    let status = pool.status();
    let missing = (options.min as usize).saturating_sub(status.size);
    if missing == 0 {
        return;
    }

    // Never wait for a slot; connects stay bounded by the acquire timeout.
    let timeouts = Timeouts {
        wait: Some(Duration::ZERO),
        create: Some(options.acquire_timeout),
        recycle: Some(options.acquire_timeout),
    };

    // Idle connections are handed out first, so hold them while opening.
    let mut held = Vec::with_capacity(status.available + missing);
    for _ in 0..status.available + missing {
        match pool.timeout_get(&timeouts).await {
            Ok(conn) => held.push(conn),
            Err(err) => {
                debug!(error = %map_pool_error(options, err), "Pool top-up stopped");
                break;
            }
        }
    }
}
