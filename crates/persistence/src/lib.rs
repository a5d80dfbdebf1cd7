//! Persistence layer for the tutorials backend.
//!
//! This crate contains:
//! - Connection configuration read from the environment
//! - A bounded connection pool and the retrying connection manager
//! - The static table schema, entity mappings and the tutorial repository
//! - An in-memory store for tests, behind the `test-support` feature

pub mod config;
pub mod entities;
pub mod error;
pub mod manager;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod metrics;
pub mod pool;
pub mod postgres;
pub mod repositories;
pub mod retry;
pub mod schema;

pub use config::DatabaseConfig;
pub use error::{StoreError, StoreResult, TransientKind};
pub use manager::{BoxFuture, ConnectionManager, OperationState};
#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryConnectionFactory, MemoryStore};
pub use pool::{ConnectionFactory, Pool, PoolOptions, PoolStatus, PooledConnection};
pub use postgres::PgConnectionFactory;
pub use repositories::{TutorialRepository, TutorialStatements};
pub use retry::RetryPolicy;
