//! In-memory tutorial store.
//!
//! Behaves like the `tutorials` table closely enough to exercise the
//! repository, the pool and the retry policy without a database. Faults can
//! be queued on the store to make the next statements or connects fail.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deadpool::managed::{Manager, Metrics, RecycleResult};
use domain::models::{NewTutorial, Tutorial, TutorialChanges};

use crate::error::{StoreError, StoreResult};
use crate::pool::ConnectionFactory;
use crate::repositories::TutorialStatements;

#[derive(Default)]
struct MemoryState {
    rows: BTreeMap<i32, Tutorial>,
    next_id: i32,
    statement_faults: VecDeque<StoreError>,
    connect_faults: VecDeque<StoreError>,
    connects: u32,
    statements: u32,
}

/// Shared handle to an in-memory table.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A connection factory over this store.
    pub fn factory(&self) -> MemoryConnectionFactory {
        MemoryConnectionFactory {
            store: self.clone(),
            latency: None,
            connect_delay: None,
        }
    }

    /// Makes the next statements fail with the given errors, in order.
    pub fn fail_next_statements(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.lock().statement_faults.extend(errors);
    }

    /// Makes the next connection attempts fail with the given errors, in order.
    pub fn fail_next_connects(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.lock().connect_faults.extend(errors);
    }

    /// Connections opened so far.
    pub fn connects(&self) -> u32 {
        self.lock().connects
    }

    /// Statements executed so far, failed ones included.
    pub fn statements(&self) -> u32 {
        self.lock().statements
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin_statement(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        state.statements += 1;
        match state.statement_faults.pop_front() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

/// Opens [`MemoryConnection`]s.
#[derive(Clone)]
pub struct MemoryConnectionFactory {
    store: MemoryStore,
    latency: Option<Duration>,
    connect_delay: Option<Duration>,
}

impl MemoryConnectionFactory {
    /// Adds a delay to every statement.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds a delay to every connect.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }
}

impl Manager for MemoryConnectionFactory {
    type Type = MemoryConnection;
    type Error = StoreError;

    async fn create(&self) -> StoreResult<MemoryConnection> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.store.lock();
        if let Some(err) = state.connect_faults.pop_front() {
            return Err(err);
        }
        state.connects += 1;
        Ok(MemoryConnection {
            store: self.store.clone(),
            latency: self.latency,
        })
    }

    async fn recycle(
        &self,
        _conn: &mut MemoryConnection,
        _: &Metrics,
    ) -> RecycleResult<StoreError> {
        Ok(())
    }
}

#[async_trait]
impl ConnectionFactory for MemoryConnectionFactory {
    async fn ping(&self, conn: &mut MemoryConnection) -> StoreResult<()> {
        conn.delay().await;
        drop(conn.store.begin_statement()?);
        Ok(())
    }
}

/// A connection to a [`MemoryStore`].
pub struct MemoryConnection {
    store: MemoryStore,
    latency: Option<Duration>,
}

impl MemoryConnection {
    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn title_matches(tutorial: &Tutorial, title_contains: Option<&str>) -> bool {
    match title_contains {
        Some(term) => tutorial
            .title
            .to_lowercase()
            .contains(&term.to_lowercase()),
        None => true,
    }
}

#[async_trait]
impl TutorialStatements for MemoryConnection {
    async fn create_table(&mut self) -> StoreResult<()> {
        self.delay().await;
        drop(self.store.begin_statement()?);
        Ok(())
    }

    async fn insert(&mut self, new: &NewTutorial) -> StoreResult<Tutorial> {
        self.delay().await;
        let mut state = self.store.begin_statement()?;
        state.next_id += 1;
        let now = Utc::now();
        let tutorial = Tutorial {
            id: state.next_id,
            title: new.title.clone(),
            description: new.description.clone(),
            published: new.published,
            created_at: now,
            updated_at: now,
        };
        state.rows.insert(tutorial.id, tutorial.clone());
        Ok(tutorial)
    }

    async fn select_all(&mut self, title_contains: Option<&str>) -> StoreResult<Vec<Tutorial>> {
        self.delay().await;
        let state = self.store.begin_statement()?;
        Ok(state
            .rows
            .values()
            .filter(|t| title_matches(t, title_contains))
            .cloned()
            .collect())
    }

    async fn select_page(
        &mut self,
        title_contains: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Tutorial>, i64)> {
        self.delay().await;
        let state = self.store.begin_statement()?;
        let matches: Vec<&Tutorial> = state
            .rows
            .values()
            .filter(|t| title_matches(t, title_contains))
            .collect();
        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn select_by_id(&mut self, id: i32) -> StoreResult<Option<Tutorial>> {
        self.delay().await;
        let state = self.store.begin_statement()?;
        Ok(state.rows.get(&id).cloned())
    }

    async fn select_published(&mut self) -> StoreResult<Vec<Tutorial>> {
        self.delay().await;
        let state = self.store.begin_statement()?;
        Ok(state.rows.values().filter(|t| t.published).cloned().collect())
    }

    async fn update(&mut self, id: i32, changes: &TutorialChanges) -> StoreResult<u64> {
        self.delay().await;
        let mut state = self.store.begin_statement()?;
        let Some(row) = state.rows.get_mut(&id) else {
            return Ok(0);
        };
        if let Some(title) = &changes.title {
            row.title = title.clone();
        }
        if let Some(description) = &changes.description {
            row.description = description.clone();
        }
        if let Some(published) = changes.published {
            row.published = published;
        }
        row.updated_at = Utc::now();
        Ok(1)
    }

    async fn delete(&mut self, id: i32) -> StoreResult<u64> {
        self.delay().await;
        let mut state = self.store.begin_statement()?;
        Ok(state.rows.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_all(&mut self) -> StoreResult<u64> {
        self.delay().await;
        let mut state = self.store.begin_statement()?;
        let deleted = state.rows.len() as u64;
        state.rows.clear();
        Ok(deleted)
    }
}
