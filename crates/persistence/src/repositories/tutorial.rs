//! Tutorial repository for database operations.

use async_trait::async_trait;
use domain::models::{
    CreateTutorialRequest, NewTutorial, Tutorial, TutorialChanges, UpdateTutorialRequest,
};
use lazy_static::lazy_static;
use shared::pagination::{Page, PageRequest};
use sqlx::PgConnection;
use tracing::{debug, info};

use crate::entities::TutorialEntity;
use crate::error::StoreResult;
use crate::manager::ConnectionManager;
use crate::pool::ConnectionFactory;
use crate::schema::TUTORIALS;

/// Single statements against the tutorials table.
///
/// Implemented by every connection type the repository can run on. Each
/// method is exactly one round trip, except `select_page`, which reads the
/// page and the match count on the same connection.
#[async_trait]
pub trait TutorialStatements: Send {
    async fn create_table(&mut self) -> StoreResult<()>;

    async fn insert(&mut self, new: &NewTutorial) -> StoreResult<Tutorial>;

    /// All tutorials whose title contains `title_contains`, ignoring case.
    async fn select_all(&mut self, title_contains: Option<&str>) -> StoreResult<Vec<Tutorial>>;

    /// One page of matches and the total number of matches.
    async fn select_page(
        &mut self,
        title_contains: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Tutorial>, i64)>;

    async fn select_by_id(&mut self, id: i32) -> StoreResult<Option<Tutorial>>;

    async fn select_published(&mut self) -> StoreResult<Vec<Tutorial>>;

    /// Returns the number of rows changed.
    async fn update(&mut self, id: i32, changes: &TutorialChanges) -> StoreResult<u64>;

    async fn delete(&mut self, id: i32) -> StoreResult<u64>;

    async fn delete_all(&mut self) -> StoreResult<u64>;
}

lazy_static! {
    static ref CREATE_TABLE_SQL: String = TUTORIALS.create_table_sql();

    static ref INSERT_SQL: String = {
        let columns: Vec<_> = TUTORIALS.insertable().map(|c| c.quoted()).collect();
        let params: Vec<_> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            TUTORIALS.name,
            columns.join(", "),
            params.join(", "),
            TUTORIALS.select_list()
        )
    };

    static ref TITLE_FILTER: String = format!(
        "($1::text IS NULL OR {} ILIKE $1)",
        TUTORIALS.col("title")
    );

    static ref SELECT_ALL_SQL: String = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        TUTORIALS.select_list(),
        TUTORIALS.name,
        *TITLE_FILTER,
        TUTORIALS.col("id")
    );

    static ref SELECT_PAGE_SQL: String = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT $2 OFFSET $3",
        TUTORIALS.select_list(),
        TUTORIALS.name,
        *TITLE_FILTER,
        TUTORIALS.col("id")
    );

    static ref COUNT_SQL: String = format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        TUTORIALS.name,
        *TITLE_FILTER
    );

    static ref SELECT_BY_ID_SQL: String = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        TUTORIALS.select_list(),
        TUTORIALS.name,
        TUTORIALS.col("id")
    );

    static ref SELECT_PUBLISHED_SQL: String = format!(
        "SELECT {} FROM {} WHERE {} = true ORDER BY {}",
        TUTORIALS.select_list(),
        TUTORIALS.name,
        TUTORIALS.col("published"),
        TUTORIALS.col("id")
    );

    static ref UPDATE_SQL: String = format!(
        "UPDATE {table} SET {title} = COALESCE($2, {title}), \
         {description} = CASE WHEN $5 THEN $3 ELSE {description} END, \
         {published} = COALESCE($4, {published}), \
         {updated_at} = NOW() \
         WHERE {id} = $1",
        table = TUTORIALS.name,
        title = TUTORIALS.col("title"),
        description = TUTORIALS.col("description"),
        published = TUTORIALS.col("published"),
        updated_at = TUTORIALS.col("updated_at"),
        id = TUTORIALS.col("id")
    );

    static ref DELETE_SQL: String = format!(
        "DELETE FROM {} WHERE {} = $1",
        TUTORIALS.name,
        TUTORIALS.col("id")
    );

    static ref DELETE_ALL_SQL: String = format!("DELETE FROM {}", TUTORIALS.name);
}

/// `%term%` with the LIKE wildcards in `term` escaped.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl TutorialStatements for PgConnection {
    async fn create_table(&mut self) -> StoreResult<()> {
        sqlx::query(CREATE_TABLE_SQL.as_str())
            .execute(&mut *self)
            .await?;
        Ok(())
    }

    async fn insert(&mut self, new: &NewTutorial) -> StoreResult<Tutorial> {
        let entity = sqlx::query_as::<_, TutorialEntity>(INSERT_SQL.as_str())
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.published)
            .fetch_one(&mut *self)
            .await?;
        Ok(entity.into())
    }

    async fn select_all(&mut self, title_contains: Option<&str>) -> StoreResult<Vec<Tutorial>> {
        let rows = sqlx::query_as::<_, TutorialEntity>(SELECT_ALL_SQL.as_str())
            .bind(title_contains.map(like_pattern))
            .fetch_all(&mut *self)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn select_page(
        &mut self,
        title_contains: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Tutorial>, i64)> {
        let pattern = title_contains.map(like_pattern);

        let rows = sqlx::query_as::<_, TutorialEntity>(SELECT_PAGE_SQL.as_str())
            .bind(&pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *self)
            .await?;

        let total: (i64,) = sqlx::query_as(COUNT_SQL.as_str())
            .bind(&pattern)
            .fetch_one(&mut *self)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    async fn select_by_id(&mut self, id: i32) -> StoreResult<Option<Tutorial>> {
        let row = sqlx::query_as::<_, TutorialEntity>(SELECT_BY_ID_SQL.as_str())
            .bind(id)
            .fetch_optional(&mut *self)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn select_published(&mut self) -> StoreResult<Vec<Tutorial>> {
        let rows = sqlx::query_as::<_, TutorialEntity>(SELECT_PUBLISHED_SQL.as_str())
            .fetch_all(&mut *self)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(&mut self, id: i32, changes: &TutorialChanges) -> StoreResult<u64> {
        let result = sqlx::query(UPDATE_SQL.as_str())
            .bind(id)
            .bind(&changes.title)
            .bind(changes.description.clone().flatten())
            .bind(changes.published)
            .bind(changes.description.is_some())
            .execute(&mut *self)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&mut self, id: i32) -> StoreResult<u64> {
        let result = sqlx::query(DELETE_SQL.as_str())
            .bind(id)
            .execute(&mut *self)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&mut self) -> StoreResult<u64> {
        let result = sqlx::query(DELETE_ALL_SQL.as_str())
            .execute(&mut *self)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Repository for tutorial CRUD operations.
///
/// Every operation runs one statement through
/// [`ConnectionManager::execute_with_retry`].
pub struct TutorialRepository<F: ConnectionFactory> {
    manager: ConnectionManager<F>,
}

impl<F: ConnectionFactory> Clone for TutorialRepository<F> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<F> TutorialRepository<F>
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    /// Creates a new TutorialRepository on top of the given manager.
    pub fn new(manager: ConnectionManager<F>) -> Self {
        Self { manager }
    }

    /// Returns a reference to the connection manager.
    pub fn manager(&self) -> &ConnectionManager<F> {
        &self.manager
    }

    /// Create the tutorials table if it does not exist yet.
    pub async fn sync_schema(&self) -> StoreResult<()> {
        self.manager
            .execute_with_retry("sync_schema", |conn| conn.create_table())
            .await?;
        info!(table = TUTORIALS.name, "Schema synchronized");
        Ok(())
    }

    /// Create a tutorial. Fails with a validation error, without touching the
    /// store, when the title is missing or blank.
    pub async fn create(&self, request: CreateTutorialRequest) -> StoreResult<Tutorial> {
        let new = NewTutorial::try_from(request)?;

        let tutorial = self
            .manager
            .execute_with_retry("create", move |conn| {
                let new = new.clone();
                Box::pin(async move { conn.insert(&new).await })
            })
            .await?;

        debug!(id = tutorial.id, "Tutorial created");
        Ok(tutorial)
    }

    /// All tutorials, optionally filtered by a case-insensitive title substring.
    pub async fn find_all(&self, title_contains: Option<&str>) -> StoreResult<Vec<Tutorial>> {
        let filter = title_contains.map(str::to_owned);
        self.manager
            .execute_with_retry("find_all", move |conn| {
                let filter = filter.clone();
                Box::pin(async move { conn.select_all(filter.as_deref()).await })
            })
            .await
    }

    /// One page of [`find_all`](Self::find_all) results.
    pub async fn find_all_paged(
        &self,
        title_contains: Option<&str>,
        request: PageRequest,
    ) -> StoreResult<Page<Tutorial>> {
        let filter = title_contains.map(str::to_owned);
        let (items, total) = self
            .manager
            .execute_with_retry("find_all_paged", move |conn| {
                let filter = filter.clone();
                Box::pin(async move {
                    conn.select_page(filter.as_deref(), request.limit(), request.offset())
                        .await
                })
            })
            .await?;
        Ok(Page::new(items, total, request))
    }

    /// Find a tutorial by id. `None` when no row matches.
    pub async fn find_by_id(&self, id: i32) -> StoreResult<Option<Tutorial>> {
        self.manager
            .execute_with_retry("find_by_id", move |conn| conn.select_by_id(id))
            .await
    }

    /// Apply a partial update. Returns the number of rows changed, 0 when no
    /// tutorial has that id.
    pub async fn update(&self, id: i32, request: UpdateTutorialRequest) -> StoreResult<u64> {
        let changes = TutorialChanges::try_from(request)?;

        let affected = self
            .manager
            .execute_with_retry("update", move |conn| {
                let changes = changes.clone();
                Box::pin(async move { conn.update(id, &changes).await })
            })
            .await?;

        debug!(id, affected, "Tutorial updated");
        Ok(affected)
    }

    /// Delete one tutorial. Returns the number of rows deleted.
    pub async fn delete(&self, id: i32) -> StoreResult<u64> {
        self.manager
            .execute_with_retry("delete", move |conn| conn.delete(id))
            .await
    }

    /// Delete every tutorial. Returns the number of rows deleted.
    pub async fn delete_all(&self) -> StoreResult<u64> {
        let deleted = self
            .manager
            .execute_with_retry("delete_all", |conn| conn.delete_all())
            .await?;
        info!(deleted, "All tutorials deleted");
        Ok(deleted)
    }

    /// All published tutorials.
    pub async fn find_all_published(&self) -> StoreResult<Vec<Tutorial>> {
        self.manager
            .execute_with_retry("find_all_published", |conn| conn.select_published())
            .await
    }
}
