//! Tutorial endpoint handlers.
//!
//! Store calls run on their own task: a client that disconnects or hits the
//! request timeout does not cancel a statement midway through its retries.

use std::future::Future;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::models::tutorial::{
    CreateTutorialRequest, ListTutorialsQuery, MessageResponse, Tutorial, TutorialPageResponse,
    UpdateTutorialRequest,
};
use persistence::{ConnectionFactory, StoreResult, TutorialStatements};
use shared::pagination::PageRequest;
use tracing::error;

use crate::app::AppState;
use crate::error::ApiError;

fn not_found(id: i32) -> ApiError {
    ApiError::NotFound(format!("Tutorial with id={} was not found", id))
}

async fn detached<T, Fut>(call: Fut) -> Result<T, ApiError>
where
    Fut: Future<Output = StoreResult<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(call).await {
        Ok(result) => Ok(result?),
        Err(e) => {
            error!(error = %e, "Store task failed");
            Err(ApiError::Internal(format!("Store task failed: {}", e)))
        }
    }
}

/// Create a tutorial.
///
/// POST /api/tutorials
pub async fn create<F>(
    State(state): State<AppState<F>>,
    Json(request): Json<CreateTutorialRequest>,
) -> Result<(StatusCode, Json<Tutorial>), ApiError>
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    let tutorials = state.tutorials;
    let tutorial = detached(async move { tutorials.create(request).await }).await?;
    Ok((StatusCode::CREATED, Json(tutorial)))
}

/// List tutorials, optionally filtered by title.
///
/// GET /api/tutorials?title=<term>&page=<n>&size=<n>
///
/// Without `page` and `size` the full list is returned; with either of them
/// the response is a page envelope.
pub async fn find_all<F>(
    State(state): State<AppState<F>>,
    Query(query): Query<ListTutorialsQuery>,
) -> Result<Response, ApiError>
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    let title = query.title_filter().map(str::to_owned);
    let tutorials = state.tutorials;

    if query.is_paged() {
        let request = PageRequest::new(query.page, query.size);
        let page = detached(async move {
            tutorials.find_all_paged(title.as_deref(), request).await
        })
        .await?;
        Ok(Json(TutorialPageResponse::from(page)).into_response())
    } else {
        let found = detached(async move { tutorials.find_all(title.as_deref()).await }).await?;
        Ok(Json(found).into_response())
    }
}

/// List published tutorials.
///
/// GET /api/tutorials/published
pub async fn find_all_published<F>(
    State(state): State<AppState<F>>,
) -> Result<Json<Vec<Tutorial>>, ApiError>
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    let tutorials = state.tutorials;
    let published = detached(async move { tutorials.find_all_published().await }).await?;
    Ok(Json(published))
}

/// Get one tutorial.
///
/// GET /api/tutorials/:id
pub async fn find_one<F>(
    State(state): State<AppState<F>>,
    Path(id): Path<i32>,
) -> Result<Json<Tutorial>, ApiError>
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    let tutorials = state.tutorials;
    detached(async move { tutorials.find_by_id(id).await })
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// Partially update a tutorial.
///
/// PUT /api/tutorials/:id
pub async fn update<F>(
    State(state): State<AppState<F>>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateTutorialRequest>,
) -> Result<Json<MessageResponse>, ApiError>
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    let tutorials = state.tutorials;
    match detached(async move { tutorials.update(id, request).await }).await? {
        0 => Err(not_found(id)),
        _ => Ok(Json(MessageResponse::new(
            "Tutorial was updated successfully.",
        ))),
    }
}

/// Delete one tutorial.
///
/// DELETE /api/tutorials/:id
pub async fn delete<F>(
    State(state): State<AppState<F>>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, ApiError>
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    let tutorials = state.tutorials;
    match detached(async move { tutorials.delete(id).await }).await? {
        0 => Err(not_found(id)),
        _ => Ok(Json(MessageResponse::new(
            "Tutorial was deleted successfully!",
        ))),
    }
}

/// Delete every tutorial.
///
/// DELETE /api/tutorials
pub async fn delete_all<F>(
    State(state): State<AppState<F>>,
) -> Result<Json<MessageResponse>, ApiError>
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    let tutorials = state.tutorials;
    let deleted = detached(async move { tutorials.delete_all().await }).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} Tutorials were deleted successfully!",
        deleted
    ))))
}
