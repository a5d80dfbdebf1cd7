//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use persistence::{ConnectionFactory, PoolStatus, TutorialStatements};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
    pub pool: PoolHealth,
}

/// Connection pool occupancy.
#[derive(Debug, Serialize)]
pub struct PoolHealth {
    pub size: u32,
    pub idle: u32,
    pub max: u32,
    pub min: u32,
}

impl From<PoolStatus> for PoolHealth {
    fn from(status: PoolStatus) -> Self {
        Self {
            size: status.size,
            idle: status.idle,
            max: status.max,
            min: status.min,
        }
    }
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check endpoint.
///
/// Pings the store once and reports the pool occupancy. Answers 503 with
/// the same body when the store is unreachable.
pub async fn health_check<F>(State(state): State<AppState<F>>) -> (StatusCode, Json<HealthResponse>)
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    let manager = state.tutorials.manager();
    let latency = manager.ping().await.ok();
    let connected = latency.is_some();

    let response = HealthResponse {
        status: if connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            connected,
            latency_ms: latency.map(|l| l.as_millis() as u64),
            pool: manager.status().into(),
        },
    };

    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 OK if the service can accept traffic (store reachable).
pub async fn ready<F>(State(state): State<AppState<F>>) -> Result<Json<StatusResponse>, StatusCode>
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    match state.tutorials.manager().ping().await {
        Ok(_) => Ok(Json(StatusResponse {
            status: "ready".to_string(),
        })),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}
