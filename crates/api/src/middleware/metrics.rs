//! Prometheus metrics for the HTTP surface.
//!
//! `metrics_middleware` records per-route request counters and latencies;
//! `metrics_handler` renders everything recorded in the process, store
//! metrics included.

use anyhow::Context;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram, Gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Latency buckets in seconds. The top buckets cover a request that sat
/// through every store retry.
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Records `http_requests_total{method,path,status}`,
/// `http_request_duration_seconds{method,path}` and the
/// `http_requests_in_flight` gauge.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let method = method_label(req.method());
    // Label by route template so ids do not explode the series count.
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => "unmatched".to_owned(),
    };

    let in_flight = InFlightGuard::new();
    let start = Instant::now();
    let response = next.run(req).await;
    drop(in_flight);

    record_request(method, path, response.status(), start.elapsed());
    response
}

/// Holds one unit of `http_requests_in_flight` until dropped, so a request
/// whose future is dropped mid-way is still taken off the gauge.
struct InFlightGuard {
    gauge: Gauge,
}

impl InFlightGuard {
    fn new() -> Self {
        let gauge = gauge!("http_requests_in_flight");
        gauge.increment(1.0);
        Self { gauge }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.decrement(1.0);
    }
}

fn record_request(method: &'static str, path: String, status: StatusCode, elapsed: Duration) {
    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(elapsed.as_secs_f64());
}

fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::OPTIONS => "OPTIONS",
        Method::HEAD => "HEAD",
        _ => "OTHER",
    }
}

/// `GET /metrics` in the Prometheus text format; 503 before [`init_metrics`].
pub async fn metrics_handler() -> Response {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized").into_response(),
    }
}

/// Installs the global Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() -> anyhow::Result<()> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)
        .context("Failed to set histogram buckets")?
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    // Lost race: the first handle wins.
    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}
