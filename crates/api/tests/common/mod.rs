//! Common test utilities for integration tests.
//!
//! The app under test runs on the in-memory store, so these suites need no
//! database server.

#![allow(dead_code)]

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use persistence::{
    ConnectionManager, DatabaseConfig, MemoryConnectionFactory, MemoryStore, PoolOptions,
    RetryPolicy, TutorialRepository,
};
use tutorials_api::{
    app::create_app,
    config::{Config, LoggingConfig, SecurityConfig, ServerConfig},
};

/// Test configuration.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Use random port
            request_timeout_secs: None,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            cors_origins: vec!["http://localhost:8081".to_string()],
        },
        database: DatabaseConfig::default(),
    }
}

/// Retries quickly so failure paths finish fast in real time.
pub fn test_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff_base: Duration::from_millis(10),
        backoff_exponent: 1.5,
        attempt_timeout: Some(Duration::from_secs(2)),
    }
}

/// Build the app over a fresh in-memory store.
///
/// The pool starts empty so queued connect faults hit the first request.
pub async fn create_test_app() -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    let options = PoolOptions {
        max: 4,
        min: 0,
        acquire_timeout: Duration::from_secs(2),
        ..PoolOptions::default()
    };
    let (app, _) = create_test_app_with(store.factory(), options, test_retry_policy()).await;
    (app, store)
}

/// Build the app over the given factory and settings. The repository is
/// returned too, so tests can reach into the pool.
pub async fn create_test_app_with(
    factory: MemoryConnectionFactory,
    options: PoolOptions,
    retry: RetryPolicy,
) -> (Router, TutorialRepository<MemoryConnectionFactory>) {
    let manager = ConnectionManager::init(factory, options, retry)
        .await
        .expect("pool init");
    let tutorials = TutorialRepository::new(manager);
    (create_app(test_config(), tutorials.clone()), tutorials)
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Parse a JSON response body.
pub async fn parse_response_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}

/// Create a tutorial through the API and return its id.
pub async fn create_tutorial(app: &Router, title: &str, published: bool) -> i64 {
    use tower::ServiceExt;

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/tutorials",
            serde_json::json!({ "title": title, "published": published }),
        ))
        .await
        .unwrap();
    let body = parse_response_body(response).await;
    body["id"].as_i64().expect("created tutorial has an id")
}
