//! Integration tests for the tutorial endpoints.
//!
//! Run with: cargo test --test tutorials_integration

mod common;

use axum::http::{Method, StatusCode};
use std::time::Duration;

use common::{
    create_test_app, create_test_app_with, create_tutorial, delete_request, get_request,
    json_request, parse_response_body,
};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use persistence::{
    DatabaseConfig, MemoryStore, PoolOptions, RetryPolicy, StoreError, TransientKind,
};
use serde_json::json;
use tower::ServiceExt;

fn refused() -> StoreError {
    StoreError::transient(TransientKind::ConnectionRefused, "connection refused")
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_tutorial_returns_created() {
    let (app, store) = create_test_app().await;
    let title: String = Sentence(2..5).fake();

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/tutorials",
            json!({ "title": title, "description": "Intro" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = parse_response_body(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["title"], title);
    assert_eq!(body["description"], "Intro");
    assert_eq!(body["published"], false);
    assert!(body["createdAt"].is_string());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_create_tutorial_without_title_is_rejected() {
    let (app, store) = create_test_app().await;

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/tutorials",
            json!({ "description": "No title" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
    assert!(store.is_empty());
}

// ============================================================================
// Read
// ============================================================================

#[tokio::test]
async fn test_find_all_filters_by_title() {
    let (app, _store) = create_test_app().await;
    create_tutorial(&app, "Rust basics", false).await;
    create_tutorial(&app, "Advanced rust", true).await;
    create_tutorial(&app, "Gardening", true).await;

    let response = app
        .clone()
        .oneshot(get_request("/api/tutorials?title=RUST"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    let titles: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Rust basics", "Advanced rust"]);

    // An empty filter lists everything
    let response = app
        .oneshot(get_request("/api/tutorials?title="))
        .await
        .unwrap();
    let body = parse_response_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_find_all_paged_envelope() {
    let (app, _store) = create_test_app().await;
    for i in 0..5 {
        create_tutorial(&app, &format!("Tutorial {}", i), false).await;
    }

    let response = app
        .oneshot(get_request("/api/tutorials?page=1&size=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["totalItems"], 5);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["currentPage"], 1);
    let tutorials = body["tutorials"].as_array().unwrap();
    assert_eq!(tutorials.len(), 2);
    assert_eq!(tutorials[0]["title"], "Tutorial 2");
}

#[tokio::test]
async fn test_find_all_published() {
    let (app, _store) = create_test_app().await;
    create_tutorial(&app, "Draft", false).await;
    let published = create_tutorial(&app, "Live", true).await;

    let response = app
        .oneshot(get_request("/api/tutorials/published"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    let tutorials = body.as_array().unwrap();
    assert_eq!(tutorials.len(), 1);
    assert_eq!(tutorials[0]["id"], published);
}

#[tokio::test]
async fn test_find_one_and_missing() {
    let (app, _store) = create_test_app().await;
    let id = create_tutorial(&app, "Find me", false).await;

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/tutorials/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["title"], "Find me");

    let response = app
        .oneshot(get_request("/api/tutorials/999"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "not_found");
}

// ============================================================================
// Update / Delete
// ============================================================================

#[tokio::test]
async fn test_update_tutorial() {
    let (app, _store) = create_test_app().await;
    let id = create_tutorial(&app, "Before", false).await;
    let uri = format!("/api/tutorials/{}", id);

    let response = app
        .clone()
        .oneshot(json_request(Method::PUT, &uri, json!({ "published": true })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert!(body["message"].as_str().unwrap().contains("updated"));

    let body = parse_response_body(app.oneshot(get_request(&uri)).await.unwrap()).await;
    assert_eq!(body["title"], "Before");
    assert_eq!(body["published"], true);
}

#[tokio::test]
async fn test_update_with_null_description_clears_it() {
    let (app, _store) = create_test_app().await;
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/tutorials",
            json!({ "title": "Described", "description": "Intro" }),
        ))
        .await
        .unwrap();
    let id = parse_response_body(response).await["id"].as_i64().unwrap();
    let uri = format!("/api/tutorials/{}", id);

    let response = app
        .clone()
        .oneshot(json_request(Method::PUT, &uri, json!({ "description": null })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(app.oneshot(get_request(&uri)).await.unwrap()).await;
    assert!(body["description"].is_null());
    assert_eq!(body["title"], "Described");
}

#[tokio::test]
async fn test_update_without_description_keeps_it() {
    let (app, _store) = create_test_app().await;
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/tutorials",
            json!({ "title": "Described", "description": "Intro" }),
        ))
        .await
        .unwrap();
    let id = parse_response_body(response).await["id"].as_i64().unwrap();
    let uri = format!("/api/tutorials/{}", id);

    let response = app
        .clone()
        .oneshot(json_request(Method::PUT, &uri, json!({ "title": "Renamed" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(app.oneshot(get_request(&uri)).await.unwrap()).await;
    assert_eq!(body["description"], "Intro");
    assert_eq!(body["title"], "Renamed");
}

#[tokio::test]
async fn test_update_missing_tutorial_is_not_found() {
    let (app, _store) = create_test_app().await;

    let response = app
        .oneshot(json_request(
            Method::PUT,
            "/api/tutorials/42",
            json!({ "title": "Nobody" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_one_then_again() {
    let (app, store) = create_test_app().await;
    let id = create_tutorial(&app, "Short lived", false).await;
    let uri = format!("/api/tutorials/{}", id);

    let response = app.clone().oneshot(delete_request(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.is_empty());

    let response = app.oneshot(delete_request(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_all_reports_count() {
    let (app, store) = create_test_app().await;
    create_tutorial(&app, "One", false).await;
    create_tutorial(&app, "Two", true).await;

    let response = app.oneshot(delete_request("/api/tutorials")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "2 Tutorials were deleted successfully!");
    assert!(store.is_empty());
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn test_transient_failures_are_retried_transparently() {
    let (app, store) = create_test_app().await;
    store.fail_next_connects([refused(), refused()]);

    let response = app.oneshot(get_request("/api/tutorials")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_exhausted_retries_are_service_unavailable() {
    let (app, store) = create_test_app().await;
    store.fail_next_connects([refused(), refused(), refused()]);

    let response = app.oneshot(get_request("/api/tutorials")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "service_unavailable");
}

#[tokio::test]
async fn test_terminal_failure_is_internal_error() {
    let (app, store) = create_test_app().await;
    store.fail_next_statements([StoreError::terminal("syntax error")]);

    let response = app.oneshot(get_request("/api/tutorials")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = parse_response_body(response).await;
    // Details stay in the logs
    assert_eq!(body["message"], "An internal error occurred");
    assert_eq!(store.statements(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_starved_pool_answers_service_unavailable_not_timeout() {
    // Production pool and retry settings: the request timeout must outlast
    // the 30 s acquire wait.
    let database = DatabaseConfig::default();
    let store = MemoryStore::new();
    let (app, tutorials) = create_test_app_with(
        store.factory(),
        PoolOptions {
            max: 1,
            min: 0,
            ..database.pool_options()
        },
        database.retry_policy(),
    )
    .await;
    let _held = tutorials.manager().acquire_connection().await.unwrap();

    let response = app.oneshot(get_request("/api/tutorials")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "The server is busy, please retry");
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_request_still_completes_its_write() {
    let store = MemoryStore::new();
    let (app, _tutorials) = create_test_app_with(
        store.factory().with_latency(Duration::from_secs(5)),
        PoolOptions {
            min: 0,
            ..PoolOptions::default()
        },
        RetryPolicy::default(),
    )
    .await;

    let request = app.oneshot(json_request(
        Method::POST,
        "/api/tutorials",
        json!({ "title": "Left behind" }),
    ));
    // The client gives up before the insert finishes.
    assert!(tokio::time::timeout(Duration::from_secs(1), request)
        .await
        .is_err());
    assert!(store.is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.len(), 1);
}
