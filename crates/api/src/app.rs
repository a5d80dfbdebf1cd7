use axum::{
    middleware,
    routing::get,
    Router,
};
use persistence::{ConnectionFactory, TutorialRepository, TutorialStatements};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{health, tutorials};

/// Shared handler state.
pub struct AppState<F: ConnectionFactory> {
    pub tutorials: TutorialRepository<F>,
    pub config: Arc<Config>,
}

impl<F: ConnectionFactory> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            tutorials: self.tutorials.clone(),
            config: self.config.clone(),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        // Any origin (development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn create_app<F>(config: Config, tutorials: TutorialRepository<F>) -> Router
where
    F: ConnectionFactory,
    F::Type: TutorialStatements,
{
    let config = Arc::new(config);
    let state = AppState {
        tutorials,
        config: config.clone(),
    };

    let tutorial_routes = Router::new()
        .route(
            "/api/tutorials",
            get(tutorials::find_all::<F>)
                .post(tutorials::create::<F>)
                .delete(tutorials::delete_all::<F>),
        )
        .route(
            "/api/tutorials/published",
            get(tutorials::find_all_published::<F>),
        )
        .route(
            "/api/tutorials/:id",
            get(tutorials::find_one::<F>)
                .put(tutorials::update::<F>)
                .delete(tutorials::delete::<F>),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check::<F>))
        .route("/api/health/ready", get(health::ready::<F>))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    let router = Router::new()
        .merge(public_routes)
        .merge(tutorial_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new());

    // Longer than a fully retried store call, so clients see its 503.
    let router = match config.request_timeout() {
        Some(timeout) => router.layer(TimeoutLayer::new(timeout)),
        None => router,
    };

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config.security.cors_origins))
        .with_state(state)
}
