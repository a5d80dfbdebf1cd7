use std::time::Duration;

use anyhow::{Context, Result};
use persistence::{ConnectionManager, PgConnectionFactory, TutorialRepository};
use tracing::info;
use tutorials_api::{
    app, config,
    jobs::{JobScheduler, PoolMetricsJob, StoreProbeJob},
    middleware,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting Tutorials API v{}", env!("CARGO_PKG_VERSION"));

    let database = &config.database;
    info!(db = %database.display_target(), "Connecting to the database");
    let manager = ConnectionManager::init(
        PgConnectionFactory::new(database.clone()),
        database.pool_options(),
        database.retry_policy(),
    )
    .await
    .context("Failed to build the connection pool")?;

    let tutorials = TutorialRepository::new(manager.clone());
    tutorials
        .sync_schema()
        .await
        .context("Failed to create the tutorials table")?;
    info!("Schema ready");

    let mut scheduler = JobScheduler::new();
    scheduler.register(PoolMetricsJob::new(manager.clone()));
    scheduler.register(StoreProbeJob::new(manager.clone()));
    scheduler.start();

    let app = app::create_app(config.clone(), tutorials);

    let addr = config.socket_addr().context("Invalid server address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(5)).await;
    manager.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
