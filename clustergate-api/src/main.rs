//! Clustergate API server

use anyhow::Context;
use clustergate_api::config::GatewayConfig;
use clustergate_api::db::Database;
use clustergate_api::logging::LoggingConfig;
use clustergate_api::shutdown::ShutdownCoordinator;
use clustergate_api::{routes, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Initialize logging; the guard flushes file logs on exit
    let _log_guard = LoggingConfig::from(&config.logging)
        .init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    info!("Configuration loaded successfully");

    // An unreachable credential store is the only fatal start-up condition
    let database = Database::connect_with_retry(
        &config.database.url,
        config.database.max_connections,
        config.database.connect_attempts,
        Duration::from_secs(config.database.retry_delay_secs),
    )
    .await
    .map_err(|e| {
        error!("Credential database unavailable: {}", e);
        e
    })?;
    database.migrate().await?;
    let database = Arc::new(database);
    info!("Database initialized");

    let state = Arc::new(AppState::new(&config, database.clone()));
    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Clustergate API listening on {}", addr);

    let shutdown = ShutdownCoordinator::new();
    let signals = shutdown.clone();
    tokio::spawn(async move { signals.wait_for_signal().await });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    database.close().await;
    info!("Clustergate API stopped");

    Ok(())
}
