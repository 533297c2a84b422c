//! dropnote-api - HTTP API server for DropNote.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use dropnote_api::config::AppConfig;
use dropnote_api::telemetry::init_tracing;
use dropnote_api::{app, AppState};
use dropnote_db::{Database, PoolConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Keep the guard alive so buffered file output is flushed on exit
    let _log_guard = init_tracing(&config.log, "dropnote_api=debug,tower_http=debug");

    let db = Database::connect_with_config(
        &config.database_url,
        PoolConfig::new().max_connections(config.db_max_connections),
    )
    .await?;
    info!(
        max_connections = config.db_max_connections,
        "Database connection pool created"
    );

    if config.run_migrations {
        db.migrate().await?;
        info!("Database migrations applied");
    }

    let state = AppState::from_config(Arc::new(db.notes.clone()), &config)?;
    info!(
        max_notes = config.max_notes,
        write_limit_per_day = config.write_limit_per_day,
        rate_limit_enabled = config.rate_limit_enabled,
        "Application state ready"
    );

    let app = app(state, &config.allowed_origins);

    let addr = config.bind_addr()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
