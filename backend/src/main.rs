use anyhow::Result;
use settlement_backend::config::SettlementConfig;
use settlement_backend::{create_router, initialize_backend};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; log records from the domain layer are bridged in
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Loading configuration");
    let config = SettlementConfig::load()?;

    info!("Setting up application state");
    let app_state = initialize_backend(&config).await?;
    let settlement_service = app_state.settlement_service.clone();

    let app = create_router(app_state, &config.server.allowed_origin)?;

    let addr = config.bind_addr()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Waiting for queued summary writes to finish");
    settlement_service.wait_all_idle().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
