use std::sync::Arc;

use anyhow::Context;
use chesstty_server::{config, serve, GameManager};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with span durations
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!("Starting ChessTTY game server");

    let clock_resolution = config::get_clock_resolution();
    tracing::info!("Clock resolution: {:?}", clock_resolution);
    let manager = Arc::new(GameManager::new(clock_resolution));

    let addr = config::get_listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    tokio::select! {
        _ = serve(listener, manager.clone()) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received");
        }
    }

    manager.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}
