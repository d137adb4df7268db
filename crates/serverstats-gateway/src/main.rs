//! serverstats gateway
//!
//! Serves the host runtime's stats as a pull-based metrics feed.
//! Usage: `serverstats-gateway [config.yaml]` (default `serverstats.yaml`).

use std::net::SocketAddr;
use std::sync::Arc;

use serverstats_core::error::{Result, StatsError};
use tracing_subscriber::{fmt, EnvFilter};

use serverstats_gateway::provider::FileSnapshotProvider;
use serverstats_gateway::{app_state, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "serverstats.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| StatsError::BadRequest(format!("gateway.listen: {e}")))?;

    let provider = Arc::new(FileSnapshotProvider::new(cfg.snapshot.path.clone()));
    let state = app_state::AppState::new(cfg, provider)?;
    let app = router::build_router(state);

    tracing::info!(%listen, config = %path, "serverstats-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| StatsError::Internal(format!("bind {listen}: {e}")))?;

    // Graceful shutdown drops the state, which removes an owned table file.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "signal handler failed");
            }
        })
        .await
        .map_err(|e| StatsError::Internal(format!("server failed: {e}")))?;

    tracing::info!("serverstats-gateway stopped");
    Ok(())
}
