//! pgcrud Server Entry Point
//!
//! Bootstraps configuration from the environment, introspects the
//! database catalog once, and serves the REST + MCP gateway until a
//! termination signal arrives. Shutdown stops accepting new requests,
//! drains in-flight work for a bounded grace period, then closes the
//! pools and MCP sessions.

use std::net::SocketAddr;
use std::time::Duration;

use pgcrud_api::{
    create_api_router, introspect, ApiError, ApiResult, AppState, CredentialEngine, DbPools,
    GatewayConfig,
};
use tracing_subscriber::EnvFilter;

/// Grace period for draining in-flight requests at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env().map_err(|e| {
        ApiError::internal_error(format!("Configuration invalid: {e}"))
    })?;

    let pools = DbPools::from_config(&config)?;
    let credentials = CredentialEngine::from_config(&config);

    // One bounded introspection pass; the model is immutable afterwards.
    let model = introspect(&pools, &config).await?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ApiError::internal_error(format!("Invalid bind address: {e}")))?;

    let state = AppState::new(model, pools, config, credentials);
    let app = create_api_router(state.clone());

    tracing::info!(%addr, tables = state.model.len(), "Starting pgcrud gateway");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {addr}: {e}")))?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut rx = shutdown_rx;
                let _ = rx.changed().await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    // Drain in-flight requests for a bounded grace period, then release
    // shared resources regardless.
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(joined) => {
            joined
                .map_err(|e| ApiError::internal_error(format!("Server task failed: {e}")))?
                .map_err(|e| ApiError::internal_error(format!("Server error: {e}")))?;
        }
        Err(_) => tracing::warn!("Drain grace period elapsed with requests still in flight"),
    }

    state.sessions.clear();
    state.pools.close();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("ctrl-c handler installs");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installs")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
