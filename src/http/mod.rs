//! HTTP surface: JSON endpoints wired to the [`LedgerService`].

use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    routing::{get, post},
};
use tokio::net::TcpListener;

use crate::application::LedgerService;

pub mod errors;
pub mod middleware;
pub mod routes;

/// Build the router with every ledger endpoint.
pub fn build_app(service: LedgerService) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/create-account", post(routes::create_account))
        .route("/accounts", get(routes::list_accounts))
        .route("/transfer", post(routes::transfer))
        .layer(Extension(service))
        .layer(axum::middleware::from_fn(middleware::log_requests))
}

/// Serve the app on an already-bound listener until ctrl-c.
pub async fn serve(listener: TcpListener, service: LedgerService) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, build_app(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
