//! HTTP Server module - REST API server implementation.
//!
//! This module exposes the orchestrator commands over HTTP, including
//! routing, request handling, and response formatting.

pub mod handlers;
pub mod response;
pub mod state;

#[cfg(test)]
mod handlers_tests;

use crate::config::Config;
use crate::error::{KumiageError, Result};
use axum::{
    routing::{get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Creates the API router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/services", get(handlers::list_services))
        .route("/api/v1/commands/:command", post(handlers::run_command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server and runs until interrupted.
pub async fn serve(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    let router = create_router(state);

    let addr = config.server.socket_addr()?;

    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        KumiageError::config_with_source(format!("Failed to bind to {}", addr), e)
    })?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
