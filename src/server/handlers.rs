//! HTTP request handlers.
//!
//! This module contains all the HTTP endpoint handlers for the kumiage API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Definition;
use crate::error::Result;
use crate::orchestrator::Command;
use crate::server::response::{ApiResponse, CommandData, HealthData, HealthStatus, ServicesData};
use crate::server::state::AppState;

/// Version string for the application.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check handler.
///
/// GET /api/v1/health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let data = HealthData {
        status: HealthStatus::Healthy,
        version: VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
        commands_total: state.stats.commands_total(),
    };

    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// Tracked services handler.
///
/// GET /api/v1/services
pub async fn list_services(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let orchestrator = state.orchestrator.lock().await;
    let data = ServicesData::from(orchestrator.store().snapshot());

    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// Command handler.
///
/// POST /api/v1/commands/:command
///
/// The body is an optional YAML document with a `services` section. It is
/// required for `start` and ignored otherwise. The state file is saved after
/// every command.
pub async fn run_command(
    State(state): State<Arc<AppState>>,
    Path(command): Path<String>,
    body: String,
) -> impl IntoResponse {
    state.increment_commands();

    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    info!(request_id = %request_id, command = %command, "Processing command request");

    match execute(&state, &command, &body).await {
        Ok((command, output)) => {
            let data = CommandData {
                request_id,
                command,
                output,
                duration_ms: start_time.elapsed().as_millis() as u64,
            };
            (StatusCode::OK, Json(ApiResponse::success(data)))
        }
        Err(err) => {
            error!(request_id = %request_id, error = %err, "Command request failed");
            state.increment_failed();

            let status_code = StatusCode::from_u16(err.code().http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status_code,
                Json(ApiResponse::<CommandData>::from_error(&err)),
            )
        }
    }
}

async fn execute(state: &AppState, command: &str, body: &str) -> Result<(Command, String)> {
    let command: Command = command.parse()?;
    let definition = parse_definition(body)?;

    let orchestrator = state.orchestrator.lock().await;
    let result = orchestrator.run_command(command, definition.as_ref()).await;
    let saved = orchestrator.save();

    let output = result?;
    saved?;
    Ok((command, output))
}

fn parse_definition(body: &str) -> Result<Option<Definition>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    Definition::from_yaml(body).map(Some)
}
