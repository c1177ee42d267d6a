//! HTTP request handlers
//!
//! Observation endpoints return snapshots; control endpoints map sequencer
//! errors to status codes (409 for wrong run state, 400 for bad input).

use crate::api::server::AppContext;
use crate::error::Error;
use crate::playback::log::PlaybackLogEntry;
use crate::playback::playlist::PlaylistItem;
use crate::state::{PlanRow, RunSnapshot};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    port: u16,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    status: String,
    run_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    entries: Vec<PlaybackLogEntry>,
    /// Human-readable form of each entry
    lines: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    pool_size: usize,
    base: Vec<PlaylistItem>,
    positions: Vec<PlanRow>,
}

#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    seconds: u32,
}

#[derive(Debug, Serialize)]
pub struct IntervalResponse {
    seconds: u32,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn error_response(err: Error) -> ApiError {
    let status = match &err {
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!("Request rejected ({}): {}", status, err);
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", err),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "aplab-pool".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: ctx.port,
    })
}

// ============================================================================
// Run Observation
// ============================================================================

/// GET /run/state - Run state, slots and activation report
pub async fn get_run_state(State(ctx): State<AppContext>) -> Json<RunSnapshot> {
    Json(ctx.sequencer.snapshot().await)
}

/// GET /run/log - Playback log of the current run
pub async fn get_run_log(State(ctx): State<AppContext>) -> Json<LogResponse> {
    let entries = ctx.sequencer.log().await;
    let lines = entries.iter().map(ToString::to_string).collect();
    Json(LogResponse { entries, lines })
}

/// GET /run/playlist - Extended playlist with slot assignment
pub async fn get_playlist(State(ctx): State<AppContext>) -> Json<PlaylistResponse> {
    Json(PlaylistResponse {
        pool_size: ctx.sequencer.settings().pool_size,
        base: ctx.sequencer.playlist().base().to_vec(),
        positions: ctx.sequencer.plan(),
    })
}

// ============================================================================
// Run Control
// ============================================================================

/// POST /run/start - Start a run (counts as the user gesture)
pub async fn start_run(
    State(ctx): State<AppContext>,
) -> Result<(StatusCode, Json<StartResponse>), ApiError> {
    let run_id = ctx.sequencer.start().await.map_err(error_response)?;
    info!("Run {} started via API", run_id);
    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            status: "started".to_string(),
            run_id,
        }),
    ))
}

/// POST /run/reset - Cancel the run and return to idle
pub async fn reset_run(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.sequencer.reset().await;
    Json(StatusResponse {
        status: "reset".to_string(),
    })
}

/// POST /run/interval - Set the step interval for the next run
pub async fn set_interval(
    State(ctx): State<AppContext>,
    Json(req): Json<IntervalRequest>,
) -> Result<Json<IntervalResponse>, ApiError> {
    ctx.sequencer
        .set_interval_seconds(req.seconds)
        .await
        .map_err(error_response)?;
    Ok(Json(IntervalResponse {
        seconds: req.seconds,
    }))
}
