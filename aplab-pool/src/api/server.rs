//! HTTP server setup and routing
//!
//! Sets up the Axum HTTP server with the run control routes and SSE.

use crate::error::{Error, Result};
use crate::playback::sequencer::Sequencer;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
///
/// Cloning is cheap: the sequencer is a handle.
#[derive(Clone)]
pub struct AppContext {
    pub sequencer: Sequencer,
    pub port: u16,
}

/// Build the router with all routes attached to `ctx`
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Run observation
        .route("/run/state", get(super::handlers::get_run_state))
        .route("/run/log", get(super::handlers::get_run_log))
        .route("/run/playlist", get(super::handlers::get_playlist))
        // Run control
        .route("/run/start", post(super::handlers::start_run))
        .route("/run/reset", post(super::handlers::reset_run))
        .route("/run/interval", post(super::handlers::set_interval))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = build_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
