//! aplab-pool - Main entry point
//!
//! Serves the run control API, or with `--headless` performs a single run
//! against the simulated host and exits with its outcome.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use aplab_common::events::{EventBus, RunState};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aplab_pool::api::{self, AppContext};
use aplab_pool::config::{Preset, TomlConfig};
use aplab_pool::playback::{SimulatedHost, Sequencer};

/// Command-line arguments for aplab-pool
#[derive(Parser, Debug)]
#[command(name = "aplab-pool")]
#[command(about = "Pooled media playback scheduler for autoplay experiments")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "APLAB_PORT")]
    port: Option<u16>,

    /// Config file (falls back to APLAB_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Experiment preset (overrides the config file)
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Step interval in seconds, 1-10 (overrides the config file)
    #[arg(short, long)]
    interval: Option<u32>,

    /// Perform one run and exit instead of serving the API
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing (RUST_LOG wins over [logging] level)
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("aplab_pool={level},aplab_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(preset) = args.preset {
        config.preset = preset;
    }
    if let Some(seconds) = args.interval {
        config.run.interval_seconds = Some(seconds);
    }

    let run_config = config.run_config().context("Invalid run configuration")?;
    let host = Arc::new(SimulatedHost::new(config.simulator.clone()));
    let sequencer = Sequencer::new(
        run_config.extended_playlist(),
        run_config.settings(),
        host,
        EventBus::new(1024),
    )
    .context("Failed to initialize sequencer")?;

    if args.headless {
        return run_headless(sequencer).await;
    }

    info!("Starting aplab-pool on port {} (preset {})", config.port, config.preset);
    let ctx = AppContext {
        sequencer: sequencer.clone(),
        port: config.port,
    };
    api::run(ctx, shutdown_signal())
        .await
        .context("Server error")?;

    sequencer.reset().await;
    info!("Server shutdown complete");
    Ok(())
}

/// One run, reported through tracing; errors out unless it succeeded
async fn run_headless(sequencer: Sequencer) -> Result<()> {
    let run_id = sequencer.start().await.context("Failed to start run")?;
    info!("Headless run {} started", run_id);

    let state = tokio::select! {
        state = sequencer.wait_for_finish() => state,
        _ = shutdown_signal() => {
            sequencer.reset().await;
            RunState::Idle
        }
    };

    let snapshot = sequencer.snapshot().await;
    for activation in snapshot.activations.iter().filter(|a| !a.succeeded) {
        warn!(
            "Slot {} activation failed: {}",
            activation.slot_index,
            activation.reason.as_deref().unwrap_or("unknown")
        );
    }
    for entry in sequencer.log().await {
        info!("{}", entry);
    }

    match state {
        RunState::Succeeded => {
            info!("Run succeeded: {} of {} positions played", snapshot.log_length, snapshot.playlist_length);
            Ok(())
        }
        RunState::Failed => bail!(
            "Run failed after {} of {} positions",
            snapshot.log_length,
            snapshot.playlist_length
        ),
        other => bail!("Run interrupted ({})", other),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
