//! Race Server - authoritative tick loop for one race
//!
//! Loads configuration and the track grid, then runs the race loop until
//! Ctrl+C or SIGTERM.

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use race_server::config::Config;
use race_server::game::TrackGrid;
use race_server::server::{RaceLoop, ServerMsg};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    info!("Starting Race Server");

    let grid = match &config.track_path {
        Some(path) => TrackGrid::load(path)
            .with_context(|| format!("Failed to load track grid from {path}"))?,
        None => {
            info!("TRACK_PATH not set, using built-in oval track");
            TrackGrid::oval(60, 40, 6, 4)
        }
    };
    info!(
        cells = grid.len(),
        checkpoints = grid.max_checkpoint().unwrap_or_default(),
        laps = config.race.laps,
        "Track loaded"
    );

    let (race, handle) = RaceLoop::new(&config, grid);
    info!(race_id = %handle.id, tick_rate = config.tick_rate, "Race created");

    let mut events = handle.subscribe();
    let log_events = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ServerMsg::RaceFinished { finish }) => {
                    info!(slot = finish.slot, username = %finish.username, total_time = finish.total_time, best_lap = finish.best_lap, "Race finished");
                }
                Ok(ServerMsg::PhaseChanged { phase, countdown }) => {
                    info!(?phase, countdown, "Phase changed");
                }
                Ok(msg) => debug!(?msg, "Race event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let race_task = tokio::spawn(race.run());

    shutdown_signal().await;

    // The loop exits once its last handle is gone.
    drop(handle);
    race_task.await?;
    log_events.await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
