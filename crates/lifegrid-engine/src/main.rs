//! Engine binary for the Lifegrid simulation.
//!
//! Wires the broker, the cell population, the director, and the
//! visualization server together, waits for a viewer to release the start
//! gate, runs the simulation, and tears everything down.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `lifegrid-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the broker and start the visualization server
//! 4. Subscribe the visualization bridge
//! 5. Wire the grid and wait for the start gate (or Ctrl-C)
//! 6. Run until the end sentinel, stop every actor, log the result

mod error;

use std::path::Path;
use std::sync::Arc;

use lifegrid_broker::Broker;
use lifegrid_core::config::SimulationConfig;
use lifegrid_core::grid::InitialPattern;
use lifegrid_core::runner::{self, RunnerError};
use lifegrid_observer::{AppState, ServerConfig, StartGate};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const CONFIG_PATH: &str = "lifegrid-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, server startup, or the simulation
/// itself fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        dims = %config.grid.dims(),
        tick_interval_ms = config.timing.tick_interval_ms,
        run_duration_secs = config.timing.run_duration_secs,
        seed = ?config.seed,
        "Configuration loaded"
    );

    // 3. Broker and visualization server.
    let broker = Arc::new(Broker::new());
    let app_state = Arc::new(AppState::new(
        config.grid.dims(),
        config.broker.feed_capacity,
    ));
    let server_config = ServerConfig {
        host: config.observer.host.clone(),
        port: config.observer.port,
    };
    let observer =
        lifegrid_observer::spawn_observer(&server_config, Arc::clone(&app_state)).await?;
    info!(addr = %observer.addr, "Open a viewer on /ws and send any frame to start");

    // 4. Visualization bridge.
    let bridge = lifegrid_observer::spawn_bridge(
        &broker,
        Arc::clone(&app_state),
        config.broker.feed_capacity,
    );

    // 5-6. Wire, wait, run.
    let pattern = InitialPattern::Random { seed: config.seed };
    let start = wait_for_start(app_state.gate.clone());
    let outcome = runner::run_simulation(&broker, &config, &pattern, start).await;

    let relayed = bridge
        .stop()
        .await
        .map_err(|source| EngineError::Bridge { source })?;
    observer.task.abort();

    match outcome {
        Ok(result) => runner::log_simulation_end(&result),
        Err(RunnerError::StartCancelled) => {
            info!("Interrupted before a viewer started the simulation");
        }
        Err(e) => return Err(e.into()),
    }

    let stats = broker.stats();
    info!(
        publications = stats.publications,
        delivered = stats.delivered,
        dropped_full = stats.dropped_full,
        dropped_closed = stats.dropped_closed,
        relayed,
        "lifegrid-engine shutdown complete"
    );
    Ok(())
}

/// Resolve once a viewer opens the gate (`true`) or Ctrl-C arrives
/// (`false`).
async fn wait_for_start(gate: StartGate) -> bool {
    tokio::select! {
        opened = gate.wait() => opened,
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => false,
            Err(e) => {
                warn!(error = %e, "Ctrl-C handler unavailable, waiting for a viewer only");
                gate.wait().await
            }
        },
    }
}

/// Load the simulation configuration from `lifegrid-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
/// Without a file the defaults are used, still subject to environment
/// overrides.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path)?)
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
