//! Simulation lifecycle: wire, wait for the start signal, run, tear down.
//!
//! [`run_simulation`] is the top-level async function the engine drives:
//!
//! - **Wiring**: every cell is built and subscribed before the start signal,
//!   so configuration problems surface immediately
//! - **Start**: actors launch only once the start future resolves to `true`
//! - **Run**: the [`Director`] ticks until the run duration expires
//! - **Teardown**: the `end` sentinel on the end-of-run topic triggers a
//!   stop of every actor and collection of their final states

use std::future::Future;
use std::sync::Arc;

use lifegrid_broker::{Broker, Retention};
use lifegrid_types::{END_SENTINEL, Phase, Topic};
use tracing::{debug, info, warn};

use crate::cell::{CellError, CellSnapshot};
use crate::config::SimulationConfig;
use crate::director::Director;
use crate::grid::{Grid, GridError, InitialPattern};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The grid could not be wired.
    #[error("grid error: {source}")]
    Grid {
        /// The underlying wiring error.
        #[from]
        source: GridError,
    },

    /// The start signal was dropped before it fired.
    #[error("start signal dropped before the simulation began")]
    StartCancelled,

    /// The end-of-run mailbox closed before the sentinel arrived.
    #[error("end-of-run channel closed before the end sentinel arrived")]
    EndChannelClosed,

    /// The director task panicked or was aborted.
    #[error("director task failed: {source}")]
    Director {
        /// The underlying join error.
        source: tokio::task::JoinError,
    },

    /// A cell actor failed while stopping.
    #[error("cell error: {source}")]
    Cell {
        /// The underlying cell error.
        #[from]
        source: CellError,
    },
}

/// Result of a finished simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    /// Number of phase signals the director published.
    pub ticks: u64,
    /// The last phase published, if any.
    pub last_phase: Option<Phase>,
    /// Number of live cells when the actors stopped.
    pub live_cells: usize,
    /// Final state of every cell, in row-major order.
    pub cells: Vec<CellSnapshot>,
}

/// Run one simulation from wiring to teardown.
///
/// The grid is wired from `config` and `pattern` right away; the actors and
/// the director start only after `start` resolves to `true`.
///
/// # Errors
///
/// Returns [`RunnerError::Grid`] if wiring fails,
/// [`RunnerError::StartCancelled`] if `start` resolves to `false`, and
/// [`RunnerError::Director`] or [`RunnerError::Cell`] if a task fails.
pub async fn run_simulation(
    broker: &Arc<Broker>,
    config: &SimulationConfig,
    pattern: &InitialPattern,
    start: impl Future<Output = bool>,
) -> Result<SimulationResult, RunnerError> {
    let end_topic = Topic::end_of_run();
    broker.set_retention(&end_topic, Retention::Disabled);
    let (end_mailbox, mut end_rx) = broker.open_mailbox(1);
    broker.subscribe(&end_mailbox, &end_topic);

    let grid = Grid::wire(
        broker,
        config.grid.dims(),
        config.broker.inbox_capacity,
        pattern,
    )?;

    info!(
        dims = %grid.dims(),
        live = grid.live_count(),
        "Grid ready, waiting for start signal"
    );
    if !start.await {
        return Err(RunnerError::StartCancelled);
    }

    let running = grid.start();
    let director = Director::new(Arc::clone(broker), &config.timing).spawn();
    info!(
        cells = running.len(),
        tick_interval_ms = config.timing.tick_interval_ms,
        run_duration_secs = config.timing.run_duration_secs,
        "Simulation started"
    );

    loop {
        let envelope = end_rx.recv().await.ok_or(RunnerError::EndChannelClosed)?;
        if envelope.payload == END_SENTINEL {
            break;
        }
        debug!(payload = %envelope.payload, "ignoring end-of-run payload");
    }

    let report = director
        .await
        .map_err(|source| RunnerError::Director { source })?;
    let cells = running.stop().await?;
    let live_cells = cells.iter().filter(|c| c.alive).count();

    Ok(SimulationResult {
        ticks: report.ticks,
        last_phase: report.last_phase,
        live_cells,
        cells,
    })
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        ticks = result.ticks,
        last_phase = ?result.last_phase,
        cells = result.cells.len(),
        live_cells = result.live_cells,
        "Simulation ended"
    );
    if result.ticks == 0 {
        warn!("Simulation ended with no ticks executed");
    }
}
