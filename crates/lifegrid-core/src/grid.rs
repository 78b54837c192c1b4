//! Toroidal neighbor sets and grid wiring.
//!
//! Wiring builds one [`CellActor`] per coordinate and subscribes its inbox
//! to the director topic and to the coordinate topic of each neighbor.
//!
//! # Tiny grids
//!
//! On a grid narrower than three cells the eight wrap-around offsets
//! collide: on 2x2 every other cell is reached by more than one offset, and
//! on 1x1 every offset lands back on the cell itself. Neighbor sets are
//! therefore deduplicated and never contain the cell itself, so each
//! neighbor contributes at most once to the live count and each
//! notification toggles exactly one stored bit.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use lifegrid_broker::{Broker, Retention};
use lifegrid_types::{Coord, GridDims, Topic};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::cell::{CellActor, CellError, CellHandle, CellSnapshot, CellState};

/// The eight offsets of the Moore neighborhood.
const OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Errors that can occur while wiring the grid.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The grid has no cells.
    #[error("grid dimensions {dims} contain no cells")]
    Empty {
        /// The rejected dimensions.
        dims: GridDims,
    },

    /// An explicit pattern names a cell outside the grid.
    #[error("live cell {coord} lies outside the {dims} grid")]
    OutOfBounds {
        /// The offending coordinate.
        coord: Coord,
        /// The grid dimensions.
        dims: GridDims,
    },
}

/// Distinct toroidal neighbors of `coord`, excluding `coord` itself.
pub fn neighbors(coord: Coord, dims: GridDims) -> Vec<Coord> {
    let mut seen = BTreeSet::new();
    OFFSETS
        .iter()
        .filter_map(|&(dx, dy)| dims.wrap_offset(coord, dx, dy))
        .filter(|&n| n != coord && seen.insert(n))
        .collect()
}

/// How the initial aliveness of each cell is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialPattern {
    /// Each cell is alive with probability one half.
    Random {
        /// Seed for reproducible patterns; `None` uses OS entropy.
        seed: Option<u64>,
    },
    /// Exactly these cells start alive.
    Live(BTreeSet<Coord>),
}

impl InitialPattern {
    /// Resolve the pattern to the set of live coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if an explicit pattern names a
    /// coordinate outside `dims`.
    pub fn live_cells(&self, dims: GridDims) -> Result<BTreeSet<Coord>, GridError> {
        match self {
            Self::Random { seed } => {
                let mut rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
                Ok(dims.coords().filter(|_| rng.random_bool(0.5)).collect())
            }
            Self::Live(cells) => {
                if let Some(&coord) = cells.iter().find(|&&c| !dims.contains(c)) {
                    return Err(GridError::OutOfBounds { coord, dims });
                }
                Ok(cells.clone())
            }
        }
    }
}

/// A fully wired grid whose actors have not started yet.
pub struct Grid {
    dims: GridDims,
    cells: Vec<CellActor>,
}

impl Grid {
    /// Build and subscribe every cell of a `dims` grid.
    ///
    /// Each cell gets its own inbox of `inbox_capacity` subscribed to the
    /// director topic and then to each neighbor's coordinate topic. The
    /// director topic is set to keep no history.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the grid is empty or the pattern does not
    /// fit it.
    pub fn wire(
        broker: &Arc<Broker>,
        dims: GridDims,
        inbox_capacity: usize,
        pattern: &InitialPattern,
    ) -> Result<Self, GridError> {
        if dims.cell_count() == 0 {
            return Err(GridError::Empty { dims });
        }
        let live = pattern.live_cells(dims)?;
        let director = Topic::director();
        broker.set_retention(&director, Retention::Disabled);

        let mut cells = Vec::with_capacity(dims.cell_count());
        for coord in dims.coords() {
            let (mailbox, inbox) = broker.open_mailbox(inbox_capacity);
            broker.subscribe(&mailbox, &director);

            let around = neighbors(coord, dims);
            for &neighbor in &around {
                broker.subscribe(&mailbox, &Topic::coord(neighbor));
            }
            debug!(cell = %coord, neighbors = around.len(), "cell wired");

            let state = CellState::new(coord, live.contains(&coord), around);
            cells.push(CellActor::new(state, inbox, Arc::clone(broker)));
        }

        info!(%dims, cells = cells.len(), live = live.len(), "grid wired");
        Ok(Self { dims, cells })
    }

    /// Grid dimensions.
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no cells. Always `false` for a wired grid.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of cells that start alive.
    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|c| c.state().alive()).count()
    }

    /// Initial state of each cell, in row-major order.
    pub fn states(&self) -> impl Iterator<Item = &CellState> {
        self.cells.iter().map(CellActor::state)
    }

    /// Start every actor.
    ///
    /// Live cells announce themselves before their task is spawned, so all
    /// seed notifications are queued by the time this returns.
    pub fn start(self) -> RunningGrid {
        let handles: Vec<CellHandle> = self.cells.into_iter().map(CellActor::start).collect();
        info!(cells = handles.len(), "cell actors started");
        RunningGrid {
            dims: self.dims,
            handles,
        }
    }
}

/// A grid whose actors are running.
#[derive(Debug)]
pub struct RunningGrid {
    dims: GridDims,
    handles: Vec<CellHandle>,
}

impl RunningGrid {
    /// Grid dimensions.
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    /// Number of running actors.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no actors are running.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every actor and collect their final states in row-major order.
    ///
    /// # Errors
    ///
    /// Returns the first [`CellError`] if any actor task failed. Every
    /// actor is still stopped.
    pub async fn stop(self) -> Result<Vec<CellSnapshot>, CellError> {
        let results = join_all(self.handles.into_iter().map(CellHandle::stop)).await;
        info!(cells = results.len(), "cell actors stopped");
        results.into_iter().collect()
    }
}
