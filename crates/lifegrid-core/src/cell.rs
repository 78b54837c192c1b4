//! Per-cell state machine and actor loop.
//!
//! Each grid cell is an independent actor. Its inbox receives three kinds
//! of envelope, processed strictly in arrival order:
//!
//! - a neighbor's coordinate topic: that neighbor flipped aliveness, so the
//!   stored contribution for it toggles between 0 and 1;
//! - `propagate` on the director topic: recompute aliveness from the stored
//!   contributions and remember whether it flipped;
//! - `report` on the director topic: if aliveness flipped since the last
//!   report, publish the cell's coordinate on its own topic.
//!
//! # Toggle invariant
//!
//! A neighbor notification carries no value. It is only correct because
//! every cell starts with all contributions at 0, every live cell announces
//! itself once at start, and every later announcement corresponds to
//! exactly one flip at the source. A dropped or duplicated notification
//! desynchronizes the stored bit, which is why the broker refuses duplicate
//! subscriptions and logs every drop.
//!
//! [`CellState`] holds the synchronous logic; [`CellActor`] owns the inbox
//! and runs it on a Tokio task.

use std::collections::BTreeMap;
use std::sync::Arc;

use lifegrid_broker::{Broker, MailboxReceiver};
use lifegrid_types::{Coord, Envelope, Phase, Topic};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::rules::next_alive;

/// Errors surfaced when tearing down a cell actor.
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    /// The actor task panicked or was aborted.
    #[error("cell {coord} task failed: {source}")]
    Join {
        /// The cell whose task failed.
        coord: Coord,
        /// The underlying join error.
        source: tokio::task::JoinError,
    },
}

/// What a cell did with one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Internal state changed (or was re-evaluated); nothing to publish.
    Updated,
    /// The cell must publish its coordinate on its own topic.
    Announce,
    /// A `report` arrived but nothing changed since the last one.
    Quiet,
    /// The envelope was not meant for this cell and was ignored.
    Ignored,
}

/// Final state of a cell, returned when its actor stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSnapshot {
    /// The cell's coordinate.
    pub coord: Coord,
    /// Aliveness at the moment the actor stopped.
    pub alive: bool,
}

/// The synchronous state machine of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellState {
    coord: Coord,
    alive: bool,
    /// Neighbor coordinate -> last-known contribution (0 or 1).
    neighborhood: BTreeMap<Coord, u8>,
    changed: bool,
}

impl CellState {
    /// Create a cell with every neighbor contribution at 0.
    pub fn new(coord: Coord, alive: bool, neighbors: impl IntoIterator<Item = Coord>) -> Self {
        Self {
            coord,
            alive,
            neighborhood: neighbors.into_iter().map(|n| (n, 0)).collect(),
            changed: false,
        }
    }

    /// The cell's coordinate.
    pub const fn coord(&self) -> Coord {
        self.coord
    }

    /// Current aliveness.
    pub const fn alive(&self) -> bool {
        self.alive
    }

    /// Whether aliveness flipped since the last report.
    pub const fn changed(&self) -> bool {
        self.changed
    }

    /// Number of distinct neighbors the cell listens to.
    pub fn neighbor_count(&self) -> usize {
        self.neighborhood.len()
    }

    /// Sum of the stored neighbor contributions.
    pub fn live_neighbors(&self) -> usize {
        self.neighborhood.values().filter(|&&bit| bit == 1).count()
    }

    /// Apply one delivered envelope.
    pub fn handle(&mut self, envelope: &Envelope) -> Step {
        if envelope.topic.is_director() {
            return match envelope.payload.parse::<Phase>() {
                Ok(Phase::Propagate) => {
                    self.propagate();
                    Step::Updated
                }
                Ok(Phase::Report) => {
                    if self.report() {
                        Step::Announce
                    } else {
                        Step::Quiet
                    }
                }
                Err(e) => {
                    warn!(cell = %self.coord, error = %e, "ignoring director payload");
                    Step::Ignored
                }
            };
        }

        match envelope.topic.as_coord() {
            Some(neighbor) if self.toggle(neighbor) => Step::Updated,
            _ => {
                warn!(cell = %self.coord, topic = %envelope.topic, "ignoring unexpected topic");
                Step::Ignored
            }
        }
    }

    /// Flip the stored contribution of `neighbor`. Returns `false` if it
    /// is not one of this cell's neighbors.
    pub fn toggle(&mut self, neighbor: Coord) -> bool {
        match self.neighborhood.get_mut(&neighbor) {
            Some(bit) => {
                *bit = 1_u8.saturating_sub(*bit);
                true
            }
            None => false,
        }
    }

    /// Recompute aliveness; sets the changed flag if it flipped.
    pub fn propagate(&mut self) {
        let next = next_alive(self.alive, self.live_neighbors());
        if next != self.alive {
            self.alive = next;
            self.changed = true;
        }
    }

    /// Consume the changed flag. Returns `true` if the cell must announce.
    pub const fn report(&mut self) -> bool {
        let changed = self.changed;
        self.changed = false;
        changed
    }

    /// Snapshot of the externally visible state.
    pub const fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            coord: self.coord,
            alive: self.alive,
        }
    }
}

/// A cell together with its inbox and broker handle, ready to run.
pub struct CellActor {
    state: CellState,
    topic: Topic,
    inbox: MailboxReceiver,
    broker: Arc<Broker>,
}

impl CellActor {
    /// Assemble an actor. The inbox must already be subscribed to the
    /// director and neighbor topics.
    pub fn new(state: CellState, inbox: MailboxReceiver, broker: Arc<Broker>) -> Self {
        let topic = Topic::coord(state.coord());
        Self {
            state,
            topic,
            inbox,
            broker,
        }
    }

    /// The cell's coordinate.
    pub const fn coord(&self) -> Coord {
        self.state.coord()
    }

    /// Borrow the cell's state.
    pub const fn state(&self) -> &CellState {
        &self.state
    }

    /// Start the actor on a Tokio task.
    ///
    /// A live cell announces itself once before the task is spawned, so
    /// when `start` returns its neighbors' inboxes already hold the seed.
    pub fn start(self) -> CellHandle {
        if self.state.alive() {
            self.announce("seed");
        }
        let coord = self.coord();
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(stop_rx));
        CellHandle {
            coord,
            stop: stop_tx,
            task,
        }
    }

    async fn run(mut self, mut stop: oneshot::Receiver<()>) -> CellSnapshot {
        debug!(cell = %self.coord(), alive = self.state.alive(), "cell started");
        let mut stopping = false;
        loop {
            tokio::select! {
                // A dropped handle stops the cell as well.
                _ = &mut stop, if !stopping => {
                    stopping = true;
                    self.inbox.close();
                }
                envelope = self.inbox.recv() => {
                    let Some(envelope) = envelope else { break };
                    if self.state.handle(&envelope) == Step::Announce {
                        self.announce("report");
                    }
                }
            }
        }
        debug!(cell = %self.coord(), alive = self.state.alive(), "cell stopped");
        self.state.snapshot()
    }

    fn announce(&self, reason: &'static str) {
        let publication = self.broker.publish(&self.topic, self.topic.as_str());
        debug!(
            cell = %self.coord(),
            reason,
            alive = self.state.alive(),
            delivered = publication.delivered,
            "announced change"
        );
    }
}

/// Handle to a running cell actor.
#[derive(Debug)]
pub struct CellHandle {
    coord: Coord,
    stop: oneshot::Sender<()>,
    task: JoinHandle<CellSnapshot>,
}

impl CellHandle {
    /// The cell's coordinate.
    pub const fn coord(&self) -> Coord {
        self.coord
    }

    /// Stop the actor and wait for its final state.
    ///
    /// The inbox is closed first, so the broker drops later deliveries;
    /// envelopes already queued are still processed before the task exits.
    pub async fn stop(self) -> Result<CellSnapshot, CellError> {
        // The task may already be gone; the join below reports why.
        let _ = self.stop.send(());
        self.task.await.map_err(|source| CellError::Join {
            coord: self.coord,
            source,
        })
    }
}
