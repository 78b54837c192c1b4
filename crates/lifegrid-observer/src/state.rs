//! Shared application state for the visualization server.
//!
//! [`AppState`] holds the broadcast feed relayed to `WebSocket` clients,
//! the start gate, and a few counters served by the status endpoints.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use lifegrid_types::GridDims;
use tokio::sync::broadcast;

use crate::gate::StartGate;

/// Upper bound on the broadcast feed capacity.
const MAX_FEED_CAPACITY: usize = 1 << 20;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug)]
pub struct AppState {
    /// Broadcast sender for relayed payloads.
    pub tx: broadcast::Sender<String>,
    /// Latch released by the first viewer frame.
    pub gate: StartGate,
    /// Dimensions of the grid being visualized.
    pub dims: GridDims,
    /// When the server state was created.
    pub created_at: DateTime<Utc>,
    feed_capacity: usize,
    relayed: AtomicU64,
    clients: AtomicUsize,
}

impl AppState {
    /// Create state for a grid of `dims` with a closed gate.
    ///
    /// The feed holds `feed_capacity` payloads per client, clamped to
    /// `1..=2^20`. A client that falls further behind is disconnected by
    /// the `/ws` handler.
    pub fn new(dims: GridDims, feed_capacity: usize) -> Self {
        let capacity = feed_capacity.clamp(1, MAX_FEED_CAPACITY);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            feed_capacity: capacity,
            tx,
            gate: StartGate::new(),
            dims,
            created_at: Utc::now(),
            relayed: AtomicU64::new(0),
            clients: AtomicUsize::new(0),
        }
    }

    /// Subscribe to the relayed feed.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Forward one payload to every connected client.
    ///
    /// Returns the number of receivers. Zero is normal when no viewer is
    /// connected.
    pub fn relay(&self, payload: String) -> usize {
        self.relayed.fetch_add(1, Ordering::Relaxed);
        self.tx.send(payload).unwrap_or(0)
    }

    /// Payloads a client may fall behind before it is disconnected.
    pub const fn feed_capacity(&self) -> usize {
        self.feed_capacity
    }

    /// Number of payloads relayed so far.
    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    /// Number of connected `WebSocket` clients.
    pub fn clients(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    /// Register a connected client until the returned guard drops.
    pub fn client_connected(&self) -> ClientGuard<'_> {
        self.clients.fetch_add(1, Ordering::Relaxed);
        ClientGuard { state: self }
    }
}

/// Keeps a client counted as connected while alive.
#[derive(Debug)]
pub struct ClientGuard<'a> {
    state: &'a AppState,
}

impl Drop for ClientGuard<'_> {
    fn drop(&mut self) {
        self.state.clients.fetch_sub(1, Ordering::Relaxed);
    }
}
