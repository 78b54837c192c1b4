//! Visualization server for the Lifegrid simulation.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) streaming every relayed broker payload
//!   as one text frame: `"x,y"` for a cell that flipped, `propagate` /
//!   `report` for phase markers
//! - **Start gate**: the first frame a viewer sends releases the simulation
//! - **Status endpoints**: `GET /` (HTML) and `GET /api/status` (JSON)
//!
//! # Architecture
//!
//! The [`bridge`] task owns one broker mailbox subscribed to every
//! coordinate topic and to the director topic. It forwards each payload
//! into a [`tokio::sync::broadcast`] feed held by [`AppState`]; each
//! `WebSocket` client holds its own receiver, so a slow viewer never
//! stalls the broker. A viewer that falls more than
//! [`AppState::feed_capacity`] payloads behind is disconnected.

pub mod bridge;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use bridge::{BridgeHandle, spawn_bridge};
pub use gate::StartGate;
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::{RunningObserver, StartupError, spawn_observer};
pub use state::AppState;
