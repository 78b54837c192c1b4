//! Shared type definitions for the Lifegrid simulation.
//!
//! This crate is the single source of truth for the value types that cross
//! crate boundaries: grid coordinates, broker topics, delivered envelopes,
//! and the two simulation phases.
//!
//! # Modules
//!
//! - [`coord`] -- Grid coordinates and grid dimensions
//! - [`topic`] -- Broker topic names, well-known control topics, envelopes
//! - [`enums`] -- The director's phase signal

pub mod coord;
pub mod enums;
pub mod topic;

// Re-export all public types at crate root for convenience.
pub use coord::{Coord, CoordParseError, GridDims};
pub use enums::{Phase, PhaseParseError};
pub use topic::{DIRECTOR_TOPIC, END_OF_RUN_TOPIC, END_SENTINEL, Envelope, Topic};
