//! Cell actors, director, and grid wiring for the Lifegrid simulation.
//!
//! This crate owns the actor population that runs on top of the broker:
//! one [`CellActor`] per grid cell, a [`Director`] that drives the lockstep
//! `propagate` / `report` ticks, and the wiring that subscribes every cell
//! to its neighbors and to the director.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `lifegrid-config.yaml` into
//!   strongly-typed structs.
//! - [`rules`] -- The two-state automaton rule.
//! - [`cell`] -- Per-cell state machine and its actor loop.
//! - [`director`] -- The phase-alternating tick loop.
//! - [`grid`] -- Toroidal neighbor sets and grid wiring.
//! - [`runner`] -- End-to-end run: start gate, director, teardown.
//!
//! [`CellActor`]: cell::CellActor
//! [`Director`]: director::Director

pub mod cell;
pub mod config;
pub mod director;
pub mod grid;
pub mod rules;
pub mod runner;
