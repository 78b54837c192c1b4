//! The two-state automaton rule.
//!
//! A live cell survives with two or three live neighbors and dies
//! otherwise; a dead cell is born with exactly three.

/// Aliveness of a cell after one generation.
pub const fn next_alive(alive: bool, live_neighbors: usize) -> bool {
    matches!((alive, live_neighbors), (true, 2 | 3) | (false, 3))
}
