//! Broker topics and the envelopes delivered on them.
//!
//! Topics are flat strings. Two families exist: one coordinate topic per
//! cell (`"x,y"`) and the control topics [`DIRECTOR_TOPIC`] and
//! [`END_OF_RUN_TOPIC`].

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::coord::Coord;

/// Topic on which the director publishes phase signals.
pub const DIRECTOR_TOPIC: &str = "director";

/// Topic on which the director publishes the end-of-run sentinel.
pub const END_OF_RUN_TOPIC: &str = "endSimulation";

/// The single payload published on [`END_OF_RUN_TOPIC`].
pub const END_SENTINEL: &str = "end";

/// An opaque topic identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Create a topic from any string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The coordinate topic owned by the cell at `coord`.
    pub fn coord(coord: Coord) -> Self {
        Self(coord.to_string())
    }

    /// The director's phase topic.
    pub fn director() -> Self {
        Self(DIRECTOR_TOPIC.to_owned())
    }

    /// The end-of-run topic.
    pub fn end_of_run() -> Self {
        Self(END_OF_RUN_TOPIC.to_owned())
    }

    /// Borrow the topic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the topic as a cell coordinate, if it is one.
    pub fn as_coord(&self) -> Option<Coord> {
        self.0.parse().ok()
    }

    /// Whether this is the director topic.
    pub fn is_director(&self) -> bool {
        self.0 == DIRECTOR_TOPIC
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payload together with the topic it was published on.
///
/// The broker delivers envelopes rather than bare payloads so that a
/// mailbox subscribed to several topics can dispatch on the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Topic the payload was published on.
    pub topic: Topic,
    /// The opaque payload.
    pub payload: String,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(topic: Topic, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
        }
    }
}
