//! Enumeration types for the Lifegrid simulation.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// A payload on the director topic that is not a known phase name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase {0:?}")]
pub struct PhaseParseError(pub String);

/// One half of the simulation's lockstep tick.
///
/// The director alternates the two phases, starting with
/// [`Phase::Propagate`]. Every cell recomputes its next state during
/// `Propagate` and announces a change during `Report`; never mixing the
/// two across the population is what gives the automaton its
/// simultaneous-update semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Recompute aliveness from the stored neighbor contributions.
    Propagate,
    /// Announce a change of aliveness on the cell's own topic.
    Report,
}

impl Phase {
    /// The phase the director emits first.
    pub const FIRST: Self = Self::Propagate;

    /// The literal published on the director topic.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Propagate => "propagate",
            Self::Report => "report",
        }
    }

    /// The phase that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Propagate => Self::Report,
            Self::Report => Self::Propagate,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "propagate" => Ok(Self::Propagate),
            "report" => Ok(Self::Report),
            other => Err(PhaseParseError(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn phases_alternate() {
        assert_eq!(Phase::FIRST, Phase::Propagate);
        assert_eq!(Phase::Propagate.next(), Phase::Report);
        assert_eq!(Phase::Report.next(), Phase::Propagate);
    }

    #[test]
    fn literals_parse_back() {
        assert_eq!("propagate".parse::<Phase>().unwrap(), Phase::Propagate);
        assert_eq!("report".parse::<Phase>().unwrap(), Phase::Report);
        assert!("propogate".parse::<Phase>().is_err());
    }

    #[test]
    fn serde_uses_wire_literals() {
        let json = serde_json::to_string(&Phase::Report).unwrap();
        assert_eq!(json, "\"report\"");
    }
}
