//! Grid coordinates and dimensions.
//!
//! A [`Coord`] names one cell of the toroidal grid. Its textual form
//! `"{x},{y}"` doubles as the cell's broker topic and as the payload of
//! the cell's change notifications, so `Display` and `FromStr` must stay
//! exact inverses of each other.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced when parsing a coordinate from its `"x,y"` form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordParseError {
    /// The input did not contain exactly one comma.
    #[error("expected \"x,y\", got {input:?}")]
    Shape {
        /// The rejected input.
        input: String,
    },

    /// One of the two components was not an unsigned integer.
    #[error("invalid coordinate component {component:?}")]
    Component {
        /// The component that failed to parse.
        component: String,
    },
}

/// Position of a cell on the grid.
///
/// `x` is the column and `y` the row, both zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

impl Coord {
    /// Create a coordinate from a column and row.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Coord {
    type Err = CoordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',');
        let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CoordParseError::Shape {
                input: s.to_owned(),
            });
        };
        let parse = |component: &str| {
            component
                .parse::<u32>()
                .map_err(|_err| CoordParseError::Component {
                    component: component.to_owned(),
                })
        };
        Ok(Self {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

/// Width and height of the toroidal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

impl GridDims {
    /// Create grid dimensions.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of cells, saturating at `usize::MAX`.
    pub fn cell_count(self) -> usize {
        let width = usize::try_from(self.width).unwrap_or(usize::MAX);
        let height = usize::try_from(self.height).unwrap_or(usize::MAX);
        width.saturating_mul(height)
    }

    /// Whether `coord` lies inside the grid.
    pub const fn contains(self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    /// Every coordinate of the grid in row-major order.
    pub fn coords(self) -> impl Iterator<Item = Coord> + use<> {
        let (width, height) = (self.width, self.height);
        (0..height).flat_map(move |y| (0..width).map(move |x| Coord::new(x, y)))
    }

    /// Translate `coord` by `(dx, dy)`, wrapping around both edges.
    ///
    /// Returns `None` for an empty grid.
    pub fn wrap_offset(self, coord: Coord, dx: i32, dy: i32) -> Option<Coord> {
        let x = wrap_axis(coord.x, dx, self.width)?;
        let y = wrap_axis(coord.y, dy, self.height)?;
        Some(Coord::new(x, y))
    }
}

impl fmt::Display for GridDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Modular translation along one axis.
fn wrap_axis(position: u32, delta: i32, len: u32) -> Option<u32> {
    let moved = i64::from(position).checked_add(i64::from(delta))?;
    let wrapped = moved.checked_rem_euclid(i64::from(len))?;
    u32::try_from(wrapped).ok()
}
