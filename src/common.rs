//! Shared board vocabulary: coordinates, orientation, shot results and errors.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::bitboard::BitBoardError;

/// A grid cell; `x` is the column, `y` the row. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u8, u8)", into = "(u8, u8)")]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

impl Coord {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

impl From<(u8, u8)> for Coord {
    fn from((x, y): (u8, u8)) -> Self {
        Coord { x, y }
    }
}

impl From<Coord> for (u8, u8) {
    fn from(c: Coord) -> Self {
        (c.x, c.y)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Orientation of a ship on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Extends to the right of the origin.
    #[default]
    Horizontal,
    /// Extends downward from the origin.
    Vertical,
}

impl Orientation {
    pub fn toggled(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

/// Outcome of a shot as reported in `SHOT_RESULT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShotResult {
    Miss,
    Hit,
    /// The shot completed a ship.
    Sunk,
    /// The shot completed the last afloat ship; the board's owner lost.
    AllSunk,
}

impl ShotResult {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ShotResult::Miss => "MISS",
            ShotResult::Hit => "HIT",
            ShotResult::Sunk => "SUNK",
            ShotResult::AllSunk => "ALL_SUNK",
        }
    }
}

impl fmt::Display for ShotResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Errors returned by Board operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Underlying bitboard error.
    BitBoard(BitBoardError),
    /// A ship cell would fall outside the grid.
    OutOfBounds,
    /// Ship placement overlaps another ship.
    Overlaps,
    /// Every configured ship is already placed.
    PlacementComplete,
    /// Zero-length ships cannot be placed.
    InvalidLength,
    /// Random placement found no free position.
    UnableToPlaceShip,
    /// A shot was already fired at this cell.
    AlreadyShot,
    /// A shot is still awaiting its result.
    ShotPending,
}

impl From<BitBoardError> for BoardError {
    fn from(err: BitBoardError) -> Self {
        BoardError::BitBoard(err)
    }
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::BitBoard(e) => write!(f, "BitBoard error: {}", e),
            BoardError::OutOfBounds => write!(f, "Ship placement is out of bounds"),
            BoardError::Overlaps => write!(f, "Ship placement overlaps with another ship"),
            BoardError::PlacementComplete => write!(f, "All ships are already placed"),
            BoardError::InvalidLength => write!(f, "Ship length must be at least one"),
            BoardError::UnableToPlaceShip => write!(f, "Unable to place ship"),
            BoardError::AlreadyShot => write!(f, "A shot was already fired at this position"),
            BoardError::ShotPending => write!(f, "Previous shot is still awaiting its result"),
        }
    }
}

impl std::error::Error for BoardError {}
