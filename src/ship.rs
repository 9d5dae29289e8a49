//! Ship layout and hit tracking.

use core::fmt;

use crate::bitboard::BitBoard;
use crate::common::{BoardError, Coord, Orientation};
use crate::config::GRID_SIZE;

/// Occupancy mask over the game grid.
pub type Mask = BitBoard<u32, GRID_SIZE>;

/// One cell of a ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipPart {
    pub coord: Coord,
    pub hit: bool,
}

/// A placed ship. Its shape never changes; only hit flags do.
#[derive(Clone, PartialEq, Eq)]
pub struct Ship {
    id: usize,
    orientation: Orientation,
    parts: Vec<ShipPart>,
    mask: Mask,
    sunk: bool,
}

/// The `length` contiguous cells starting at `origin`, extending right or down.
/// Cells that leave the grid are still listed so callers can reject them.
pub fn ship_cells(origin: Coord, length: usize, orientation: Orientation) -> Vec<(usize, usize)> {
    let (x, y) = (origin.x as usize, origin.y as usize);
    (0..length)
        .map(|i| match orientation {
            Orientation::Horizontal => (x + i, y),
            Orientation::Vertical => (x, y + i),
        })
        .collect()
}

impl Ship {
    /// Lay out a ship. Fails if any cell leaves the grid.
    pub fn new(
        id: usize,
        origin: Coord,
        length: usize,
        orientation: Orientation,
    ) -> Result<Self, BoardError> {
        if length == 0 {
            return Err(BoardError::InvalidLength);
        }
        let mut mask = Mask::new();
        let mut parts = Vec::with_capacity(length);
        for (x, y) in ship_cells(origin, length, orientation) {
            if x >= GRID_SIZE || y >= GRID_SIZE {
                return Err(BoardError::OutOfBounds);
            }
            let coord = Coord::new(x as u8, y as u8);
            mask.set(coord)?;
            parts.push(ShipPart { coord, hit: false });
        }
        Ok(Ship {
            id,
            orientation,
            parts,
            mask,
            sunk: false,
        })
    }

    /// Mark the un-hit part at `coord` as hit. Returns `false` when no such
    /// part exists (not ours, or already hit).
    pub fn strike(&mut self, coord: Coord) -> bool {
        let Some(part) = self
            .parts
            .iter_mut()
            .find(|p| p.coord == coord && !p.hit)
        else {
            return false;
        };
        part.hit = true;
        if self.parts.iter().all(|p| p.hit) {
            self.sunk = true;
        }
        true
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn origin(&self) -> Coord {
        self.parts[0].coord
    }

    pub fn parts(&self) -> &[ShipPart] {
        &self.parts
    }

    pub fn mask(&self) -> Mask {
        self.mask
    }

    pub fn contains(&self, coord: Coord) -> bool {
        self.parts.iter().any(|p| p.coord == coord)
    }

    /// True once every part has been hit.
    pub fn is_sunk(&self) -> bool {
        self.sunk
    }
}

impl fmt::Debug for Ship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hits = self.parts.iter().filter(|p| p.hit).count();
        write!(
            f,
            "Ship {{ id: {}, origin: {}, orientation: {:?}, len: {}, hits: {}, sunk: {} }}",
            self.id,
            self.origin(),
            self.orientation,
            self.len(),
            hits,
            self.sunk,
        )
    }
}
