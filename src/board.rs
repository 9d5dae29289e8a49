//! Per-player board state: own fleet, shots received, and shots fired.

use std::collections::BTreeMap;

use rand::Rng;

use crate::common::{BoardError, Coord, Orientation, ShotResult};
use crate::config::{DEFAULT_SHIPS, GRID_SIZE};
use crate::ship::{Mask, Ship};

/// Own fleet plus the record of shots the opponent has fired at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    lengths: Vec<usize>,
    ships: Vec<Ship>,
    occupied: Mask,
    received: BTreeMap<Coord, ShotResult>,
}

impl Board {
    /// Empty board that expects ships of `lengths`, placed in that order.
    pub fn new(lengths: &[usize]) -> Self {
        Board {
            lengths: lengths.to_vec(),
            ships: Vec::new(),
            occupied: Mask::new(),
            received: BTreeMap::new(),
        }
    }

    pub fn standard() -> Self {
        Self::new(&DEFAULT_SHIPS)
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    /// Union of all placed ships' cells.
    pub fn occupied(&self) -> Mask {
        self.occupied
    }

    /// Length of the ship that will be placed next, if any remain.
    pub fn next_length(&self) -> Option<usize> {
        self.lengths.get(self.ships.len()).copied()
    }

    pub fn is_placement_complete(&self) -> bool {
        self.ships.len() >= self.lengths.len()
    }

    /// Check a placement without committing it.
    pub fn check_placement(
        &self,
        origin: Coord,
        length: usize,
        orientation: Orientation,
    ) -> Result<Ship, BoardError> {
        let ship = Ship::new(self.ships.len(), origin, length, orientation)?;
        if !(self.occupied & ship.mask()).is_empty() {
            return Err(BoardError::Overlaps);
        }
        Ok(ship)
    }

    /// Place a ship of `length` at `origin`. On success placement advances to
    /// the next configured length. Returns the new ship's index.
    pub fn place_ship(
        &mut self,
        origin: Coord,
        length: usize,
        orientation: Orientation,
    ) -> Result<usize, BoardError> {
        if self.is_placement_complete() {
            return Err(BoardError::PlacementComplete);
        }
        let ship = self.check_placement(origin, length, orientation)?;
        let id = ship.id();
        self.occupied |= ship.mask();
        self.ships.push(ship);
        Ok(id)
    }

    /// Place the next configured ship at `origin`.
    pub fn place_next(&mut self, origin: Coord, orientation: Orientation) -> Result<usize, BoardError> {
        let length = self.next_length().ok_or(BoardError::PlacementComplete)?;
        self.place_ship(origin, length, orientation)
    }

    /// Returns a random non-overlapping origin and orientation for `length`.
    pub fn random_placement<R: Rng>(
        &self,
        rng: &mut R,
        length: usize,
    ) -> Result<(Coord, Orientation), BoardError> {
        if length == 0 || length > GRID_SIZE {
            return Err(BoardError::UnableToPlaceShip);
        }
        for _ in 0..100 {
            let orientation = if rng.random() {
                Orientation::Horizontal
            } else {
                Orientation::Vertical
            };
            let (max_x, max_y) = match orientation {
                Orientation::Horizontal => (GRID_SIZE - length, GRID_SIZE - 1),
                Orientation::Vertical => (GRID_SIZE - 1, GRID_SIZE - length),
            };
            let origin = Coord::new(
                rng.random_range(0..=max_x) as u8,
                rng.random_range(0..=max_y) as u8,
            );
            if self.check_placement(origin, length, orientation).is_ok() {
                return Ok((origin, orientation));
            }
        }
        Err(BoardError::UnableToPlaceShip)
    }

    /// Resolve an opponent's shot at `coord`.
    ///
    /// A coordinate already resolved returns its recorded result untouched.
    /// Otherwise the first afloat ship with an un-hit part there takes the
    /// hit; completing it yields `SUNK`, or `ALL_SUNK` when it was the last
    /// ship afloat.
    pub fn receive_shot(&mut self, coord: Coord) -> ShotResult {
        if let Some(previous) = self.received.get(&coord) {
            return *previous;
        }
        let struck = self
            .ships
            .iter_mut()
            .filter(|s| !s.is_sunk())
            .find(|s| s.parts().iter().any(|p| p.coord == coord && !p.hit))
            .map(|ship| {
                ship.strike(coord);
                ship.is_sunk()
            });
        let result = match struck {
            None => ShotResult::Miss,
            Some(false) => ShotResult::Hit,
            Some(true) if self.is_game_over() => ShotResult::AllSunk,
            Some(true) => ShotResult::Sunk,
        };
        self.received.insert(coord, result);
        result
    }

    /// Shots the opponent has fired at this board.
    pub fn received(&self) -> &BTreeMap<Coord, ShotResult> {
        &self.received
    }

    /// True iff every placed ship is sunk.
    pub fn is_game_over(&self) -> bool {
        self.ships.iter().all(Ship::is_sunk)
    }

    /// The ship part at `coord`, if any.
    pub fn part_at(&self, coord: Coord) -> Option<(usize, bool)> {
        self.ships.iter().find_map(|s| {
            s.parts()
                .iter()
                .find(|p| p.coord == coord)
                .map(|p| (s.id(), p.hit))
        })
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

/// Shots fired at the opponent. `None` marks the single outstanding shot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShotRecord {
    shots: BTreeMap<Coord, Option<ShotResult>>,
    pending: Option<Coord>,
}

impl ShotRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, coord: Coord) -> bool {
        self.shots.contains_key(&coord)
    }

    /// Result for `coord`: `Some(None)` while pending.
    pub fn get(&self, coord: Coord) -> Option<Option<ShotResult>> {
        self.shots.get(&coord).copied()
    }

    pub fn pending(&self) -> Option<Coord> {
        self.pending
    }

    /// Record a shot about to be fired.
    pub fn fire(&mut self, coord: Coord) -> Result<(), BoardError> {
        if self.pending.is_some() {
            return Err(BoardError::ShotPending);
        }
        if self.contains(coord) {
            return Err(BoardError::AlreadyShot);
        }
        self.shots.insert(coord, None);
        self.pending = Some(coord);
        Ok(())
    }

    /// Settle the outstanding shot. Results for any other coordinate are
    /// ignored and `false` is returned.
    pub fn resolve(&mut self, coord: Coord, result: ShotResult) -> bool {
        if self.pending != Some(coord) {
            return false;
        }
        self.shots.insert(coord, Some(result));
        self.pending = None;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, Option<ShotResult>)> + '_ {
        self.shots.iter().map(|(c, r)| (*c, *r))
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }
}
