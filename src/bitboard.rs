//! A fixed-size occupancy mask using const generics.
//!
//! Cells of an `N×N` grid are packed into an unsigned integer `T`, indexed by
//! [`Coord`] with `x` as the column and `y` as the row.

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};
use num_traits::{PrimInt, Unsigned, Zero};

use crate::common::Coord;

/// Errors returned by bitboard operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitBoardError {
    /// Coordinate lies outside [0..N).
    OutOfBounds { x: usize, y: usize },
}

impl fmt::Display for BitBoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitBoardError::OutOfBounds { x, y } => {
                write!(f, "cell ({}, {}) is outside the grid", x, y)
            }
        }
    }
}

impl std::error::Error for BitBoardError {}

/// A fixed-size N×N bitboard stored in the unsigned integer `T`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BitBoard<T, const N: usize>
where
    T: PrimInt + Unsigned + Zero,
{
    bits: T,
}

impl<T, const N: usize> BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    /// Create an empty board.
    pub fn new() -> Self {
        BitBoard { bits: T::zero() }
    }

    #[inline]
    fn index(coord: Coord) -> Result<usize, BitBoardError> {
        let (x, y) = (coord.x as usize, coord.y as usize);
        if x >= N || y >= N {
            return Err(BitBoardError::OutOfBounds { x, y });
        }
        Ok(y * N + x)
    }

    /// Whether the cell at `coord` is set.
    pub fn get(&self, coord: Coord) -> Result<bool, BitBoardError> {
        let idx = Self::index(coord)?;
        Ok((self.bits >> idx) & T::one() == T::one())
    }

    /// Mark the cell at `coord`.
    pub fn set(&mut self, coord: Coord) -> Result<(), BitBoardError> {
        let idx = Self::index(coord)?;
        self.bits = self.bits | (T::one() << idx);
        Ok(())
    }

    /// Number of set cells.
    pub fn count_ones(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_zero()
    }

    /// Iterate set cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..N * N)
            .filter(move |idx| (self.bits >> *idx) & T::one() == T::one())
            .map(|idx| Coord::new((idx % N) as u8, (idx / N) as u8))
    }
}

impl<T, const N: usize> Default for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> BitAnd for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        BitBoard {
            bits: self.bits & rhs.bits,
        }
    }
}

impl<T, const N: usize> BitOr for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        BitBoard {
            bits: self.bits | rhs.bits,
        }
    }
}

impl<T, const N: usize> BitOrAssign for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    fn bitor_assign(&mut self, rhs: Self) {
        self.bits = self.bits | rhs.bits;
    }
}

impl<T, const N: usize> fmt::Debug for BitBoard<T, N>
where
    T: PrimInt + Unsigned + Zero,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BitBoard<{}x{}> {{", N, N)?;
        for y in 0..N {
            write!(f, "  ")?;
            for x in 0..N {
                let set = self.get(Coord::new(x as u8, y as u8)).unwrap_or(false);
                write!(f, "{}", if set { '#' } else { '.' })?;
            }
            writeln!(f)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_cells_are_row_major() {
        let mut bb = BitBoard::<u32, 5>::new();
        bb.set(Coord::new(4, 0)).unwrap();
        bb.set(Coord::new(0, 1)).unwrap();
        assert!(bb.get(Coord::new(4, 0)).unwrap());
        assert!(!bb.get(Coord::new(3, 0)).unwrap());
        assert_eq!(
            bb.cells().collect::<Vec<_>>(),
            vec![Coord::new(4, 0), Coord::new(0, 1)]
        );
        assert_eq!(bb.count_ones(), 2);
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut bb = BitBoard::<u32, 5>::new();
        assert_eq!(
            bb.set(Coord::new(5, 0)),
            Err(BitBoardError::OutOfBounds { x: 5, y: 0 })
        );
        assert!(bb.is_empty());
    }
}
