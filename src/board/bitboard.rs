/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, ops::Not};

use super::{Color, File, Rank, Square};

/// A [`Bitboard`] represents a set of squares as the bits of a `u64`.
///
/// Bit index 0 is A1 and bit index 63 is H8 ([LERF](https://www.chessprogramming.org/Square_Mapping_Considerations#Little-Endian_Rank-File_Mapping)),
/// so the first rank looks like this:
/// ```text
/// 00000000
/// 00000000
/// 00000000
/// 00000000
/// 00000000
/// 00000000
/// 00000000
/// 11111111
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Bitboard(pub(crate) u64);

impl Bitboard {
    pub const FILE_A: Self = Self(0x0101010101010101);
    pub const FILE_H: Self = Self(0x8080808080808080);
    pub const NOT_FILE_A: Self = Self(0xfefefefefefefefe);
    pub const NOT_FILE_H: Self = Self(0x7f7f7f7f7f7f7f7f);
    pub const RANK_1: Self = Self(0x00000000000000FF);
    pub const RANK_3: Self = Self(0x0000000000FF0000);
    pub const RANK_6: Self = Self(0x0000FF0000000000);
    pub const RANK_8: Self = Self(0xFF00000000000000);
    pub const LIGHT_SQUARES: Self = Self(0x55AA55AA55AA55AA);
    pub const DARK_SQUARES: Self = Self(0xAA55AA55AA55AA55);
    pub const EMPTY_BOARD: Self = Self(0);
    pub const FULL_BOARD: Self = Self(u64::MAX);
    pub const BACK_RANKS: Self = Self(0xFF000000000000FF);

    /// Constructs a new [`Bitboard`] from the provided bit pattern.
    ///
    /// # Example
    /// ```
    /// # use newt::Bitboard;
    /// let board = Bitboard::new(255);
    /// assert_eq!(board, Bitboard::RANK_1);
    /// ```
    #[inline(always)]
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Constructs a new [`Bitboard`] with only the bit of `square` set.
    #[inline(always)]
    pub const fn from_square(square: Square) -> Self {
        Self(1 << square.index())
    }

    /// Constructs a new [`Bitboard`] of an entire file.
    ///
    /// # Example
    /// ```
    /// # use newt::{Bitboard, File};
    /// assert_eq!(Bitboard::from_file(File::H), Bitboard::FILE_H);
    /// ```
    #[inline(always)]
    pub const fn from_file(file: File) -> Self {
        Self(Self::FILE_A.0 << file.0)
    }

    /// Constructs a new [`Bitboard`] of an entire rank.
    #[inline(always)]
    pub const fn from_rank(rank: Rank) -> Self {
        Self(Self::RANK_1.0 << (rank.0 * 8))
    }

    /// Returns the inner `u64` of this [`Bitboard`].
    #[inline(always)]
    pub const fn inner(&self) -> u64 {
        self.0
    }

    /// Checks if this [`Bitboard`] is empty, meaning all bits are set to `0`.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Checks if this [`Bitboard`] contains at least one set bit.
    #[inline(always)]
    pub const fn is_nonempty(&self) -> bool {
        self.0 != 0
    }

    /// Returns `true` if more than one bit is set.
    ///
    /// # Example
    /// ```
    /// # use newt::{Bitboard, Square};
    /// assert!(Bitboard::RANK_1.is_many());
    /// assert!(!Square::A1.bitboard().is_many());
    /// assert!(!Bitboard::EMPTY_BOARD.is_many());
    /// ```
    #[inline(always)]
    pub const fn is_many(&self) -> bool {
        self.0 & self.0.wrapping_sub(1) != 0
    }

    /// Returns `true` if `self` and `other` share at least one square.
    #[inline(always)]
    pub fn intersects(&self, other: impl Into<Self>) -> bool {
        self.0 & other.into().0 != 0
    }

    /// Returns `true` if `square` is set in this [`Bitboard`].
    #[inline(always)]
    pub const fn contains(&self, square: Square) -> bool {
        self.0 & (1 << square.index()) != 0
    }

    /// Returns the lowest set square, if any.
    #[inline(always)]
    pub const fn lsb(&self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            Some(self.lsb_unchecked())
        }
    }

    /// Returns the lowest set square. The board must be non-empty.
    #[inline(always)]
    pub const fn lsb_unchecked(&self) -> Square {
        Square::from_index_unchecked(self.0.trailing_zeros() as usize)
    }

    /// Returns the highest set square. The board must be non-empty.
    #[inline(always)]
    pub const fn msb_unchecked(&self) -> Square {
        Square::from_index_unchecked(63 - self.0.leading_zeros() as usize)
    }

    /// Removes and returns the lowest set square, if any.
    #[inline(always)]
    pub fn pop_lsb(&mut self) -> Option<Square> {
        let lsb = self.lsb();
        self.clear_lsb();
        lsb
    }

    /// Clears the lowest set bit.
    #[inline(always)]
    pub fn clear_lsb(&mut self) {
        self.0 &= self.0.wrapping_sub(1);
    }

    /// Returns an iterator over all set squares, lowest first.
    #[inline(always)]
    pub const fn iter(&self) -> BitboardIter {
        BitboardIter { bitboard: *self }
    }

    /// Number of set bits.
    #[inline(always)]
    pub const fn population(&self) -> u8 {
        self.0.count_ones() as u8
    }

    /// Shifts this board one rank forward, relative to `color`.
    ///
    /// # Example
    /// ```
    /// # use newt::{Bitboard, Color, Rank};
    /// let third = Bitboard::from_rank(Rank::THREE);
    /// assert_eq!(Bitboard::RANK_1.forward(Color::White).forward(Color::White), third);
    /// assert_eq!(Bitboard::RANK_8.forward(Color::Black), Bitboard::from_rank(Rank::SEVEN));
    /// ```
    #[inline(always)]
    pub const fn forward(self, color: Color) -> Self {
        match color {
            Color::White => self.north(),
            Color::Black => self.south(),
        }
    }

    /// Shifts all bits one rank up.
    #[inline(always)]
    pub const fn north(self) -> Self {
        Self(self.0 << 8)
    }

    /// Shifts all bits one rank down.
    #[inline(always)]
    pub const fn south(self) -> Self {
        Self(self.0 >> 8)
    }

    /// Shifts all bits one file to the right, dropping the H file.
    #[inline(always)]
    pub const fn east(self) -> Self {
        Self((self.0 & Self::NOT_FILE_H.0) << 1)
    }

    /// Shifts all bits one file to the left, dropping the A file.
    #[inline(always)]
    pub const fn west(self) -> Self {
        Self((self.0 & Self::NOT_FILE_A.0) >> 1)
    }

    /// `const` analog of [`std::ops::BitAnd::bitand`].
    #[inline(always)]
    pub const fn and(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// `const` analog of [`std::ops::BitOr::bitor`].
    #[inline(always)]
    pub const fn or(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `const` analog of [`std::ops::BitXor::bitxor`].
    #[inline(always)]
    pub const fn xor(self, other: Self) -> Self {
        Self(self.0 ^ other.0)
    }

    /// `const` analog of [`Not::not`].
    #[inline(always)]
    pub const fn not(self) -> Self {
        Self(!self.0)
    }
}

impl FromIterator<Square> for Bitboard {
    fn from_iter<T: IntoIterator<Item = Square>>(iter: T) -> Self {
        iter.into_iter().fold(Self::default(), |bb, sq| bb | sq)
    }
}

macro_rules! impl_bitwise_op {
    ($op:tt, $op_assign:tt, $func:ident, $func_assign:ident) => {
        impl<T> std::ops::$op<T> for Bitboard
        where
            Self: From<T>,
        {
            type Output = Self;
            #[inline(always)]
            fn $func(self, rhs: T) -> Self::Output {
                Self(self.0.$func(Self::from(rhs).0))
            }
        }

        impl<T> std::ops::$op_assign<T> for Bitboard
        where
            Self: From<T>,
        {
            #[inline(always)]
            fn $func_assign(&mut self, rhs: T) {
                self.0.$func_assign(Self::from(rhs).0);
            }
        }
    };
}

impl_bitwise_op!(BitAnd, BitAndAssign, bitand, bitand_assign);
impl_bitwise_op!(BitOr, BitOrAssign, bitor, bitor_assign);
impl_bitwise_op!(BitXor, BitXorAssign, bitxor, bitxor_assign);

impl Not for Bitboard {
    type Output = Self;
    #[inline(always)]
    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl From<Square> for Bitboard {
    #[inline(always)]
    fn from(value: Square) -> Self {
        Self::from_square(value)
    }
}

impl From<u64> for Bitboard {
    #[inline(always)]
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in Rank::iter().rev() {
            for file in File::iter() {
                let occupant = if self.contains(Square::new(file, rank)) {
                    'X'
                } else {
                    '.'
                };
                write!(f, "{occupant} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitboard(0x{:0>16X})", self.0)
    }
}

/// An iterator over all set bits in a [`Bitboard`].
///
/// See [`Bitboard::iter`].
pub struct BitboardIter {
    bitboard: Bitboard,
}

impl Iterator for BitboardIter {
    type Item = Square;
    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        self.bitboard.pop_lsb()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let size = self.bitboard.population() as usize;
        (size, Some(size))
    }
}

impl ExactSizeIterator for BitboardIter {}

impl IntoIterator for Bitboard {
    type Item = Square;
    type IntoIter = BitboardIter;
    #[inline(always)]
    fn into_iter(self) -> Self::IntoIter {
        BitboardIter { bitboard: self }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lsb_msb() {
        let board = Square::C3.bitboard() | Square::F6;
        assert_eq!(board.lsb(), Some(Square::C3));
        assert_eq!(board.msb_unchecked(), Square::F6);
        assert_eq!(Bitboard::EMPTY_BOARD.lsb(), None);
    }

    #[test]
    fn test_iter_collect() {
        let squares = [Square::A1, Square::E4, Square::H8];
        let board: Bitboard = squares.into_iter().collect();
        assert_eq!(board.population(), 3);
        assert_eq!(board.iter().collect::<Vec<_>>(), squares);
    }

    #[test]
    fn test_shifts_drop_edges() {
        assert!(Bitboard::FILE_H.east().is_empty());
        assert!(Bitboard::FILE_A.west().is_empty());
        assert_eq!(Bitboard::FILE_A.east(), Bitboard::from_file(File::B));
        assert!(Bitboard::RANK_8.north().is_empty());
    }
}
