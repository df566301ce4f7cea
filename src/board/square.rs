/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::{Index, IndexMut},
    str::FromStr,
};

use thiserror::Error;

use super::{Bitboard, Color};

/// Errors produced when parsing squares, files, or ranks from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SquareParseError {
    #[error("invalid file {0:?}: expected one of [a-h]")]
    File(char),

    #[error("invalid rank {0:?}: expected one of [1-8]")]
    Rank(char),

    #[error("invalid square {0:?}: expected exactly 2 characters")]
    Length(String),
}

/// Represents a single square on an `8x8` chess board.
///
/// Squares use [Little-Endian Rank-File Mapping](https://www.chessprogramming.org/Square_Mapping_Considerations#Little-Endian_Rank-File_Mapping),
/// so `square = file + rank * 8`:
/// ```text
/// 8| 56 57 58 59 60 61 62 63
/// 7| 48 49 50 51 52 53 54 55
/// 6| 40 41 42 43 44 45 46 47
/// 5| 32 33 34 35 36 37 38 39
/// 4| 24 25 26 27 28 29 30 31
/// 3| 16 17 18 19 20 21 22 23
/// 2|  8  9 10 11 12 13 14 15
/// 1|  0  1  2  3  4  5  6  7
///  +------------------------
///    a  b  c  d  e  f  g  h
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Square(pub(crate) u8);

macro_rules! squares {
    ($($name:ident = $idx:expr),* $(,)?) => {
        impl Square {
            $(pub const $name: Self = Self($idx);)*
        }
    };
}

#[rustfmt::skip]
squares!(
    A1 = 0,  B1 = 1,  C1 = 2,  D1 = 3,  E1 = 4,  F1 = 5,  G1 = 6,  H1 = 7,
    A2 = 8,  B2 = 9,  C2 = 10, D2 = 11, E2 = 12, F2 = 13, G2 = 14, H2 = 15,
    A3 = 16, B3 = 17, C3 = 18, D3 = 19, E3 = 20, F3 = 21, G3 = 22, H3 = 23,
    A4 = 24, B4 = 25, C4 = 26, D4 = 27, E4 = 28, F4 = 29, G4 = 30, H4 = 31,
    A5 = 32, B5 = 33, C5 = 34, D5 = 35, E5 = 36, F5 = 37, G5 = 38, H5 = 39,
    A6 = 40, B6 = 41, C6 = 42, D6 = 43, E6 = 44, F6 = 45, G6 = 46, H6 = 47,
    A7 = 48, B7 = 49, C7 = 50, D7 = 51, E7 = 52, F7 = 53, G7 = 54, H7 = 55,
    A8 = 56, B8 = 57, C8 = 58, D8 = 59, E8 = 60, F8 = 61, G8 = 62, H8 = 63,
);

impl Square {
    /// Number of squares on the board.
    pub const COUNT: usize = 64;

    /// Returns an iterator over all squares, from A1 to H8.
    #[inline(always)]
    pub fn iter() -> impl ExactSizeIterator<Item = Self> + DoubleEndedIterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }

    /// Constructs a new [`Square`] from the provided [`File`] and [`Rank`].
    ///
    /// # Example
    /// ```
    /// # use newt::{File, Rank, Square};
    /// assert_eq!(Square::new(File::C, Rank::FOUR), Square::C4);
    /// ```
    #[inline(always)]
    pub const fn new(file: File, rank: Rank) -> Self {
        Self(rank.0 << 3 | file.0)
    }

    /// Creates a [`Square`] from an index in `[0, 63]`, without bounds checking.
    #[inline(always)]
    pub const fn from_index_unchecked(index: usize) -> Self {
        debug_assert!(index < Self::COUNT);
        Self(index as u8)
    }

    /// Returns the index of this [`Square`], for indexing into tables.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Returns the inner `u8` of this [`Square`].
    #[inline(always)]
    pub const fn inner(&self) -> u8 {
        self.0
    }

    /// Fetches the [`File`] of this [`Square`].
    #[inline(always)]
    pub const fn file(&self) -> File {
        File(self.0 & 7)
    }

    /// Fetches the [`Rank`] of this [`Square`].
    #[inline(always)]
    pub const fn rank(&self) -> Rank {
        Rank(self.0 >> 3)
    }

    /// Alias for [`Bitboard::from_square`].
    #[inline(always)]
    pub const fn bitboard(&self) -> Bitboard {
        Bitboard::from_square(*self)
    }

    /// Returns `true` if this is a light square.
    ///
    /// # Example
    /// ```
    /// # use newt::Square;
    /// assert!(Square::H1.is_light());
    /// assert!(!Square::A1.is_light());
    /// ```
    #[inline(always)]
    pub const fn is_light(&self) -> bool {
        (self.file().0 + self.rank().0) % 2 == 1
    }

    /// Flips this square vertically (A1 <-> A8) if `color` is Black.
    ///
    /// # Example
    /// ```
    /// # use newt::{Color, Square};
    /// assert_eq!(Square::E1.relative_to(Color::White), Square::E1);
    /// assert_eq!(Square::E1.relative_to(Color::Black), Square::E8);
    /// ```
    #[inline(always)]
    pub const fn relative_to(self, color: Color) -> Self {
        match color {
            Color::White => self,
            Color::Black => Self(self.0 ^ 56),
        }
    }

    /// Attempt to offset this [`Square`] by the file and rank deltas.
    ///
    /// Returns `None` if the result would leave the board.
    ///
    /// # Example
    /// ```
    /// # use newt::Square;
    /// assert_eq!(Square::C4.offset(1, 1), Some(Square::D5));
    /// assert_eq!(Square::A1.offset(-1, 0), None);
    /// ```
    #[inline(always)]
    pub const fn offset(&self, file_delta: i8, rank_delta: i8) -> Option<Self> {
        let Some(file) = self.file().offset(file_delta) else {
            return None;
        };

        let Some(rank) = self.rank().offset(rank_delta) else {
            return None;
        };

        Some(Self::new(file, rank))
    }

    /// Moves this square one rank backwards relative to `color`: the square of a pawn that was just double-pushed past it.
    #[inline(always)]
    pub const fn behind(self, color: Color) -> Self {
        match color {
            Color::White => Self(self.0 - 8),
            Color::Black => Self(self.0 + 8),
        }
    }

    /// Parses a [`Square`] from UCI notation, like `e4`.
    ///
    /// # Example
    /// ```
    /// # use newt::Square;
    /// assert_eq!(Square::from_uci("c4"), Ok(Square::C4));
    /// assert!(Square::from_uci("z0").is_err());
    /// ```
    pub fn from_uci(square: &str) -> Result<Self, SquareParseError> {
        let mut chars = square.chars();
        let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(SquareParseError::Length(square.to_string()));
        };

        Ok(Self::new(File::from_char(file)?, Rank::from_char(rank)?))
    }
}

impl FromStr for Square {
    type Err = SquareParseError;
    #[inline(always)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uci(s)
    }
}

impl<T> Index<Square> for [T; Square::COUNT] {
    type Output = T;
    #[inline(always)]
    fn index(&self, index: Square) -> &Self::Output {
        &self[index.index()]
    }
}

impl<T> IndexMut<Square> for [T; Square::COUNT] {
    #[inline(always)]
    fn index_mut(&mut self, index: Square) -> &mut Self::Output {
        &mut self[index.index()]
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} ({})", self.0)
    }
}

/// Represents one of eight ranks on a chess board.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Rank(pub(crate) u8);

impl Rank {
    pub const ONE: Self = Self(0);
    pub const TWO: Self = Self(1);
    pub const THREE: Self = Self(2);
    pub const FOUR: Self = Self(3);
    pub const FIVE: Self = Self(4);
    pub const SIX: Self = Self(5);
    pub const SEVEN: Self = Self(6);
    pub const EIGHT: Self = Self(7);

    pub const COUNT: usize = 8;

    /// Returns an iterator over all ranks, in ascending order.
    #[inline(always)]
    pub fn iter() -> impl ExactSizeIterator<Item = Self> + DoubleEndedIterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }

    /// Parses a rank from a char in `[1, 8]`.
    pub fn from_char(rank: char) -> Result<Self, SquareParseError> {
        match rank {
            '1'..='8' => Ok(Self(rank as u8 - b'1')),
            _ => Err(SquareParseError::Rank(rank)),
        }
    }

    /// Returns the index of this [`Rank`].
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Returns this rank's char representation.
    #[inline(always)]
    pub const fn char(&self) -> char {
        (self.0 + b'1') as char
    }

    /// Offsets this rank by `delta`, if the result remains on the board.
    #[inline(always)]
    pub const fn offset(self, delta: i8) -> Option<Self> {
        let new = self.0 as i8 + delta;
        if new < 0 || new > 7 {
            None
        } else {
            Some(Self(new as u8))
        }
    }

    /// The `n`th rank (zero-based) from `color`'s side of the board.
    #[inline(always)]
    pub const fn relative(n: u8, color: Color) -> Self {
        match color {
            Color::White => Self(n),
            Color::Black => Self(7 - n),
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Represents one of eight files on a chess board.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct File(pub(crate) u8);

impl File {
    pub const A: Self = Self(0);
    pub const B: Self = Self(1);
    pub const C: Self = Self(2);
    pub const D: Self = Self(3);
    pub const E: Self = Self(4);
    pub const F: Self = Self(5);
    pub const G: Self = Self(6);
    pub const H: Self = Self(7);

    pub const COUNT: usize = 8;

    /// Returns an iterator over all files, from A to H.
    #[inline(always)]
    pub fn iter() -> impl ExactSizeIterator<Item = Self> + DoubleEndedIterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }

    /// Parses a file from a char in `[a, h]`. Uppercase is accepted.
    pub fn from_char(file: char) -> Result<Self, SquareParseError> {
        match file.to_ascii_lowercase() {
            c @ 'a'..='h' => Ok(Self(c as u8 - b'a')),
            _ => Err(SquareParseError::File(file)),
        }
    }

    /// Returns the index of this [`File`].
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Returns this file's (lowercase) char representation.
    #[inline(always)]
    pub const fn char(&self) -> char {
        (self.0 + b'a') as char
    }

    /// Offsets this file by `delta`, if the result remains on the board.
    #[inline(always)]
    pub const fn offset(self, delta: i8) -> Option<Self> {
        let new = self.0 as i8 + delta;
        if new < 0 || new > 7 {
            None
        } else {
            Some(Self(new as u8))
        }
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_parts() {
        assert_eq!(Square::E4.file(), File::E);
        assert_eq!(Square::E4.rank(), Rank::FOUR);
        assert_eq!(Square::new(File::H, Rank::EIGHT), Square::H8);
        assert_eq!(Square::iter().count(), Square::COUNT);
    }

    #[test]
    fn test_square_uci() {
        for square in Square::iter() {
            assert_eq!(Square::from_uci(&square.to_string()), Ok(square));
        }

        assert_eq!(
            Square::from_uci("e44"),
            Err(SquareParseError::Length(String::from("e44")))
        );
        assert_eq!(Square::from_uci("i4"), Err(SquareParseError::File('i')));
        assert_eq!(Square::from_uci("a9"), Err(SquareParseError::Rank('9')));
    }

    #[test]
    fn test_behind() {
        assert_eq!(Square::E3.behind(Color::White), Square::E2);
        assert_eq!(Square::E6.behind(Color::Black), Square::E7);
    }
}
