/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::{BitAnd, BitOr, BitOrAssign, BitXorAssign},
};

use super::{Color, File, Rank, Square};

/// The set of castling rights still available, as a 4-bit mask.
///
/// ```text
/// bit 0: White short (K)
/// bit 1: White long  (Q)
/// bit 2: Black short (k)
/// bit 3: Black long  (q)
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct CastlingRights(u8);

impl CastlingRights {
    /// Number of distinct masks.
    pub const COUNT: usize = 16;

    pub const NONE: Self = Self(0);
    pub const WHITE_SHORT: Self = Self(1);
    pub const WHITE_LONG: Self = Self(1 << 1);
    pub const BLACK_SHORT: Self = Self(1 << 2);
    pub const BLACK_LONG: Self = Self(1 << 3);
    pub const WHITE: Self = Self(Self::WHITE_SHORT.0 | Self::WHITE_LONG.0);
    pub const BLACK: Self = Self(Self::BLACK_SHORT.0 | Self::BLACK_LONG.0);
    pub const ALL: Self = Self(Self::WHITE.0 | Self::BLACK.0);

    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Both rights of `color`.
    #[inline(always)]
    pub const fn of(color: Color) -> Self {
        match color {
            Color::White => Self::WHITE,
            Color::Black => Self::BLACK,
        }
    }

    /// The kingside right of `color`.
    #[inline(always)]
    pub const fn short(color: Color) -> Self {
        match color {
            Color::White => Self::WHITE_SHORT,
            Color::Black => Self::BLACK_SHORT,
        }
    }

    /// The queenside right of `color`.
    #[inline(always)]
    pub const fn long(color: Color) -> Self {
        match color {
            Color::White => Self::WHITE_LONG,
            Color::Black => Self::BLACK_LONG,
        }
    }

    /// The right tied to a rook starting on `corner`, or [`CastlingRights::NONE`] if `corner`
    /// is not a starting rook square.
    ///
    /// # Example
    /// ```
    /// # use newt::{CastlingRights, Square};
    /// assert_eq!(CastlingRights::from_corner(Square::H8), CastlingRights::BLACK_SHORT);
    /// assert_eq!(CastlingRights::from_corner(Square::E1), CastlingRights::NONE);
    /// ```
    #[inline(always)]
    pub const fn from_corner(corner: Square) -> Self {
        match corner {
            Square::A1 => Self::WHITE_LONG,
            Square::H1 => Self::WHITE_SHORT,
            Square::A8 => Self::BLACK_LONG,
            Square::H8 => Self::BLACK_SHORT,
            _ => Self::NONE,
        }
    }

    /// Returns `true` if any right in `other` is present in `self`.
    #[inline(always)]
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

/// Where the king lands when castling towards `short` (kingside) or not.
#[inline(always)]
pub const fn king_to(color: Color, short: bool) -> Square {
    let file = if short { File::G } else { File::C };
    Square::new(file, Rank::relative(0, color))
}

/// Where the castling rook starts.
#[inline(always)]
pub const fn rook_from(color: Color, short: bool) -> Square {
    let file = if short { File::H } else { File::A };
    Square::new(file, Rank::relative(0, color))
}

/// Where the rook lands when castling.
#[inline(always)]
pub const fn rook_to(color: Color, short: bool) -> Square {
    let file = if short { File::F } else { File::D };
    Square::new(file, Rank::relative(0, color))
}

impl BitAnd for CastlingRights {
    type Output = Self;
    #[inline(always)]
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for CastlingRights {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CastlingRights {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitXorAssign for CastlingRights {
    #[inline(always)]
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl fmt::Display for CastlingRights {
    /// Formats in FEN notation, `-` if no rights remain.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }

        for (right, c) in [
            (Self::WHITE_SHORT, 'K'),
            (Self::WHITE_LONG, 'Q'),
            (Self::BLACK_SHORT, 'k'),
            (Self::BLACK_LONG, 'q'),
        ] {
            if self.intersects(right) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_castling_display() {
        assert_eq!(CastlingRights::ALL.to_string(), "KQkq");
        assert_eq!(CastlingRights::NONE.to_string(), "-");
        assert_eq!((CastlingRights::WHITE_LONG | CastlingRights::BLACK_SHORT).to_string(), "Qk");
    }

    #[test]
    fn test_castling_destinations() {
        assert_eq!(king_to(Color::White, true), Square::G1);
        assert_eq!(rook_to(Color::Black, false), Square::D8);
    }
}
