/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use uci_parser::UciScore;

use crate::MAX_PLY;

/// A numerical representation of the evaluation of a position / move, in units of ["centipawns"](https://www.chessprogramming.org/Score).
///
/// All scores fit in an `i16`, which is how they are stored in the transposition table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Score(pub i32);

impl Score {
    /// Largest possible score ever achievable. Used as the initial search window.
    pub const INF: Self = Self(i16::MAX as i32);

    /// Score of being checkmated at the root.
    pub const MATE: Self = Self(32_000 + MAX_PLY as i32);

    /// Any score at least this far from zero is a forced mate within [`MAX_PLY`] plies.
    pub const MATE_FOUND: Self = Self(Self::MATE.0 - MAX_PLY as i32);

    /// Sentinel for "no score", such as an evaluation-only transposition table entry.
    pub const NONE: Self = Self(Self::MATE.0 + 1);

    /// Score of a draw.
    pub const DRAW: Self = Self(0);

    /// Returns `true` if the score is a mate score.
    #[inline(always)]
    pub const fn is_mate(&self) -> bool {
        self.0 != Self::NONE.0 && self.0.abs() >= Self::MATE_FOUND.0
    }

    /// Returns `true` if this is anything but [`Score::NONE`].
    #[inline(always)]
    pub const fn is_some(&self) -> bool {
        self.0 != Self::NONE.0
    }

    /// Score for the side to move when it has been checkmated `ply` plies from the root.
    #[inline(always)]
    pub const fn mated_in(ply: usize) -> Self {
        Self(-Self::MATE.0 + ply as i32)
    }

    /// Score for the side to move when it delivers mate `ply` plies from the root.
    #[inline(always)]
    pub const fn mate_in(ply: usize) -> Self {
        Self(Self::MATE.0 - ply as i32)
    }

    /// Converts this [`Score`] into a [`UciScore`],
    /// determining whether it is a centipawns score or a mate score.
    ///
    /// Used when sending the `info score` message.
    #[inline(always)]
    pub fn into_uci(self) -> UciScore {
        if self.is_mate() {
            UciScore::mate(self.moves_to_mate())
        } else {
            UciScore::cp(self.0)
        }
    }

    /// Returns the number of plies (half moves) this score is from mate.
    #[inline(always)]
    pub const fn plies_to_mate(&self) -> i32 {
        Self::MATE.0 - self.0.abs()
    }

    /// Returns the number of moves (full moves) this score is from mate.
    ///
    /// # Example
    /// ```
    /// # use newt::Score;
    /// assert_eq!(Score::mate_in(1).moves_to_mate(), 1);
    /// assert_eq!(Score::mate_in(3).moves_to_mate(), 2);
    /// assert_eq!(Score::mated_in(2).moves_to_mate(), -1);
    /// ```
    #[inline(always)]
    pub const fn moves_to_mate(&self) -> i32 {
        let plies = self.plies_to_mate();

        // If this score is in favor of the side-to-move, it will be positive
        // so we add 1 (because we need to make the current move in order for it's score to take effect).
        // Otherwise, the score is for our opponent, so we need to negate it.
        let relative_to_side = if self.0 > 0 { plies + 1 } else { -plies };

        // Divide by 2 to obtain the number of moves (1 move = 2 ply)
        relative_to_side / 2
    }

    /// Normalize the score to the provided ply, so that mate scores count from the node
    /// at `ply` rather than the root.
    #[inline(always)]
    pub fn relative(self, ply: usize) -> Self {
        if !self.is_mate() {
            return self;
        }

        if self > Self::DRAW {
            self + ply as i32
        } else {
            self - ply as i32
        }
    }

    /// De-normalize the score from the provided ply.
    ///
    /// Score will be relative to root (0 ply).
    #[inline(always)]
    pub fn absolute(self, ply: usize) -> Self {
        if !self.is_mate() {
            return self;
        }

        if self > Self::DRAW {
            self - ply as i32
        } else {
            self + ply as i32
        }
    }

    /// Clamps a static evaluation strictly inside the mate range.
    #[inline(always)]
    pub fn clamp_eval(self) -> Self {
        Self(self.0.clamp(-Self::MATE_FOUND.0 + 1, Self::MATE_FOUND.0 - 1))
    }

    /// Returns the absolute value of this [`Score`].
    #[inline(always)]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Performs linear interpolation between `self` and `other` by `t` where `t` is `[0, 24]`.
    #[inline(always)]
    pub const fn lerp(self, other: Self, t: i32) -> Self {
        Self((self.0 * (24 - t) + other.0 * t) / 24)
    }
}

impl From<Score> for UciScore {
    #[inline(always)]
    fn from(value: Score) -> Self {
        value.into_uci()
    }
}

macro_rules! impl_binary_op {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            type Output = Self;

            #[inline(always)]
            fn $fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$fn(rhs.0))
            }
        }

        impl std::ops::$trait<i32> for Score {
            type Output = Self;

            #[inline(always)]
            fn $fn(self, rhs: i32) -> Self::Output {
                Self(self.0.$fn(rhs))
            }
        }
    };
}

macro_rules! impl_binary_op_assign {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            #[inline(always)]
            fn $fn(&mut self, rhs: Self) {
                self.0.$fn(rhs.0);
            }
        }

        impl std::ops::$trait<i32> for Score {
            #[inline(always)]
            fn $fn(&mut self, rhs: i32) {
                self.0.$fn(rhs);
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
impl_binary_op!(Div, div);

impl_binary_op_assign!(AddAssign, add_assign);
impl_binary_op_assign!(SubAssign, sub_assign);

impl std::ops::Neg for Score {
    type Output = Self;

    #[inline(always)]
    fn neg(self) -> Self::Output {
        Self(self.0.neg())
    }
}

impl PartialEq<i32> for Score {
    fn eq(&self, other: &i32) -> bool {
        self.0.eq(other)
    }
}

impl PartialOrd<i32> for Score {
    fn partial_cmp(&self, other: &i32) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl fmt::Display for Score {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Score {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NONE {
            write!(f, "NONE")
        } else if self.is_mate() {
            write!(
                f,
                "{} (mate in {} plies {} moves)",
                self.0,
                self.plies_to_mate(),
                self.moves_to_mate()
            )
        } else {
            write!(f, "{}", self.0)
        }
    }
}
