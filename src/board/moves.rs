/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use thiserror::Error;

use super::{File, PieceKind, Position, Square, SquareParseError};

/// Maximum possible number of moves in a given chess position.
///
/// Found [here](<https://www.chessprogramming.org/Chess_Position#cite_note-4>)
pub const MAX_NUM_MOVES: usize = 218;

/// An alias for an [`arrayvec::ArrayVec`] containing at most [`MAX_NUM_MOVES`] moves.
pub type MoveList = arrayvec::ArrayVec<Move, MAX_NUM_MOVES>;

/// Errors produced when resolving UCI move text against a [`Position`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveParseError {
    #[error("move {0:?} must be 4 or 5 characters long")]
    Length(String),

    #[error(transparent)]
    Square(#[from] SquareParseError),

    #[error("invalid promotion character {0:?}")]
    Promotion(char),

    #[error("{0} is not a legal move in this position")]
    Illegal(String),
}

/// The special-move flag stored in the top two bits of a [`Move`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u16)]
pub enum MoveKind {
    Normal = 0,
    Promotion = 1,
    EnPassant = 2,
    /// Encoded as the king capturing its own rook.
    Castling = 3,
}

impl MoveKind {
    #[inline(always)]
    const fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => Self::Normal,
            1 => Self::Promotion,
            2 => Self::EnPassant,
            _ => Self::Castling,
        }
    }
}

/// Represents a move made on a chess board.
///
/// Internally encoded using the following bit pattern:
/// ```text
///     00 00 000000 000000
///      |  |    |      |
///      |  |    |      +- Destination square.
///      |  |    +- Source square.
///      |  +- Promotion piece (Knight = 0 .. Queen = 3).
///      +- Move kind (Normal, Promotion, EnPassant, Castling).
/// ```
///
/// The all-zero move is the null move.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    /// The null move. Never legal.
    pub const NULL: Self = Self(0);

    const TO_MASK: u16 = 0b111111;
    const FROM_SHIFT: u16 = 6;
    const PROMO_SHIFT: u16 = 12;
    const KIND_SHIFT: u16 = 14;

    /// Creates a new non-promotion [`Move`].
    ///
    /// # Example
    /// ```
    /// # use newt::{Move, MoveKind, Square};
    /// let e2e4 = Move::new(Square::E2, Square::E4, MoveKind::Normal);
    /// assert_eq!(e2e4.from(), Square::E2);
    /// assert_eq!(e2e4.to(), Square::E4);
    /// assert_eq!(e2e4.to_string(), "e2e4");
    /// ```
    #[inline(always)]
    pub const fn new(from: Square, to: Square, kind: MoveKind) -> Self {
        Self(
            (kind as u16) << Self::KIND_SHIFT
                | (from.inner() as u16) << Self::FROM_SHIFT
                | to.inner() as u16,
        )
    }

    /// Creates a promotion [`Move`] to `promotion`, which must be a Knight, Bishop, Rook, or Queen.
    #[inline(always)]
    pub const fn new_promotion(from: Square, to: Square, promotion: PieceKind) -> Self {
        debug_assert!(matches!(
            promotion,
            PieceKind::Knight | PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen
        ));
        let promo = (promotion as u16 - PieceKind::Knight as u16) << Self::PROMO_SHIFT;
        Self(Self::new(from, to, MoveKind::Promotion).0 | promo)
    }

    /// Rebuilds a [`Move`] from its raw bits, as stored in the transposition table.
    #[inline(always)]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits of this [`Move`].
    #[inline(always)]
    pub const fn bits(&self) -> u16 {
        self.0
    }

    #[inline(always)]
    pub const fn from(&self) -> Square {
        Square::from_index_unchecked(((self.0 >> Self::FROM_SHIFT) & Self::TO_MASK) as usize)
    }

    #[inline(always)]
    pub const fn to(&self) -> Square {
        Square::from_index_unchecked((self.0 & Self::TO_MASK) as usize)
    }

    #[inline(always)]
    pub const fn kind(&self) -> MoveKind {
        MoveKind::from_bits(self.0 >> Self::KIND_SHIFT)
    }

    /// The piece kind promoted to. Only meaningful for [`MoveKind::Promotion`].
    #[inline(always)]
    pub const fn promotion(&self) -> PieceKind {
        PieceKind::from_index_unchecked(((self.0 >> Self::PROMO_SHIFT) & 3) as usize + 1)
    }

    #[inline(always)]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub const fn is_some(&self) -> bool {
        self.0 != 0
    }

    /// Returns `None` for the null move.
    #[inline(always)]
    pub const fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    /// The square the king actually lands on for castling moves, otherwise the destination.
    ///
    /// # Example
    /// ```
    /// # use newt::{Move, MoveKind, Square};
    /// let castle = Move::new(Square::E8, Square::A8, MoveKind::Castling);
    /// assert_eq!(castle.king_to(), Square::C8);
    /// ```
    #[inline(always)]
    pub const fn king_to(&self) -> Square {
        let to = self.to();
        if !matches!(self.kind(), MoveKind::Castling) {
            return to;
        }

        let file = if to.inner() > self.from().inner() {
            File::G
        } else {
            File::C
        };
        Square::new(file, to.rank())
    }

    /// Resolves UCI text like `e2e4`, `e7e8q` or `e1g1` against the legal moves of `position`.
    ///
    /// Castling is accepted either as the king's destination or as the king capturing its rook.
    ///
    /// # Example
    /// ```
    /// # use newt::{Move, MoveKind, Position, Square};
    /// let pos: Position = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
    /// let castle = Move::new(Square::E1, Square::H1, MoveKind::Castling);
    /// assert_eq!(Move::from_uci(&pos, "e1g1"), Ok(castle));
    /// assert_eq!(Move::from_uci(&pos, "e1h1"), Ok(castle));
    /// assert!(Move::from_uci(&pos, "e1e3").is_err());
    /// ```
    pub fn from_uci(position: &Position, uci: &str) -> Result<Self, MoveParseError> {
        if !(4..=5).contains(&uci.len()) || !uci.is_ascii() {
            return Err(MoveParseError::Length(uci.to_string()));
        }

        let from = Square::from_uci(&uci[0..2])?;
        let to = Square::from_uci(&uci[2..4])?;
        let promotion = match uci.chars().nth(4) {
            Some(c) => match PieceKind::from_uci(c) {
                Ok(kind @ (PieceKind::Knight | PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen)) => {
                    Some(kind)
                }
                _ => return Err(MoveParseError::Promotion(c)),
            },
            None => None,
        };

        position
            .legal_moves()
            .into_iter()
            .find(|mv| {
                let promotes = (mv.kind() == MoveKind::Promotion).then(|| mv.promotion());
                mv.from() == from && (mv.to() == to || mv.king_to() == to) && promotes == promotion
            })
            .ok_or_else(|| MoveParseError::Illegal(uci.to_string()))
    }
}

impl fmt::Display for Move {
    /// A [`Move`] is displayed in its UCI format, with castling shown as the king's real destination.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "0000");
        }

        write!(f, "{}{}", self.from(), self.king_to())?;
        if self.kind() == MoveKind::Promotion {
            write!(f, "{}", self.promotion())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} ({:?})", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_fields() {
        let mv = Move::new_promotion(Square::B7, Square::A8, PieceKind::Knight);
        assert_eq!(mv.from(), Square::B7);
        assert_eq!(mv.to(), Square::A8);
        assert_eq!(mv.kind(), MoveKind::Promotion);
        assert_eq!(mv.promotion(), PieceKind::Knight);
        assert_eq!(mv.to_string(), "b7a8n");

        let queen = Move::new_promotion(Square::B7, Square::B8, PieceKind::Queen);
        assert_eq!(queen.promotion(), PieceKind::Queen);
        assert_eq!(Move::from_bits(queen.bits()), queen);
    }

    #[test]
    fn test_null_move() {
        assert!(Move::NULL.is_null());
        assert_eq!(Move::default(), Move::NULL);
        assert_eq!(Move::NULL.non_null(), None);
        assert_eq!(Move::NULL.to_string(), "0000");
    }

    #[test]
    fn test_castling_notation() {
        let short = Move::new(Square::E1, Square::H1, MoveKind::Castling);
        let long = Move::new(Square::E1, Square::A1, MoveKind::Castling);
        assert_eq!(short.to_string(), "e1g1");
        assert_eq!(long.to_string(), "e1c1");
        assert_eq!(long.to(), Square::A1);
    }

    #[test]
    fn test_parse_rejects_bad_text() {
        let pos = Position::default();
        assert!(matches!(Move::from_uci(&pos, "e2"), Err(MoveParseError::Length(_))));
        assert!(matches!(Move::from_uci(&pos, "e2z4"), Err(MoveParseError::Square(_))));
        assert!(matches!(Move::from_uci(&pos, "e2e4k"), Err(MoveParseError::Promotion('k'))));
        assert!(matches!(Move::from_uci(&pos, "e2e5"), Err(MoveParseError::Illegal(_))));
        assert_eq!(Move::from_uci(&pos, "g1f3").map(|mv| mv.to_string()), Ok("g1f3".to_string()));
    }
}
