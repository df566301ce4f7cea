/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, ops::BitXor};

use super::{CastlingRights, File, Piece, Square, XoShiRo};

/// Zobrist keys, generated once at compile time.
const ZOBRIST_TABLE: ZobristTable = ZobristTable::new();

/// Represents a key generated from a Zobrist Hash.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
#[repr(transparent)]
pub struct ZobristKey(pub(crate) u64);

impl ZobristKey {
    /// Return the inner `u64` of this key.
    #[inline(always)]
    pub const fn inner(&self) -> u64 {
        self.0
    }

    /// The key of `piece` standing on `square`.
    ///
    /// # Example
    /// ```
    /// # use newt::{Color, Piece, PieceKind, Square, ZobristKey};
    /// let pawn = Piece::new(Color::Black, PieceKind::Pawn);
    /// assert_ne!(ZobristKey::piece(pawn, Square::D7), ZobristKey::piece(pawn, Square::D5));
    /// ```
    #[inline(always)]
    pub const fn piece(piece: Piece, square: Square) -> Self {
        Self(ZOBRIST_TABLE.pieces[piece.index()][square.index()])
    }

    /// The key of an en passant square on `file`.
    #[inline(always)]
    pub const fn ep_file(file: File) -> Self {
        Self(ZOBRIST_TABLE.ep_files[file.index()])
    }

    /// The combined key of every right in `rights`. The empty set hashes to zero.
    #[inline(always)]
    pub const fn castling(rights: CastlingRights) -> Self {
        Self(ZOBRIST_TABLE.castling[rights.index()])
    }

    /// Hashed into a position's key when White is to move.
    #[inline(always)]
    pub const fn side() -> Self {
        Self(ZOBRIST_TABLE.side)
    }

    /// Adds or removes `piece` on `square`.
    #[inline(always)]
    pub fn toggle_piece(&mut self, piece: Piece, square: Square) {
        self.0 ^= Self::piece(piece, square).0;
    }
}

impl BitXor for ZobristKey {
    type Output = Self;
    #[inline(always)]
    fn bitxor(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl std::ops::BitXorAssign for ZobristKey {
    #[inline(always)]
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl fmt::Display for ZobristKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl fmt::Debug for ZobristKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZobristKey({self})")
    }
}

struct ZobristTable {
    pieces: [[u64; Square::COUNT]; Piece::COUNT],
    ep_files: [u64; File::COUNT],
    /// One key per rights mask, each the XOR of its single-right keys.
    castling: [u64; CastlingRights::COUNT],
    side: u64,
}

impl ZobristTable {
    const fn new() -> Self {
        let mut pieces = [[0; Square::COUNT]; Piece::COUNT];
        let mut ep_files = [0; File::COUNT];
        let mut castling = [0; CastlingRights::COUNT];
        let mut prng = XoShiRo::new();

        let mut piece = 0;
        while piece < Piece::COUNT {
            let mut square = 0;
            while square < Square::COUNT {
                let key;
                (key, prng) = prng.next_const();
                pieces[piece][square] = key;
                square += 1;
            }
            piece += 1;
        }

        let mut file = 0;
        while file < File::COUNT {
            let key;
            (key, prng) = prng.next_const();
            ep_files[file] = key;
            file += 1;
        }

        let mut bit = 0;
        while bit < 4 {
            let key;
            (key, prng) = prng.next_const();
            castling[1 << bit] = key;
            bit += 1;
        }

        let mut mask = 1;
        while mask < CastlingRights::COUNT {
            if mask & (mask - 1) != 0 {
                let mut bit = 0;
                while bit < 4 {
                    if mask & (1 << bit) != 0 {
                        castling[mask] ^= castling[1 << bit];
                    }
                    bit += 1;
                }
            }
            mask += 1;
        }

        let (side, _) = prng.next_const();

        Self {
            pieces,
            ep_files,
            castling,
            side,
        }
    }
}
