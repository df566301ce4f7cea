/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{attacks_for, Bitboard, Color, Piece, PieceKind, Square, ZobristKey};

/// Number of slots in the table. Must be a power of two that fits the 13-bit hash functions.
const SIZE: usize = 8192;

/// Key differences of every reversible (non-pawn) piece move, for detecting upcoming repetitions.
///
/// Each entry is the XOR of a piece's keys on two squares it can move between on an empty board,
/// plus the side key. Entries are placed by cuckoo hashing, so any key lives in one of exactly
/// two slots: [`Cuckoo::h1`] or [`Cuckoo::h2`].
///
/// See <http://web.archive.org/web/20201107002606/https://marcelk.net/2013-04-06/paper/upcoming-rep-v2.pdf>.
pub struct Cuckoo {
    keys: Box<[ZobristKey; SIZE]>,
    squares: Box<[(Square, Square); SIZE]>,
}

impl Cuckoo {
    /// Builds the table by inserting every reversible move, evicting occupants into their other slot.
    pub fn new() -> Self {
        let mut keys = Box::new([ZobristKey::default(); SIZE]);
        let mut squares = Box::new([(Square::A1, Square::A1); SIZE]);
        let mut count = 0;

        for piece in Piece::iter().filter(|p| p.kind() != PieceKind::Pawn) {
            for a in Square::iter() {
                let reachable = attacks_for(piece.kind(), a, Color::White, Bitboard::EMPTY_BOARD);

                for b in Square::iter().skip(a.index() + 1) {
                    if !reachable.contains(b) {
                        continue;
                    }

                    let mut key = ZobristKey::piece(piece, a) ^ ZobristKey::piece(piece, b) ^ ZobristKey::side();
                    let mut pair = (a, b);
                    let mut index = Self::h1(key);

                    loop {
                        std::mem::swap(&mut keys[index], &mut key);
                        std::mem::swap(&mut squares[index], &mut pair);

                        if key.inner() == 0 {
                            break;
                        }

                        index = if index == Self::h1(key) {
                            Self::h2(key)
                        } else {
                            Self::h1(key)
                        };
                    }

                    count += 1;
                }
            }
        }

        debug_assert_eq!(count, 3668, "unexpected number of reversible moves");

        Self { keys, squares }
    }

    /// First slot for `key`.
    #[inline(always)]
    pub const fn h1(key: ZobristKey) -> usize {
        (key.inner() & 0x1FFF) as usize
    }

    /// Second slot for `key`.
    #[inline(always)]
    pub const fn h2(key: ZobristKey) -> usize {
        ((key.inner() >> 16) & 0x1FFF) as usize
    }

    /// Returns the two squares of the reversible move whose key difference is `diff`, if any.
    #[inline(always)]
    pub fn probe(&self, diff: ZobristKey) -> Option<(Square, Square)> {
        let mut index = Self::h1(diff);
        if self.keys[index] != diff {
            index = Self::h2(diff);
        }

        (self.keys[index] == diff).then(|| self.squares[index])
    }
}

impl Default for Cuckoo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_reversible_move_is_found() {
        let cuckoo = Cuckoo::new();
        let knight = Piece::new(Color::Black, PieceKind::Knight);
        let diff = ZobristKey::piece(knight, Square::G8) ^ ZobristKey::piece(knight, Square::F6) ^ ZobristKey::side();
        assert_eq!(cuckoo.probe(diff), Some((Square::F6, Square::G8)));

        let rook = Piece::new(Color::White, PieceKind::Rook);
        let diff = ZobristKey::piece(rook, Square::A1) ^ ZobristKey::piece(rook, Square::A8) ^ ZobristKey::side();
        assert_eq!(cuckoo.probe(diff), Some((Square::A1, Square::A8)));
    }

    #[test]
    fn test_irreversible_moves_are_absent() {
        let cuckoo = Cuckoo::new();
        let knight = Piece::new(Color::White, PieceKind::Knight);
        let diff = ZobristKey::piece(knight, Square::A1) ^ ZobristKey::piece(knight, Square::H8) ^ ZobristKey::side();
        assert_eq!(cuckoo.probe(diff), None);
    }
}
