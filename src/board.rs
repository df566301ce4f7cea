/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Bitboard implementation; a set of squares packed into a `u64`.
mod bitboard;

/// Castling rights and castling geometry.
pub mod castling;

/// Reversible-move table for detecting upcoming repetitions.
mod cuckoo;

/// Attack tables and pseudo-legal move generation.
mod movegen;

/// Compact move representation.
mod moves;

/// Perft, for validating move generation.
mod perft;

/// Colors, piece kinds, and pieces.
mod piece;

/// The board state and everything needed to make and unmake moves on it.
mod position;

/// Compile-time pseudo-random number generation.
mod prng;

/// Squares, files, and ranks.
mod square;

/// Zobrist hashing keys.
mod zobrist;

pub use bitboard::*;
pub use castling::CastlingRights;
pub use cuckoo::*;
pub use movegen::*;
pub use moves::*;
pub use perft::*;
pub use piece::*;
pub use position::*;
pub use prng::*;
pub use square::*;
pub use zobrist::*;
