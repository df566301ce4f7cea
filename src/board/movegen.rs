/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{castling, Bitboard, CastlingRights, Color, Move, MoveKind, MoveList, PieceKind, Position, Square};

/// Which subset of pseudo-legal moves to generate.
///
/// `Quiet` and `Noisy` partition `All`: noisy moves are captures, en passant, and every promotion.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GenType {
    All,
    Quiet,
    Noisy,
}

/// Directions as `(file delta, rank delta)`.
///
/// The first four increase the square index, the last four decrease it.
const DIRECTIONS: [(i8, i8); 8] = [
    (0, 1),   // N
    (1, 1),   // NE
    (1, 0),   // E
    (-1, 1),  // NW
    (0, -1),  // S
    (-1, -1), // SW
    (-1, 0),  // W
    (1, -1),  // SE
];

const NORTH: usize = 0;
const NORTH_EAST: usize = 1;
const EAST: usize = 2;
const NORTH_WEST: usize = 3;
const SOUTH: usize = 4;
const SOUTH_WEST: usize = 5;
const WEST: usize = 6;
const SOUTH_EAST: usize = 7;

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (1, -2),
    (2, 1),
    (2, -1),
    (-1, 2),
    (-1, -2),
    (-2, 1),
    (-2, -1),
];

/// Unblocked rays from every square, per direction.
const RAYS: [[Bitboard; Square::COUNT]; 8] = {
    let mut rays = [[Bitboard::EMPTY_BOARD; Square::COUNT]; 8];
    let mut dir = 0;
    while dir < 8 {
        let (df, dr) = DIRECTIONS[dir];
        let mut i = 0;
        while i < Square::COUNT {
            let mut ray = Bitboard::EMPTY_BOARD;
            let mut sq = Square::from_index_unchecked(i);
            while let Some(next) = sq.offset(df, dr) {
                ray = ray.or(next.bitboard());
                sq = next;
            }
            rays[dir][i] = ray;
            i += 1;
        }
        dir += 1;
    }
    rays
};

/// Squares strictly between two aligned squares.
const BETWEEN: [[Bitboard; Square::COUNT]; Square::COUNT] = {
    let mut between = [[Bitboard::EMPTY_BOARD; Square::COUNT]; Square::COUNT];
    let mut i = 0;
    while i < Square::COUNT {
        let mut dir = 0;
        while dir < 8 {
            let (df, dr) = DIRECTIONS[dir];
            let mut ray = Bitboard::EMPTY_BOARD;
            let mut sq = Square::from_index_unchecked(i);
            while let Some(next) = sq.offset(df, dr) {
                between[i][next.index()] = ray;
                ray = ray.or(next.bitboard());
                sq = next;
            }
            dir += 1;
        }
        i += 1;
    }
    between
};

/// The full board-spanning line through two aligned squares, including both.
const LINE: [[Bitboard; Square::COUNT]; Square::COUNT] = {
    let mut line = [[Bitboard::EMPTY_BOARD; Square::COUNT]; Square::COUNT];
    let mut i = 0;
    while i < Square::COUNT {
        let mut dir = 0;
        while dir < 8 {
            let full = RAYS[dir][i]
                .or(RAYS[(dir + 4) % 8][i])
                .or(Bitboard::from_square(Square::from_index_unchecked(i)));
            let mut ray = RAYS[dir][i];
            while ray.is_nonempty() {
                let to = ray.lsb_unchecked();
                line[i][to.index()] = full;
                ray = ray.and(Bitboard::new(ray.inner() - 1));
            }
            dir += 1;
        }
        i += 1;
    }
    line
};

const KNIGHT_ATTACKS: [Bitboard; Square::COUNT] = leaper_attacks(&KNIGHT_DELTAS);
const KING_ATTACKS: [Bitboard; Square::COUNT] = leaper_attacks(&DIRECTIONS);
const PAWN_ATTACKS: [[Bitboard; Square::COUNT]; Color::COUNT] = {
    let mut attacks = [[Bitboard::EMPTY_BOARD; Square::COUNT]; Color::COUNT];
    let mut i = 0;
    while i < Square::COUNT {
        let bb = Bitboard::from_square(Square::from_index_unchecked(i));
        let white = bb.north();
        let black = bb.south();
        attacks[0][i] = white.east().or(white.west());
        attacks[1][i] = black.east().or(black.west());
        i += 1;
    }
    attacks
};

const fn leaper_attacks(deltas: &[(i8, i8)]) -> [Bitboard; Square::COUNT] {
    let mut attacks = [Bitboard::EMPTY_BOARD; Square::COUNT];
    let mut i = 0;
    while i < Square::COUNT {
        let square = Square::from_index_unchecked(i);
        let mut j = 0;
        while j < deltas.len() {
            let (df, dr) = deltas[j];
            if let Some(to) = square.offset(df, dr) {
                attacks[i] = attacks[i].or(to.bitboard());
            }
            j += 1;
        }
        i += 1;
    }
    attacks
}

/// Attacks along one ray, stopping at (and including) the first blocker.
#[inline(always)]
const fn ray_attacks(dir: usize, square: Square, blockers: Bitboard) -> Bitboard {
    let ray = RAYS[dir][square.index()];
    let hits = ray.and(blockers);
    if hits.is_empty() {
        return ray;
    }

    let first = if dir < 4 {
        hits.lsb_unchecked()
    } else {
        hits.msb_unchecked()
    };
    ray.xor(RAYS[dir][first.index()])
}

/// Squares strictly between `from` and `to`, or empty if they are not aligned.
///
/// # Example
/// ```
/// # use newt::{ray_between, Bitboard, Square};
/// assert_eq!(ray_between(Square::A1, Square::A4), Square::A2.bitboard() | Square::A3);
/// assert!(ray_between(Square::A1, Square::B3).is_empty());
/// ```
#[inline(always)]
pub const fn ray_between(from: Square, to: Square) -> Bitboard {
    BETWEEN[from.index()][to.index()]
}

/// The whole line through `from` and `to`, or empty if they are not aligned.
///
/// # Example
/// ```
/// # use newt::{ray_containing, Bitboard, Square};
/// assert_eq!(ray_containing(Square::A3, Square::A5), Bitboard::FILE_A);
/// ```
#[inline(always)]
pub const fn ray_containing(from: Square, to: Square) -> Bitboard {
    LINE[from.index()][to.index()]
}

#[inline(always)]
pub const fn knight_attacks(square: Square) -> Bitboard {
    KNIGHT_ATTACKS[square.index()]
}

#[inline(always)]
pub const fn king_attacks(square: Square) -> Bitboard {
    KING_ATTACKS[square.index()]
}

/// Squares a pawn of `color` on `square` attacks.
#[inline(always)]
pub const fn pawn_attacks(square: Square, color: Color) -> Bitboard {
    PAWN_ATTACKS[color.index()][square.index()]
}

/// Diagonal attacks from `square`, stopping at the first piece in `blockers` on each ray.
#[inline(always)]
pub const fn bishop_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    ray_attacks(NORTH_EAST, square, blockers)
        .or(ray_attacks(NORTH_WEST, square, blockers))
        .or(ray_attacks(SOUTH_EAST, square, blockers))
        .or(ray_attacks(SOUTH_WEST, square, blockers))
}

/// Orthogonal attacks from `square`, stopping at the first piece in `blockers` on each ray.
#[inline(always)]
pub const fn rook_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    ray_attacks(NORTH, square, blockers)
        .or(ray_attacks(EAST, square, blockers))
        .or(ray_attacks(SOUTH, square, blockers))
        .or(ray_attacks(WEST, square, blockers))
}

#[inline(always)]
pub const fn queen_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    bishop_attacks(square, blockers).or(rook_attacks(square, blockers))
}

/// Attacks of a piece of `kind` and `color` on `square`.
#[inline(always)]
pub const fn attacks_for(kind: PieceKind, square: Square, color: Color, blockers: Bitboard) -> Bitboard {
    match kind {
        PieceKind::Pawn => pawn_attacks(square, color),
        PieceKind::Knight => knight_attacks(square),
        PieceKind::Bishop => bishop_attacks(square, blockers),
        PieceKind::Rook => rook_attacks(square, blockers),
        PieceKind::Queen => queen_attacks(square, blockers),
        PieceKind::King => king_attacks(square),
    }
}

/// Generates pseudo-legal moves for the side to move.
///
/// Knights and sliders are already restricted by pins and single checks. King moves, castling,
/// pawn moves, and en passant still have to pass [`Position::is_legal`].
pub fn generate(position: &Position, gen: GenType) -> MoveList {
    let mut moves = MoveList::new();
    let color = position.side_to_move();
    let us = position.color(color);
    let them = position.color(!color);
    let occupied = us | them;
    let checkers = position.checkers();
    let pinned = position.blockers(color);
    let king = position.king_square(color);

    let mut movable = match gen {
        GenType::All => !us,
        GenType::Quiet => !occupied,
        GenType::Noisy => them,
    };

    add_normals(&mut moves, king, king_attacks(king) & movable);

    if checkers.is_many() {
        return moves;
    }

    let check_mask = if let Some(checker) = checkers.lsb() {
        checkers | ray_between(king, checker)
    } else {
        Bitboard::FULL_BOARD
    };
    movable &= check_mask;

    if gen != GenType::Noisy && checkers.is_empty() {
        add_castling(position, &mut moves, color, king, occupied);
    }

    add_pawns(position, &mut moves, gen, color, check_mask);

    for from in position.pieces_of(color, PieceKind::Knight) & !pinned {
        add_normals(&mut moves, from, knight_attacks(from) & movable);
    }

    let queens = position.pieces_of(color, PieceKind::Queen);
    for from in position.pieces_of(color, PieceKind::Bishop) | queens {
        let mut targets = bishop_attacks(from, occupied) & movable;
        if pinned.contains(from) {
            targets &= ray_containing(from, king);
        }
        add_normals(&mut moves, from, targets);
    }

    for from in position.pieces_of(color, PieceKind::Rook) | queens {
        let mut targets = rook_attacks(from, occupied) & movable;
        if pinned.contains(from) {
            targets &= ray_containing(from, king);
        }
        add_normals(&mut moves, from, targets);
    }

    moves
}

#[inline(always)]
fn add_normals(moves: &mut MoveList, from: Square, targets: Bitboard) {
    for to in targets {
        moves.push(Move::new(from, to, MoveKind::Normal));
    }
}

#[inline(always)]
fn add_promotions(moves: &mut MoveList, from: Square, to: Square) {
    for kind in [PieceKind::Knight, PieceKind::Bishop, PieceKind::Rook, PieceKind::Queen] {
        moves.push(Move::new_promotion(from, to, kind));
    }
}

fn add_castling(position: &Position, moves: &mut MoveList, color: Color, king: Square, occupied: Bitboard) {
    let rights = position.castling();
    for (right, short) in [
        (CastlingRights::short(color), true),
        (CastlingRights::long(color), false),
    ] {
        if !rights.intersects(right) {
            continue;
        }

        let rook = castling::rook_from(color, short);
        if ray_between(king, rook).intersects(occupied) {
            continue;
        }

        moves.push(Move::new(king, rook, MoveKind::Castling));
    }
}

fn add_pawns(position: &Position, moves: &mut MoveList, gen: GenType, color: Color, check_mask: Bitboard) {
    let empty = !position.occupied();
    let enemy = position.color(!color);
    let pawns = position.pieces_of(color, PieceKind::Pawn);

    let (third_rank, last_rank) = match color {
        Color::White => (Bitboard::RANK_3, Bitboard::RANK_8),
        Color::Black => (Bitboard::RANK_6, Bitboard::RANK_1),
    };

    let push_1 = pawns.forward(color) & empty;
    let push_2 = (push_1 & third_rank).forward(color) & empty & check_mask;
    let push_1 = push_1 & check_mask;

    let ahead = pawns.forward(color);
    let left = ahead.west() & enemy & check_mask;
    let right = ahead.east() & enemy & check_mask;

    if gen != GenType::Quiet {
        for to in push_1 & last_rank {
            add_promotions(moves, to.behind(color), to);
        }
        for to in left & last_rank {
            add_promotions(moves, from_diagonal(to, color, 1), to);
        }
        for to in right & last_rank {
            add_promotions(moves, from_diagonal(to, color, -1), to);
        }
    }

    if gen != GenType::Noisy {
        for to in push_1 & !last_rank {
            moves.push(Move::new(to.behind(color), to, MoveKind::Normal));
        }
        for to in push_2 {
            moves.push(Move::new(to.behind(color).behind(color), to, MoveKind::Normal));
        }
    }

    if gen == GenType::Quiet {
        return;
    }

    for to in left & !last_rank {
        moves.push(Move::new(from_diagonal(to, color, 1), to, MoveKind::Normal));
    }
    for to in right & !last_rank {
        moves.push(Move::new(from_diagonal(to, color, -1), to, MoveKind::Normal));
    }

    if let Some(ep) = position.ep_square() {
        for from in pawn_attacks(ep, !color) & pawns {
            moves.push(Move::new(from, ep, MoveKind::EnPassant));
        }
    }
}

/// The origin of a diagonal pawn step that landed on `to`, `file_delta` files away from it.
#[inline(always)]
const fn from_diagonal(to: Square, color: Color, file_delta: i8) -> Square {
    let behind = to.behind(color);
    Square::from_index_unchecked((behind.inner() as i8 + file_delta) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rook_blockers() {
        let blockers = Square::D2.bitboard() | Square::D6 | Square::B4 | Square::G4 | Square::H8;
        let expected: Bitboard = [
            Square::D2,
            Square::D3,
            Square::D5,
            Square::D6,
            Square::B4,
            Square::C4,
            Square::E4,
            Square::F4,
            Square::G4,
        ]
        .into_iter()
        .collect();
        assert_eq!(rook_attacks(Square::D4, blockers), expected);
    }

    #[test]
    fn test_bishop_blockers() {
        let blockers = Square::F6.bitboard() | Square::B2;
        let attacks = bishop_attacks(Square::D4, blockers);
        assert!(attacks.contains(Square::F6));
        assert!(!attacks.contains(Square::G7));
        assert!(attacks.contains(Square::B2));
        assert!(!attacks.contains(Square::A1));
        assert!(attacks.contains(Square::A7));
        assert!(attacks.contains(Square::G1));
    }

    #[test]
    fn test_leapers() {
        assert_eq!(knight_attacks(Square::A1), Square::B3.bitboard() | Square::C2);
        assert_eq!(king_attacks(Square::H8).population(), 3);
        assert_eq!(pawn_attacks(Square::E4, Color::White), Square::D5.bitboard() | Square::F5);
        assert_eq!(pawn_attacks(Square::A7, Color::Black), Square::B6.bitboard());
    }

    #[test]
    fn test_lines() {
        assert_eq!(ray_containing(Square::B2, Square::G7).population(), 8);
        assert!(ray_containing(Square::B1, Square::C3).is_empty());
        assert_eq!(ray_between(Square::E1, Square::H1), Square::F1.bitboard() | Square::G1);
    }

    #[test]
    fn test_startpos_partition() {
        let pos = Position::default();
        let all = generate(&pos, GenType::All).len();
        let quiet = generate(&pos, GenType::Quiet).len();
        let noisy = generate(&pos, GenType::Noisy).len();
        assert_eq!(all, 20);
        assert_eq!(noisy, 0);
        assert_eq!(all, quiet + noisy);
    }
}
