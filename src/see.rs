/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    bishop_attacks, ray_between, rook_attacks, value_of, Color, Move, MoveKind, PieceKind, Position,
};

/// [Static Exchange Evaluation](https://www.chessprogramming.org/Static_Exchange_Evaluation).
///
/// Returns `true` if the exchange started by `mv` on its destination square wins at least
/// `threshold` material for the side to move, with both sides always recapturing with their
/// least valuable attacker. Pinned pieces may only recapture along their pin.
///
/// Castling and promotions are always accepted.
///
/// # Example
/// ```
/// # use newt::{see, Move, MoveKind, Position, Square};
/// // Bxb2 wins a pawn that only a pawn defends
/// let pos: Position = "k7/8/8/8/8/2p5/1p6/BK6 w - - 0 1".parse().unwrap();
/// let mv = Move::new(Square::A1, Square::B2, MoveKind::Normal);
/// assert!(see(&pos, mv, 0));
/// assert!(!see(&pos, mv, 100));
/// ```
pub fn see(position: &Position, mv: Move, threshold: i32) -> bool {
    let (from, to) = (mv.from(), mv.to());

    let victim = match mv.kind() {
        MoveKind::Normal => position.piece_at(to).map(|piece| piece.kind()),
        MoveKind::EnPassant => Some(PieceKind::Pawn),
        MoveKind::Promotion | MoveKind::Castling => return true,
    };

    let Some(attacker) = position.piece_at(from) else {
        return false;
    };

    // If we still lose after making the move, then stop
    let mut balance = victim.map(value_of).unwrap_or(0) - threshold;
    if balance < 0 {
        return false;
    }

    // If we still win after losing the piece, then stop
    balance -= value_of(attacker.kind());
    if balance >= 0 {
        return true;
    }

    let mut occupied = position.occupied() ^ from.bitboard();
    if mv.kind() == MoveKind::EnPassant {
        occupied ^= to.behind(attacker.color()).bitboard();
    }

    let diagonals = position.kind(PieceKind::Bishop) | position.kind(PieceKind::Queen);
    let orthogonals = position.kind(PieceKind::Rook) | position.kind(PieceKind::Queen);

    // Pinned pieces may only take part when the target lies on their pin ray
    let mut attackers = position.attackers(to, occupied);
    for color in Color::all() {
        let pinned = position.blockers(color) & position.color(color);
        let ray = ray_between(position.king_square(color), to) | to.bitboard();
        attackers &= !(pinned & !ray);
    }

    let mut color = !position.side_to_move();

    loop {
        attackers &= occupied;

        let ours = attackers & position.color(color);
        if ours.is_empty() {
            break;
        }

        // Next least valuable attacker
        let Some(kind) = PieceKind::all()
            .into_iter()
            .find(|kind| ours.intersects(position.kind(*kind)))
        else {
            break;
        };

        color = !color;

        // Negamax the balance, adding a margin so that equal trades favor the side that just captured
        balance = -balance - 1 - value_of(kind);

        if balance >= 0 {
            // A king may not recapture into a defended square
            if kind == PieceKind::King && (attackers & position.color(color)).is_nonempty() {
                color = !color;
            }
            break;
        }

        occupied ^= (ours & position.kind(kind)).lsb_unchecked().bitboard();

        // Sliders behind the capturing piece are now revealed
        if matches!(kind, PieceKind::Pawn | PieceKind::Bishop | PieceKind::Queen) {
            attackers |= bishop_attacks(to, occupied) & diagonals;
        }
        if matches!(kind, PieceKind::Rook | PieceKind::Queen) {
            attackers |= rook_attacks(to, occupied) & orthogonals;
        }
    }

    color != position.side_to_move()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Square, FEN_KIWIPETE};

    const PAWN: i32 = value_of(PieceKind::Pawn);

    fn check(fen: &str, mv: Move, threshold: i32, expected: bool) {
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(
            see(&pos, mv, threshold),
            expected,
            "SEE({mv:?} >= {threshold}) on {fen} should be {expected}"
        );
    }

    fn normal(from: Square, to: Square) -> Move {
        Move::new(from, to, MoveKind::Normal)
    }

    fn en_passant(from: Square, to: Square) -> Move {
        Move::new(from, to, MoveKind::EnPassant)
    }

    #[test]
    fn test_quiet_moves() {
        check(FEN_KIWIPETE, normal(Square::A1, Square::B1), 0, true);
        check(FEN_KIWIPETE, normal(Square::A1, Square::B1), PAWN, false);
    }

    #[test]
    fn test_simple_exchanges() {
        let bxb2 = normal(Square::A1, Square::B2);
        check("k6b/8/8/8/8/2p5/1p6/BK6 w - - 0 1", bxb2, PAWN, false);
        check("k7/8/8/8/8/2p5/1p6/BK6 w - - 0 1", bxb2, PAWN, false);
        check("k7/8/8/8/8/2q5/1p6/BK6 w - - 0 1", bxb2, PAWN, true);
        check("k6b/8/8/8/8/2q5/1p6/BK6 w - - 0 1", bxb2, PAWN, false);
    }

    #[test]
    fn test_exchanges_in_play() {
        check(
            "rn2k2r/p3bpp1/2p4p/8/2P3Q1/1P1q4/P4P1P/RNB1K2R w KQkq - 0 8",
            normal(Square::G4, Square::G7),
            0,
            true,
        );
        check(
            "r1bq1rk1/pppp1Npp/2nb1n2/4p3/2B1P3/2P5/PP1P1PPP/RNBQK2R b KQ - 0 6",
            normal(Square::F8, Square::F7),
            0,
            true,
        );
        check(
            "r1bqkb1r/ppp1pppp/2n2n2/8/2BPP3/5P2/PP4PP/RNBQK1NR b KQkq - 0 5",
            normal(Square::C6, Square::D4),
            0,
            true,
        );
    }

    #[test]
    fn test_pinned_defenders() {
        // The knight is pinned to its king by the rook and cannot take on g5
        check("3b2k1/1b6/8/3R2p1/4K3/5N2/8/8 w - - 0 1", normal(Square::F3, Square::G5), 0, false);
        check("5k2/1b6/8/3B4/4K3/8/8/8 w - - 0 1", normal(Square::D5, Square::B7), 0, true);
    }

    #[test]
    fn test_en_passant() {
        let dxe6 = en_passant(Square::D5, Square::E6);
        check("6b1/k7/8/3Pp3/2K2N1r/8/8/8 w - e6 0 1", dxe6, 0, true);
        check("6b1/k7/8/3Pp3/2K2N1r/8/8/8 w - e6 0 1", dxe6, 1, false);
        check("6b1/k7/8/3Pp3/2K2N2/8/8/8 w - e6 0 1", dxe6, PAWN, true);

        // Removing the captured pawn opens the file for the rook
        check("k7/8/8/2KPp3/8/8/8/4r3 w - e6 0 1", dxe6, PAWN, false);
        check("k7/8/7R/2KPp3/8/8/8/4r3 w - e6 0 1", dxe6, PAWN, true);
    }

    #[test]
    fn test_special_moves_pass() {
        let promotion = Move::new_promotion(Square::D7, Square::E8, PieceKind::Queen);
        check("k3n2r/3P4/8/8/8/8/8/1K6 w - - 0 1", promotion, value_of(PieceKind::Rook), true);
        let castle = Move::new(Square::E1, Square::H1, MoveKind::Castling);
        check(FEN_KIWIPETE, castle, PAWN, true);
    }
}
