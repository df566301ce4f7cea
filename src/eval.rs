/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use crate::{
    castling, psqt, Color, File, Move, MoveKind, Piece, PieceKind, Position, Rank, Score, Square,
    Tapered, MAX_PHASE, PHASE_WEIGHTS,
};

/// Material value of each [`PieceKind`], used by move ordering and static exchange evaluation.
///
/// The king is given an enormous value so that trading it is never considered acceptable.
pub const PIECE_VALUE: [i32; PieceKind::COUNT] = [100, 320, 330, 500, 900, 100_000];

/// Returns a value of the provided `PieceKind`.
#[inline(always)]
pub const fn value_of(kind: PieceKind) -> i32 {
    PIECE_VALUE[kind.index()]
}

/// Running sums of the piece-square evaluation of a position.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
struct Accumulator {
    /// Material and placement of each side, from that side's perspective.
    sides: [Tapered; Color::COUNT],

    /// Sum of [`PHASE_WEIGHTS`] over every piece on the board.
    phase: i32,
}

impl Accumulator {
    fn new(position: &Position) -> Self {
        let mut acc = Self::default();
        for square in position.occupied() {
            if let Some(piece) = position.piece_at(square) {
                acc.add(piece, square);
            }
        }
        acc
    }

    #[inline(always)]
    fn add(&mut self, piece: Piece, square: Square) {
        self.sides[piece.color().index()] += psqt(piece, square);
        self.phase += PHASE_WEIGHTS[piece.kind().index()];
    }

    #[inline(always)]
    fn remove(&mut self, piece: Piece, square: Square) {
        self.sides[piece.color().index()] -= psqt(piece, square);
        self.phase -= PHASE_WEIGHTS[piece.kind().index()];
    }

    #[inline(always)]
    fn shift(&mut self, piece: Piece, from: Square, to: Square) {
        let side = &mut self.sides[piece.color().index()];
        *side -= psqt(piece, from);
        *side += psqt(piece, to);
    }

    /// Tapered score from `color`'s perspective.
    #[inline(always)]
    fn score_for(&self, color: Color) -> Score {
        let us = self.sides[color.index()];
        let them = self.sides[(!color).index()];
        let mg = Score(us.mg - them.mg);
        let eg = Score(us.eg - them.eg);

        // Promotions can push the phase past a full board
        let endgame = MAX_PHASE - self.phase.min(MAX_PHASE);
        mg.lerp(eg, endgame)
    }
}

/// Encapsulates the logic of scoring a chess position.
///
/// The evaluation is a tapered piece-square evaluation, maintained incrementally:
/// [`Evaluator::on_make`] must be called before every [`Position::make`] and
/// [`Evaluator::on_unmake`] after every [`Position::unmake`].
#[derive(Debug, Clone)]
pub struct Evaluator {
    stack: Vec<Accumulator>,
}

impl Evaluator {
    /// Construct a new [`Evaluator`] for `position`.
    pub fn new(position: &Position) -> Self {
        let mut stack = Vec::with_capacity(512);
        stack.push(Accumulator::new(position));
        Self { stack }
    }

    /// Discards all history and recomputes the accumulator from scratch.
    pub fn reset(&mut self, position: &Position) {
        self.stack.clear();
        self.stack.push(Accumulator::new(position));
    }

    #[inline(always)]
    fn current(&self) -> Accumulator {
        self.stack.last().copied().unwrap_or_default()
    }

    /// Evaluate the current position from the side-to-move's perspective.
    ///
    /// A positive/high number is good for the side-to-move, while a negative number is better for the opponent.
    /// A score of 0 is considered equal.
    #[inline(always)]
    pub fn evaluate(&self, position: &Position) -> Score {
        debug_assert_eq!(
            self.current(),
            Accumulator::new(position),
            "evaluator out of sync with {}",
            position.to_fen()
        );
        self.current().score_for(position.side_to_move())
    }

    /// Records the effect of `mv`, which is about to be made on `position`.
    pub fn on_make(&mut self, position: &Position, mv: Move) {
        let mut acc = self.current();
        let color = position.side_to_move();
        let (from, to) = (mv.from(), mv.to());

        let Some(piece) = position.piece_at(from) else {
            self.stack.push(acc);
            return;
        };

        match mv.kind() {
            MoveKind::Normal => {
                if let Some(victim) = position.piece_at(to) {
                    acc.remove(victim, to);
                }
                acc.shift(piece, from, to);
            }

            MoveKind::Promotion => {
                if let Some(victim) = position.piece_at(to) {
                    acc.remove(victim, to);
                }
                acc.remove(piece, from);
                acc.add(Piece::new(color, mv.promotion()), to);
            }

            MoveKind::EnPassant => {
                let victim = to.behind(color);
                acc.remove(Piece::new(!color, PieceKind::Pawn), victim);
                acc.shift(piece, from, to);
            }

            MoveKind::Castling => {
                let short = to.file() > from.file();
                let rook = Piece::new(color, PieceKind::Rook);
                acc.shift(piece, from, mv.king_to());
                acc.shift(rook, to, castling::rook_to(color, short));
            }
        }

        self.stack.push(acc);
    }

    /// Records that a null move is about to be made.
    #[inline(always)]
    pub fn on_make_null(&mut self) {
        self.stack.push(self.current());
    }

    /// Reverts the most recent [`Evaluator::on_make`] or [`Evaluator::on_make_null`].
    #[inline(always)]
    pub fn on_unmake(&mut self) {
        debug_assert!(self.stack.len() > 1, "unbalanced evaluator unmake");
        self.stack.pop();
    }
}

/// Evaluates `position` from scratch, from the side-to-move's perspective.
///
/// # Example
/// ```
/// # use newt::{evaluate, Position, Score};
/// assert_eq!(evaluate(&Position::default()), Score::DRAW);
/// ```
pub fn evaluate(position: &Position) -> Score {
    Accumulator::new(position).score_for(position.side_to_move())
}

/// A printable breakdown of a position's evaluation, used by the `eval` command.
pub struct EvalTrace<'a> {
    position: &'a Position,
}

impl<'a> EvalTrace<'a> {
    pub fn new(position: &'a Position) -> Self {
        Self { position }
    }
}

impl fmt::Display for EvalTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let acc = Accumulator::new(self.position);

        write!(f, "  +")?;
        for _ in File::iter() {
            write!(f, "-------+")?;
        }
        writeln!(f)?;

        for rank in Rank::iter().rev() {
            write!(f, "{rank} |")?;
            for file in File::iter() {
                let square = Square::new(file, rank);
                let cell = match self.position.piece_at(square) {
                    Some(piece) => {
                        let value = psqt(piece, square);
                        let signed = if piece.color().is_white() { 1 } else { -1 };
                        let score = Score(value.mg).lerp(Score(value.eg), MAX_PHASE - acc.phase.min(MAX_PHASE));
                        format!("{}{:+}", piece, score.0 * signed)
                    }
                    None => String::new(),
                };
                write!(f, "{cell:^7}|")?;
            }
            writeln!(f)?;
        }

        write!(f, "  +")?;
        for _ in File::iter() {
            write!(f, "-------+")?;
        }
        writeln!(f)?;
        write!(f, "  ")?;
        for file in File::iter() {
            write!(f, "    {file}   ")?;
        }
        writeln!(f)?;
        writeln!(f)?;

        let white = acc.score_for(Color::White);
        writeln!(f, "Phase: {}/{MAX_PHASE}", acc.phase.min(MAX_PHASE))?;
        writeln!(
            f,
            "Middle-game: {:+}  End-game: {:+}",
            acc.sides[0].mg - acc.sides[1].mg,
            acc.sides[0].eg - acc.sides[1].eg
        )?;
        write!(f, "Score (White): {white}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FEN_KIWIPETE;

    #[test]
    fn test_startpos_is_balanced() {
        let pos = Position::default();
        assert_eq!(evaluate(&pos), Score::DRAW);
        assert_eq!(Accumulator::new(&pos).phase, MAX_PHASE);
    }

    #[test]
    fn test_eval_is_symmetric() {
        // The same position with colors swapped and the board mirrored
        let white = Position::from_fen("4k3/8/8/8/8/8/4P3/R3K3 w - - 0 1").unwrap();
        let black = Position::from_fen("r3k3/4p3/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        assert_eq!(evaluate(&white), evaluate(&black));
        assert!(evaluate(&white) > Score::DRAW, "An extra rook should be winning");
    }

    #[test]
    fn test_incremental_matches_scratch() {
        let mut pos = Position::from_fen(FEN_KIWIPETE).unwrap();
        let mut eval = Evaluator::new(&pos);

        // Every move kind appears among kiwipete's moves and replies
        for mv in pos.legal_moves() {
            eval.on_make(&pos, mv);
            pos.make(mv);
            assert_eq!(eval.evaluate(&pos), evaluate(&pos), "after {mv:?}");

            for reply in pos.legal_moves() {
                eval.on_make(&pos, reply);
                pos.make(reply);
                assert_eq!(eval.evaluate(&pos), evaluate(&pos), "after {mv:?} {reply:?}");
                pos.unmake(reply);
                eval.on_unmake();
            }

            pos.unmake(mv);
            eval.on_unmake();
        }

        assert_eq!(eval.evaluate(&pos), evaluate(&pos));
    }

    #[test]
    fn test_promotions_and_castling() {
        let mut pos = Position::from_fen("r3k2r/1P6/8/8/8/8/6p1/R3K2R w KQkq - 0 1").unwrap();
        let mut eval = Evaluator::new(&pos);

        for text in ["b7a8n", "g2h1n", "e1c1", "e8g8"] {
            let mv = Move::from_uci(&pos, text).unwrap();
            eval.on_make(&pos, mv);
            pos.make(mv);
            assert_eq!(eval.evaluate(&pos), evaluate(&pos), "after {text}");
        }
    }
}
