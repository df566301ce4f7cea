/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use arrayvec::ArrayVec;

use crate::{see, value_of, ContKey, GenType, History, Move, MoveList, Position, MAX_NUM_MOVES};

/// The phases a [`MovePicker`] walks through, in order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Stage {
    /// The move stored in the transposition table.
    Hasher,
    NoisyGen,
    /// Captures and promotions that do not lose material.
    NoisyGood,
    Killer,
    QuietGen,
    Quiet,
    /// Captures that failed their exchange threshold.
    NoisyBad,
    Done,
}

/// Lazily generates and orders moves, so that a cutoff on an early move saves the work of generating the rest.
///
/// Every move produced is pseudo-legal but not necessarily legal. No move is produced twice.
pub struct MovePicker {
    moves: MoveList,
    scores: ArrayVec<i32, MAX_NUM_MOVES>,
    current: usize,

    bad_noisy: MoveList,
    current_bad: usize,

    hash_move: Move,
    killer: Move,
    stage: Stage,
    skip_quiets: bool,
}

impl MovePicker {
    /// A picker for the main search, trying `hash_move` first and `killer` after the good captures.
    pub fn new(hash_move: Move, killer: Move) -> Self {
        Self {
            moves: MoveList::new(),
            scores: ArrayVec::new(),
            current: 0,
            bad_noisy: MoveList::new(),
            current_bad: 0,
            hash_move,
            killer,
            stage: if hash_move.is_some() {
                Stage::Hasher
            } else {
                Stage::NoisyGen
            },
            skip_quiets: false,
        }
    }

    /// A picker for quiescence search, which only produces quiet moves when escaping check.
    pub fn new_qsearch(hash_move: Move, in_check: bool) -> Self {
        let mut picker = Self::new(hash_move, Move::NULL);
        picker.skip_quiets = !in_check;
        picker
    }

    /// The stage of the most recently produced move.
    #[inline(always)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stops producing quiet moves. Bad captures are still produced afterwards.
    #[inline(always)]
    pub fn skip_quiets(&mut self) {
        self.skip_quiets = true;
    }

    /// Produces the next move to search, or `None` once every move has been produced.
    ///
    /// `conts` holds the continuation history keys of the moves 1, 2, and 4 plies ago.
    pub fn next(&mut self, position: &Position, history: &History, conts: &[Option<ContKey>]) -> Option<Move> {
        if self.stage == Stage::Hasher {
            self.stage = Stage::NoisyGen;

            let skipped = self.skip_quiets && position.is_quiet(self.hash_move);
            if !skipped && position.is_pseudo_legal(self.hash_move) {
                return Some(self.hash_move);
            }
        }

        if self.stage == Stage::NoisyGen {
            self.stage = Stage::NoisyGood;
            self.moves = position.generate(GenType::Noisy);
            self.current = 0;
            self.score_noisy(position, history);
        }

        if self.stage == Stage::NoisyGood {
            while let Some((mv, score)) = self.select() {
                if mv == self.hash_move {
                    continue;
                }

                // Captures that lose material wait until every quiet move has been tried
                if !see(position, mv, -score / 32) {
                    self.bad_noisy.push(mv);
                    continue;
                }

                return Some(mv);
            }

            self.stage = Stage::Killer;
        }

        if self.skip_quiets && self.stage < Stage::NoisyBad {
            self.stage = Stage::NoisyBad;
        }

        if self.stage == Stage::Killer {
            self.stage = Stage::QuietGen;

            if self.killer != self.hash_move
                && position.is_pseudo_legal(self.killer)
                && position.is_quiet(self.killer)
            {
                return Some(self.killer);
            }
        }

        if self.stage == Stage::QuietGen {
            self.stage = Stage::Quiet;
            self.moves = position.generate(GenType::Quiet);
            self.current = 0;
            self.score_quiet(position, history, conts);
        }

        if self.stage == Stage::Quiet {
            while let Some((mv, _)) = self.select() {
                if mv == self.hash_move || mv == self.killer {
                    continue;
                }
                return Some(mv);
            }

            self.stage = Stage::NoisyBad;
        }

        if self.stage == Stage::NoisyBad {
            if let Some(&mv) = self.bad_noisy.get(self.current_bad) {
                self.current_bad += 1;
                return Some(mv);
            }

            self.stage = Stage::Done;
        }

        None
    }

    /// Selection sort: swaps the best remaining move into place and returns it.
    fn select(&mut self) -> Option<(Move, i32)> {
        // No more moves left
        if self.current >= self.moves.len() {
            return None;
        }

        // Find the index of the next highest score
        let mut best_index = self.current;
        for i in (self.current + 1)..self.moves.len() {
            if self.scores[i] > self.scores[best_index] {
                best_index = i;
            }
        }

        self.moves.swap(self.current, best_index);
        self.scores.swap(self.current, best_index);

        let picked = (self.moves[self.current], self.scores[self.current]);
        self.current += 1;
        Some(picked)
    }

    fn score_noisy(&mut self, position: &Position, history: &History) {
        self.scores.clear();
        for &mv in self.moves.iter() {
            let victim = value_of(position.captured_kind(mv));
            self.scores.push(victim * 16 + history.noisy_score(position, mv));
        }
    }

    fn score_quiet(&mut self, position: &Position, history: &History, conts: &[Option<ContKey>]) {
        self.scores.clear();
        for &mv in self.moves.iter() {
            self.scores.push(history.quiet_score(position, conts, mv));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MoveKind, Square, FEN_KIWIPETE, FEN_STARTPOS};

    const NO_CONTS: [Option<ContKey>; 3] = [None; 3];

    fn drain(picker: &mut MovePicker, position: &Position, history: &History) -> Vec<(Move, Stage)> {
        let mut moves = Vec::new();
        while let Some(mv) = picker.next(position, history, &NO_CONTS) {
            moves.push((mv, picker.stage()));
        }
        moves
    }

    /// Every node of the tree must produce exactly the moves of full generation.
    fn check_complete(position: &mut Position, history: &History, depth: usize) {
        let all = position.generate(GenType::All);
        let killer = all
            .iter()
            .copied()
            .find(|mv| position.is_quiet(*mv))
            .unwrap_or(Move::NULL);
        let hash_move = all.last().copied().unwrap_or(Move::NULL);

        let mut picker = MovePicker::new(hash_move, killer);
        let mut produced = Vec::new();
        while let Some(mv) = picker.next(position, history, &NO_CONTS) {
            produced.push(mv);
        }

        let mut expected = all.to_vec();
        let mut sorted = produced.clone();
        expected.sort_by_key(|mv| mv.bits());
        sorted.sort_by_key(|mv| mv.bits());
        assert_eq!(sorted, expected, "picker disagrees with generation on {}", position.to_fen());

        if depth <= 1 {
            return;
        }

        for mv in produced {
            if !position.is_legal(mv) {
                continue;
            }
            position.make(mv);
            check_complete(position, history, depth - 1);
            position.unmake(mv);
        }
    }

    #[test]
    fn test_picker_completeness() {
        let history = History::new();
        for (fen, depth) in [
            (FEN_STARTPOS, 3),
            (FEN_KIWIPETE, 3),
            ("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1", 3),
            ("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", 4),
            ("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8", 3),
        ] {
            let mut pos = Position::from_fen(fen).unwrap();
            check_complete(&mut pos, &history, depth);
        }
    }

    #[test]
    fn test_stage_order() {
        let pos = Position::from_fen(FEN_KIWIPETE).unwrap();
        let history = History::new();
        let hash_move = Move::new(Square::A2, Square::A3, MoveKind::Normal);
        let killer = Move::new(Square::G2, Square::G3, MoveKind::Normal);

        let mut picker = MovePicker::new(hash_move, killer);
        let moves = drain(&mut picker, &pos, &history);

        assert_eq!(moves[0].0, hash_move, "hash move must come first");
        let killer_at = moves.iter().position(|(mv, _)| *mv == killer).unwrap();
        assert_eq!(moves[killer_at].1, Stage::QuietGen, "killer is produced by its own stage");

        // Stages never go backwards
        assert!(moves.windows(2).all(|pair| pair[0].1 <= pair[1].1));

        // Every good capture precedes the killer
        for (mv, stage) in &moves[1..killer_at] {
            assert!(pos.is_noisy(*mv), "{mv:?} in {stage:?} should be noisy");
        }

        // Qxf6 wins a knight, so it is among the first captures
        let qxf6 = Move::new(Square::F3, Square::F6, MoveKind::Normal);
        assert!(moves[1..4].iter().any(|(mv, _)| *mv == qxf6));
    }

    #[test]
    fn test_skip_quiets_keeps_bad_captures() {
        // Qxd5 is defended by the pawn on e6, so it is a bad capture
        let pos = Position::from_fen("4k3/8/4p3/3p4/8/8/8/3QK3 w - - 0 1").unwrap();
        let history = History::new();
        let qxd5 = Move::new(Square::D1, Square::D5, MoveKind::Normal);

        let mut picker = MovePicker::new(Move::NULL, Move::NULL);
        picker.skip_quiets();
        let moves = drain(&mut picker, &pos, &history);

        assert_eq!(moves, vec![(qxd5, Stage::NoisyBad)]);
    }

    #[test]
    fn test_qsearch_picker() {
        let pos = Position::from_fen(FEN_KIWIPETE).unwrap();
        let history = History::new();

        let mut picker = MovePicker::new_qsearch(Move::NULL, pos.in_check());
        let moves = drain(&mut picker, &pos, &history);
        assert_eq!(moves.len(), pos.generate(GenType::Noisy).len());
        assert!(moves.iter().all(|(mv, _)| pos.is_noisy(*mv)));

        // Escaping check needs quiet moves
        let checked = Position::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
        let mut picker = MovePicker::new_qsearch(Move::NULL, checked.in_check());
        let moves = drain(&mut picker, &checked, &history);
        assert_eq!(moves.len(), checked.generate(GenType::All).len());
    }
}
