/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{tune, Bitboard, Color, Move, Piece, PieceKind, Position, Score, Square};

/// Number of entries per color in each correction history table.
pub const CORRECTION_SIZE: usize = 16_384;

/// Look-back distances, in plies, of the continuation histories consulted for a move.
pub const CONT_OFFSETS: [usize; 3] = [1, 2, 4];

/// The piece and destination of a move already played, keying a continuation history table.
pub type ContKey = (Piece, Square);

/// Bonus awarded to a move that caused a beta cutoff at `depth`.
#[inline(always)]
pub fn bonus(depth: i32) -> i32 {
    (tune::history_bonus_coef!() * depth + tune::history_bonus_bias!()).min(tune::history_bonus_max!())
}

/// Penalty applied to moves that were searched before the cutoff move at `depth`.
#[inline(always)]
pub fn malus(depth: i32) -> i32 {
    (tune::history_malus_coef!() * depth + tune::history_malus_bias!()).min(tune::history_malus_max!())
}

/// Applies `bonus` to `entry` with the "history gravity" formula, keeping it within `[-MAX, MAX]`.
///
/// See <https://www.chessprogramming.org/History_Heuristic#History_Bonuses>
#[inline(always)]
fn gravity<const MAX: i32>(entry: &mut i16, bonus: i32) {
    let clamped = bonus.clamp(-MAX, MAX);
    let current = *entry as i32;
    *entry = (current + clamped - current * clamped.abs() / MAX) as i16;
}

/// Allocates a zeroed table directly on the heap.
#[inline(always)]
fn zeroed(len: usize) -> Box<[i16]> {
    vec![0; len].into_boxed_slice()
}

/// Stores bonuses and penalties learned during search, used to order moves and correct evaluations.
///
/// Every table is thread-local and persists between searches until [`History::clear`].
#[derive(Debug, Clone)]
pub struct History {
    /// `[color][from][to][from threatened][to threatened]`
    quiet: Box<[i16]>,

    /// `[piece][to][captured kind]`
    capture: Box<[i16]>,

    /// `[previous piece][previous to][piece][to]`
    continuation: Box<[i16]>,

    /// `[color][pawn key % N]`
    pawn_correction: Box<[i16]>,

    /// `[color][side][non-pawn key of side % N]`
    non_pawn_correction: Box<[i16]>,
}

impl History {
    pub fn new() -> Self {
        Self {
            quiet: zeroed(Color::COUNT * Square::COUNT * Square::COUNT * 4),
            capture: zeroed(Piece::COUNT * Square::COUNT * PieceKind::COUNT),
            continuation: zeroed(Piece::COUNT * Square::COUNT * Piece::COUNT * Square::COUNT),
            pawn_correction: zeroed(Color::COUNT * CORRECTION_SIZE),
            non_pawn_correction: zeroed(Color::COUNT * Color::COUNT * CORRECTION_SIZE),
        }
    }

    /// Clear the history tables, removing all scores.
    pub fn clear(&mut self) {
        for table in [
            &mut self.quiet,
            &mut self.capture,
            &mut self.continuation,
            &mut self.pawn_correction,
            &mut self.non_pawn_correction,
        ] {
            table.fill(0);
        }
    }

    #[inline(always)]
    fn quiet_index(color: Color, threats: Bitboard, mv: Move) -> usize {
        let (from, to) = (mv.from(), mv.to());
        let threatened = (threats.contains(from) as usize) << 1 | threats.contains(to) as usize;
        ((color.index() * Square::COUNT + from.index()) * Square::COUNT + to.index()) * 4 + threatened
    }

    #[inline(always)]
    fn capture_index(piece: Piece, to: Square, captured: PieceKind) -> usize {
        (piece.index() * Square::COUNT + to.index()) * PieceKind::COUNT + captured.index()
    }

    #[inline(always)]
    fn continuation_index(prev: ContKey, piece: Piece, to: Square) -> usize {
        let (prev_piece, prev_to) = prev;
        ((prev_piece.index() * Square::COUNT + prev_to.index()) * Piece::COUNT + piece.index()) * Square::COUNT
            + to.index()
    }

    /// History of a quiet move, aware of whether its origin and destination are attacked.
    #[inline(always)]
    pub fn quiet(&self, color: Color, threats: Bitboard, mv: Move) -> i32 {
        self.quiet[Self::quiet_index(color, threats, mv)] as i32
    }

    #[inline(always)]
    pub fn update_quiet(&mut self, color: Color, threats: Bitboard, mv: Move, bonus: i32) {
        gravity::<{ tune::max_history!() }>(&mut self.quiet[Self::quiet_index(color, threats, mv)], bonus);
    }

    /// History of `piece` capturing a piece of kind `captured` on `to`.
    #[inline(always)]
    pub fn capture(&self, piece: Piece, to: Square, captured: PieceKind) -> i32 {
        self.capture[Self::capture_index(piece, to, captured)] as i32
    }

    #[inline(always)]
    pub fn update_capture(&mut self, piece: Piece, to: Square, captured: PieceKind, bonus: i32) {
        gravity::<{ tune::max_history!() }>(&mut self.capture[Self::capture_index(piece, to, captured)], bonus);
    }

    /// History of `piece` moving to `to` in reply to the earlier move keyed by `prev`.
    #[inline(always)]
    pub fn continuation(&self, prev: ContKey, piece: Piece, to: Square) -> i32 {
        self.continuation[Self::continuation_index(prev, piece, to)] as i32
    }

    #[inline(always)]
    pub fn update_continuation(&mut self, prev: ContKey, piece: Piece, to: Square, bonus: i32) {
        gravity::<{ tune::max_history!() }>(
            &mut self.continuation[Self::continuation_index(prev, piece, to)],
            bonus,
        );
    }

    /// Sum of the quiet history and every available continuation history of a quiet move.
    pub fn quiet_score(&self, position: &Position, conts: &[Option<ContKey>], mv: Move) -> i32 {
        let Some(piece) = position.moved_piece(mv) else {
            return 0;
        };
        let to = mv.to();

        let cont: i32 = conts
            .iter()
            .flatten()
            .map(|prev| self.continuation(*prev, piece, to))
            .sum();

        self.quiet(position.side_to_move(), position.threats(), mv) + cont
    }

    /// Capture history of a noisy move.
    pub fn noisy_score(&self, position: &Position, mv: Move) -> i32 {
        match position.moved_piece(mv) {
            Some(piece) => self.capture(piece, mv.to(), position.captured_kind(mv)),
            None => 0,
        }
    }

    /// Rewards the quiet move `best` that caused a cutoff and punishes every quiet move tried before it.
    pub fn reward_quiet(
        &mut self,
        position: &Position,
        conts: &[Option<ContKey>],
        best: Move,
        tried: &[Move],
        depth: i32,
    ) {
        let (bonus, malus) = (bonus(depth), malus(depth));
        let color = position.side_to_move();
        let threats = position.threats();

        self.update_quiet(color, threats, best, bonus);
        self.update_continuations(position, conts, best, bonus);

        for &mv in tried {
            self.update_quiet(color, threats, mv, -malus);
            self.update_continuations(position, conts, mv, -malus);
        }
    }

    /// Rewards the capture `best` and punishes every capture tried before it.
    pub fn reward_noisy(&mut self, position: &Position, best: Option<Move>, tried: &[Move], depth: i32) {
        let (bonus, malus) = (bonus(depth), malus(depth));

        if let Some(best) = best {
            self.update_noisy(position, best, bonus);
        }

        for &mv in tried {
            self.update_noisy(position, mv, -malus);
        }
    }

    #[inline(always)]
    fn update_noisy(&mut self, position: &Position, mv: Move, bonus: i32) {
        if let Some(piece) = position.moved_piece(mv) {
            self.update_capture(piece, mv.to(), position.captured_kind(mv), bonus);
        }
    }

    #[inline(always)]
    fn update_continuations(&mut self, position: &Position, conts: &[Option<ContKey>], mv: Move, bonus: i32) {
        let Some(piece) = position.moved_piece(mv) else {
            return;
        };

        for prev in conts.iter().flatten() {
            self.update_continuation(*prev, piece, mv.to(), bonus);
        }
    }

    #[inline(always)]
    fn pawn_correction_index(position: &Position) -> usize {
        let key = position.pawn_key().inner() as usize % CORRECTION_SIZE;
        position.side_to_move().index() * CORRECTION_SIZE + key
    }

    #[inline(always)]
    fn non_pawn_correction_index(position: &Position, side: Color) -> usize {
        let key = position.non_pawn_key(side).inner() as usize % CORRECTION_SIZE;
        (position.side_to_move().index() * Color::COUNT + side.index()) * CORRECTION_SIZE + key
    }

    /// Learned bias to add to the raw static evaluation of `position`.
    pub fn correction(&self, position: &Position) -> i32 {
        let pawn = self.pawn_correction[Self::pawn_correction_index(position)] as i32;
        let non_pawn: i32 = Color::all()
            .into_iter()
            .map(|side| self.non_pawn_correction[Self::non_pawn_correction_index(position, side)] as i32)
            .sum();

        (pawn * tune::pawn_correction_weight!() + non_pawn * tune::non_pawn_correction_weight!()) / 512
    }

    /// Corrects the static evaluation of `position` with everything learned so far.
    #[inline(always)]
    pub fn corrected(&self, position: &Position, raw: Score) -> Score {
        (raw + self.correction(position)).clamp_eval()
    }

    /// Moves the correction of `position` towards the difference between a search result and its static eval.
    pub fn update_correction(&mut self, position: &Position, depth: i32, best: Score, static_eval: Score) {
        let limit = tune::max_correction!() / 4;
        let bonus = ((best - static_eval).0 * depth / 8).clamp(-limit, limit);

        let index = Self::pawn_correction_index(position);
        gravity::<{ tune::max_correction!() }>(&mut self.pawn_correction[index], bonus);

        for side in Color::all() {
            let index = Self::non_pawn_correction_index(position, side);
            gravity::<{ tune::max_correction!() }>(&mut self.non_pawn_correction[index], bonus);
        }
    }
}

impl Default for History {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}
