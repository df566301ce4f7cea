/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use thiserror::Error;

use super::{
    attacks_for, bishop_attacks, castling, generate, king_attacks, knight_attacks, pawn_attacks,
    ray_between, ray_containing, rook_attacks, Bitboard, CastlingRights, Color, Cuckoo, File,
    GenType, Move, MoveKind, MoveList, Piece, PieceKind, PieceParseError, Rank, Square,
    SquareParseError, ZobristKey,
};

/// FEN string for the starting position of chess.
pub const FEN_STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A popular FEN string for debugging move generation.
pub const FEN_KIWIPETE: &str =
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

/// Errors produced when parsing a FEN string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("FEN string is empty")]
    Empty,

    #[error("FEN must have piece placements for all 8 ranks, found {0}")]
    RankCount(usize),

    #[error("rank {rank} of the piece placements spans {files} files")]
    RankWidth { rank: Rank, files: usize },

    #[error(transparent)]
    Piece(#[from] PieceParseError),

    #[error(transparent)]
    Square(#[from] SquareParseError),

    #[error("invalid castling character {0:?}")]
    Castling(char),

    #[error("invalid {field} counter {value:?}")]
    Counter { field: &'static str, value: String },

    #[error("{0} must have exactly one king")]
    KingCount(Color),

    #[error("the side not to move is in check")]
    OpponentInCheck,
}

/// Everything [`Position::unmake`] needs that cannot be recovered from the move itself.
#[derive(Clone, Copy, Debug)]
struct Undo {
    key: ZobristKey,
    pawn_key: ZobristKey,
    non_pawn_keys: [ZobristKey; Color::COUNT],
    castling: CastlingRights,
    ep_square: Option<Square>,
    halfmove: u16,
    captured: Option<PieceKind>,
    checkers: Bitboard,
    blockers: [Bitboard; Color::COUNT],
    threats: Bitboard,
}

/// A chess position that can make and unmake moves in place.
///
/// Pieces are stored both as [`Bitboard`]s and as a mailbox; the two always agree.
/// Every [`Position::make`] pushes one entry onto an internal history that the matching
/// [`Position::unmake`] pops, so calls must be strictly nested.
#[derive(Clone)]
pub struct Position {
    pieces: [Bitboard; PieceKind::COUNT],
    colors: [Bitboard; Color::COUNT],
    mailbox: [Option<Piece>; Square::COUNT],

    side_to_move: Color,
    castling: CastlingRights,
    ep_square: Option<Square>,

    /// Plies since the last capture or pawn move.
    halfmove: u16,
    fullmove: u16,

    key: ZobristKey,
    pawn_key: ZobristKey,
    non_pawn_keys: [ZobristKey; Color::COUNT],

    /// Enemy pieces giving check to the side to move.
    checkers: Bitboard,
    /// Pieces of either color that are the only thing between a king and an enemy slider.
    blockers: [Bitboard; Color::COUNT],
    /// Squares attacked by the side not to move.
    threats: Bitboard,

    history: Vec<Undo>,
}

impl Position {
    /// Creates a new [`Position`] from the provided FEN string.
    ///
    /// Only the piece placements are required; the remaining fields default to `w - - 0 1`.
    ///
    /// # Example
    /// ```
    /// # use newt::{Color, Position};
    /// let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3").unwrap();
    /// assert_eq!(pos.side_to_move(), Color::White);
    /// assert_eq!(pos.to_fen(), "4k3/8/8/8/8/8/8/4K3 w - - 0 1");
    ///
    /// assert!(Position::from_fen("4k3/8/8 w - - 0 1").is_err());
    /// ```
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut split = fen.split_whitespace();
        let placements = split.next().ok_or(FenError::Empty)?;

        let mut pos = Self {
            pieces: [Bitboard::EMPTY_BOARD; PieceKind::COUNT],
            colors: [Bitboard::EMPTY_BOARD; Color::COUNT],
            mailbox: [None; Square::COUNT],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            ep_square: None,
            halfmove: 0,
            fullmove: 1,
            key: ZobristKey::default(),
            pawn_key: ZobristKey::default(),
            non_pawn_keys: [ZobristKey::default(); Color::COUNT],
            checkers: Bitboard::EMPTY_BOARD,
            blockers: [Bitboard::EMPTY_BOARD; Color::COUNT],
            threats: Bitboard::EMPTY_BOARD,
            history: Vec::with_capacity(512),
        };

        let ranks = placements.split('/').collect::<Vec<_>>();
        if ranks.len() != Rank::COUNT {
            return Err(FenError::RankCount(ranks.len()));
        }

        // Placements start from the eighth rank
        for (rank, row) in Rank::iter().rev().zip(ranks) {
            let mut file = 0;
            for c in row.chars() {
                if let Some(empty) = c.to_digit(10) {
                    file += empty as usize;
                    continue;
                }

                let piece = Piece::from_uci(c)?;
                if file >= File::COUNT {
                    return Err(FenError::RankWidth { rank, files: file + 1 });
                }

                pos.place(piece, Square::new(File(file as u8), rank));
                file += 1;
            }

            if file != File::COUNT {
                return Err(FenError::RankWidth { rank, files: file });
            }
        }

        for color in Color::all() {
            if pos.pieces_of(color, PieceKind::King).population() != 1 {
                return Err(FenError::KingCount(color));
            }
        }

        if let Some(c) = split.next().and_then(|s| s.chars().next()) {
            pos.side_to_move = Color::from_uci(c)?;
        }

        for c in split.next().unwrap_or("-").chars() {
            pos.castling |= match c {
                'K' => CastlingRights::WHITE_SHORT,
                'Q' => CastlingRights::WHITE_LONG,
                'k' => CastlingRights::BLACK_SHORT,
                'q' => CastlingRights::BLACK_LONG,
                '-' => CastlingRights::NONE,
                _ => return Err(FenError::Castling(c)),
            };
        }
        pos.castling = pos.castling & pos.consistent_castling();

        pos.ep_square = match split.next().unwrap_or("-") {
            "-" => None,
            square => Some(Square::from_uci(square)?),
        };

        let halfmove = split.next().unwrap_or("0");
        pos.halfmove = halfmove.parse().map_err(|_| FenError::Counter {
            field: "halfmove",
            value: halfmove.to_string(),
        })?;

        let fullmove = split.next().unwrap_or("1");
        pos.fullmove = fullmove.parse().map_err(|_| FenError::Counter {
            field: "fullmove",
            value: fullmove.to_string(),
        })?;

        let them = !pos.side_to_move;
        if pos.is_square_attacked(pos.king_square(them), them, pos.occupied()) {
            return Err(FenError::OpponentInCheck);
        }

        pos.key = pos.compute_key();
        pos.pawn_key = pos.compute_pawn_key();
        pos.non_pawn_keys = Color::all().map(|color| pos.compute_non_pawn_key(color));
        pos.update_masks();

        Ok(pos)
    }

    /// Castling rights whose king and rook are still on their starting squares.
    fn consistent_castling(&self) -> CastlingRights {
        let mut rights = CastlingRights::NONE;
        for color in Color::all() {
            let king = Piece::new(color, PieceKind::King);
            let rook = Piece::new(color, PieceKind::Rook);
            if self.piece_at(Square::E1.relative_to(color)) != Some(king) {
                continue;
            }

            for short in [true, false] {
                if self.piece_at(castling::rook_from(color, short)) == Some(rook) {
                    rights |= if short {
                        CastlingRights::short(color)
                    } else {
                        CastlingRights::long(color)
                    };
                }
            }
        }
        rights
    }

    /// Converts this position into a FEN string.
    ///
    /// # Example
    /// ```
    /// # use newt::{Position, FEN_KIWIPETE};
    /// let pos = Position::from_fen(FEN_KIWIPETE).unwrap();
    /// assert_eq!(pos.to_fen(), FEN_KIWIPETE);
    /// ```
    pub fn to_fen(&self) -> String {
        let mut placements = String::with_capacity(64);
        for rank in Rank::iter().rev() {
            let mut empty = 0;
            for file in File::iter() {
                match self.piece_at(Square::new(file, rank)) {
                    Some(piece) => {
                        if empty > 0 {
                            placements.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placements.push(piece.to_uci());
                    }
                    None => empty += 1,
                }
            }

            if empty > 0 {
                placements.push_str(&empty.to_string());
            }
            if rank != Rank::ONE {
                placements.push('/');
            }
        }

        let ep = self
            .ep_square
            .map(|sq| sq.to_string())
            .unwrap_or_else(|| String::from("-"));

        format!(
            "{placements} {} {} {ep} {} {}",
            self.side_to_move, self.castling, self.halfmove, self.fullmove
        )
    }

    #[inline(always)]
    pub const fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline(always)]
    pub const fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline(always)]
    pub const fn ep_square(&self) -> Option<Square> {
        self.ep_square
    }

    #[inline(always)]
    pub const fn halfmove(&self) -> u16 {
        self.halfmove
    }

    #[inline(always)]
    pub const fn fullmove(&self) -> u16 {
        self.fullmove
    }

    /// Zobrist key of the whole position.
    #[inline(always)]
    pub const fn key(&self) -> ZobristKey {
        self.key
    }

    /// Zobrist key of the pawns of both colors.
    #[inline(always)]
    pub const fn pawn_key(&self) -> ZobristKey {
        self.pawn_key
    }

    /// Zobrist key of every non-pawn piece (king included) of `color`.
    #[inline(always)]
    pub const fn non_pawn_key(&self, color: Color) -> ZobristKey {
        self.non_pawn_keys[color.index()]
    }

    #[inline(always)]
    pub const fn checkers(&self) -> Bitboard {
        self.checkers
    }

    #[inline(always)]
    pub const fn in_check(&self) -> bool {
        self.checkers.is_nonempty()
    }

    /// Pieces (of either color) shielding `color`'s king from an enemy slider.
    #[inline(always)]
    pub const fn blockers(&self, color: Color) -> Bitboard {
        self.blockers[color.index()]
    }

    /// Squares attacked by the side not to move.
    #[inline(always)]
    pub const fn threats(&self) -> Bitboard {
        self.threats
    }

    #[inline(always)]
    pub const fn kind(&self, kind: PieceKind) -> Bitboard {
        self.pieces[kind.index()]
    }

    #[inline(always)]
    pub const fn color(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    #[inline(always)]
    pub const fn pieces_of(&self, color: Color, kind: PieceKind) -> Bitboard {
        self.pieces[kind.index()].and(self.colors[color.index()])
    }

    #[inline(always)]
    pub const fn occupied(&self) -> Bitboard {
        self.colors[0].or(self.colors[1])
    }

    #[inline(always)]
    pub const fn piece_at(&self, square: Square) -> Option<Piece> {
        self.mailbox[square.index()]
    }

    #[inline(always)]
    pub const fn king_square(&self, color: Color) -> Square {
        self.pieces_of(color, PieceKind::King).lsb_unchecked()
    }

    /// The piece making `mv`.
    #[inline(always)]
    pub fn moved_piece(&self, mv: Move) -> Option<Piece> {
        self.piece_at(mv.from())
    }

    /// Returns `true` for castling and for normal moves onto an empty square.
    ///
    /// Every other move (captures, en passant, promotions) is noisy.
    #[inline(always)]
    pub fn is_quiet(&self, mv: Move) -> bool {
        match mv.kind() {
            MoveKind::Castling => true,
            MoveKind::Normal => self.piece_at(mv.to()).is_none(),
            _ => false,
        }
    }

    #[inline(always)]
    pub fn is_noisy(&self, mv: Move) -> bool {
        !self.is_quiet(mv)
    }

    /// The kind of piece a noisy move captures. Non-capturing promotions report a pawn.
    #[inline(always)]
    pub fn captured_kind(&self, mv: Move) -> PieceKind {
        debug_assert!(self.is_noisy(mv));
        if mv.kind() == MoveKind::EnPassant {
            return PieceKind::Pawn;
        }
        self.piece_at(mv.to())
            .map(|piece| piece.kind())
            .unwrap_or(PieceKind::Pawn)
    }

    /// Returns `true` if `color` has any piece besides pawns and its king.
    #[inline(always)]
    pub fn has_non_pawn(&self, color: Color) -> bool {
        let pawns_and_kings = self.kind(PieceKind::Pawn) | self.kind(PieceKind::King);
        (self.color(color) & !pawns_and_kings).is_nonempty()
    }

    /// Every piece of either color attacking `square`, given `occupied`.
    pub fn attackers(&self, square: Square, occupied: Bitboard) -> Bitboard {
        let diagonal = self.kind(PieceKind::Bishop) | self.kind(PieceKind::Queen);
        let orthogonal = self.kind(PieceKind::Rook) | self.kind(PieceKind::Queen);
        let pawns = self.kind(PieceKind::Pawn);

        (pawn_attacks(square, Color::White) & pawns & self.color(Color::Black))
            | (pawn_attacks(square, Color::Black) & pawns & self.color(Color::White))
            | (knight_attacks(square) & self.kind(PieceKind::Knight))
            | (bishop_attacks(square, occupied) & diagonal)
            | (rook_attacks(square, occupied) & orthogonal)
            | (king_attacks(square) & self.kind(PieceKind::King))
    }

    /// Returns `true` if an enemy of `color` attacks `square`, given `occupied`.
    pub fn is_square_attacked(&self, square: Square, color: Color, occupied: Bitboard) -> bool {
        let enemy = self.color(!color);
        let queens = self.kind(PieceKind::Queen);

        (pawn_attacks(square, color) & enemy & self.kind(PieceKind::Pawn)).is_nonempty()
            || (knight_attacks(square) & enemy & self.kind(PieceKind::Knight)).is_nonempty()
            || (bishop_attacks(square, occupied) & enemy & (self.kind(PieceKind::Bishop) | queens))
                .is_nonempty()
            || (rook_attacks(square, occupied) & enemy & (self.kind(PieceKind::Rook) | queens))
                .is_nonempty()
            || (king_attacks(square) & enemy & self.kind(PieceKind::King)).is_nonempty()
    }

    /// Generates pseudo-legal moves of the requested [`GenType`].
    #[inline(always)]
    pub fn generate(&self, gen: GenType) -> MoveList {
        generate(self, gen)
    }

    /// All legal moves in this position.
    ///
    /// # Example
    /// ```
    /// # use newt::Position;
    /// assert_eq!(Position::default().legal_moves().len(), 20);
    /// ```
    pub fn legal_moves(&self) -> MoveList {
        let mut moves = self.generate(GenType::All);
        moves.retain(|mv| self.is_legal(*mv));
        moves
    }

    /// Checks whether `mv` could have been generated in this position.
    ///
    /// Used to validate moves from untrusted sources, like the transposition table or killer slots.
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        if mv.is_null() {
            return false;
        }

        let color = self.side_to_move;
        let (from, to, kind) = (mv.from(), mv.to(), mv.kind());
        let occupied = self.occupied();

        let Some(piece) = self.piece_at(from) else {
            return false;
        };

        if piece.color() != color {
            return false;
        }

        if kind != MoveKind::Castling && self.color(color).contains(to) {
            return false;
        }

        if self.checkers.is_many() {
            return kind == MoveKind::Normal
                && piece.kind() == PieceKind::King
                && king_attacks(from).contains(to);
        }

        match kind {
            MoveKind::Castling => {
                let right = CastlingRights::from_corner(to) & CastlingRights::of(color);
                return self.checkers.is_empty()
                    && piece.kind() == PieceKind::King
                    && from == Square::E1.relative_to(color)
                    && self.castling.intersects(right)
                    && !ray_between(from, to).intersects(occupied);
            }
            MoveKind::EnPassant => {
                return piece.kind() == PieceKind::Pawn
                    && self.ep_square == Some(to)
                    && pawn_attacks(from, color).contains(to);
            }
            MoveKind::Promotion if piece.kind() != PieceKind::Pawn => return false,
            _ => {}
        }

        if piece.kind() == PieceKind::King {
            return king_attacks(from).contains(to);
        }

        // A single check must be blocked or the checker captured
        if let Some(checker) = self.checkers.lsb() {
            let evasions = ray_between(self.king_square(color), checker) | self.checkers;
            if !evasions.contains(to) {
                return false;
            }
        }

        if piece.kind() == PieceKind::Pawn {
            let empty = !occupied;
            let third_rank = match color {
                Color::White => Bitboard::RANK_3,
                Color::Black => Bitboard::RANK_6,
            };
            let push_1 = from.bitboard().forward(color) & empty;
            let push_2 = (push_1 & third_rank).forward(color) & empty;
            let captures = pawn_attacks(from, color) & self.color(!color);
            let mut span = push_1 | push_2 | captures;

            if kind == MoveKind::Promotion {
                span &= Bitboard::BACK_RANKS;
            } else {
                span &= !Bitboard::BACK_RANKS;
            }
            return span.contains(to);
        }

        if self.blockers(color).contains(from)
            && !ray_containing(from, to).intersects(self.pieces_of(color, PieceKind::King))
        {
            return false;
        }

        attacks_for(piece.kind(), from, color, occupied).contains(to)
    }

    /// Finishes legality checking for a pseudo-legal move.
    ///
    /// Knight and slider moves are already legal once generated, so only king moves, castling,
    /// and pawn moves are inspected here.
    pub fn is_legal(&self, mv: Move) -> bool {
        let color = self.side_to_move;
        let (from, to) = (mv.from(), mv.to());
        let Some(piece) = self.piece_at(from) else {
            return false;
        };

        if !matches!(piece.kind(), PieceKind::King | PieceKind::Pawn) {
            return true;
        }

        match mv.kind() {
            MoveKind::Castling => {
                let short = to > from;
                let occupied = self.occupied();
                !self.is_square_attacked(castling::king_to(color, short), color, occupied)
                    && !self.is_square_attacked(castling::rook_to(color, short), color, occupied)
            }
            _ if piece.kind() == PieceKind::King => {
                !self.is_square_attacked(to, color, self.occupied() ^ from)
            }
            MoveKind::EnPassant => {
                let victim = to.behind(color);
                let occupied = self.occupied() ^ from ^ to ^ victim;
                let king = self.king_square(color);
                let queens = self.pieces_of(!color, PieceKind::Queen);
                let diagonal = self.pieces_of(!color, PieceKind::Bishop) | queens;
                let orthogonal = self.pieces_of(!color, PieceKind::Rook) | queens;

                // A knight check can't be answered by en passant
                let leapers = self.checkers & self.pieces_of(!color, PieceKind::Knight);

                leapers.is_empty()
                    && !bishop_attacks(king, occupied).intersects(diagonal)
                    && !rook_attacks(king, occupied).intersects(orthogonal)
            }
            _ => {
                !self.blockers(color).contains(from)
                    || ray_containing(from, to).intersects(self.pieces_of(color, PieceKind::King))
            }
        }
    }

    /// Returns `true` if this position is drawn by insufficient material, the fifty-move rule,
    /// or repetition. `ply` is the distance from the search root.
    pub fn is_draw(&self, ply: usize) -> bool {
        self.is_insufficient_material() || self.is_fifty_move_draw() || self.is_repetition(ply)
    }

    /// Scans earlier positions with the same side to move.
    ///
    /// A single repetition inside the search tree (within `ply`) counts as a draw,
    /// while positions from before the root must repeat twice.
    pub fn is_repetition(&self, ply: usize) -> bool {
        let size = self.history.len();
        let mut count = 0;

        for i in (4..self.halfmove as usize + 2).step_by(2) {
            if i > size {
                break;
            }

            if self.history[size - i].key != self.key {
                continue;
            }

            if i <= ply {
                return true;
            }

            count += 1;
            if count == 2 {
                return true;
            }
        }

        false
    }

    /// Fifty-move rule, which never applies to a checked side (they may be mated).
    #[inline(always)]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove >= 100 && self.checkers.is_empty()
    }

    /// Bare kings, a single minor piece, or two bishops on same-colored squares.
    ///
    /// # Example
    /// ```
    /// # use newt::Position;
    /// let pos = Position::from_fen("8/8/4k3/8/8/2K5/8/5N2 w - - 0 1").unwrap();
    /// assert!(pos.is_insufficient_material());
    /// ```
    pub fn is_insufficient_material(&self) -> bool {
        let occupied = self.occupied();
        match occupied.population() {
            2 => true,
            3 => (self.kind(PieceKind::Knight) | self.kind(PieceKind::Bishop)).is_nonempty(),
            4 => {
                let bishops = self.kind(PieceKind::Bishop);
                bishops.is_many()
                    && bishops.lsb_unchecked().is_light() == bishops.msb_unchecked().is_light()
            }
            _ => false,
        }
    }

    /// Detects whether the side to move can force a repetition with a single reversible move.
    ///
    /// Walks back over pairs of reversible plies, using `cuckoo` to check whether the key
    /// difference to an earlier position is exactly one piece move with a clear path.
    pub fn has_upcoming_repetition(&self, cuckoo: &Cuckoo, ply: usize) -> bool {
        let size = self.history.len();
        let max = (self.halfmove as usize).min(size);
        if max < 3 {
            return false;
        }

        let key_ago = |plies: usize| self.history[size - plies].key;
        let occupied = self.occupied();
        let mut other = !(self.key.inner() ^ key_ago(1).inner());

        for i in (3..=max).step_by(2) {
            other ^= !(key_ago(i).inner() ^ key_ago(i - 1).inner());
            if other != 0 {
                continue;
            }

            let Some((a, b)) = cuckoo.probe(self.key ^ key_ago(i)) else {
                continue;
            };

            if ray_between(a, b).intersects(occupied) {
                continue;
            }

            if i < ply {
                return true;
            }

            return self
                .piece_at(a)
                .or(self.piece_at(b))
                .is_some_and(|piece| piece.color() == self.side_to_move);
        }

        false
    }

    /// Applies a pseudo-legal move.
    pub fn make(&mut self, mv: Move) {
        let color = self.side_to_move;
        let (from, to, kind) = (mv.from(), mv.to(), mv.kind());

        let Some(piece) = self.piece_at(from) else {
            debug_assert!(false, "no piece to move for {mv:?} in {}", self.to_fen());
            return;
        };

        let captured = match kind {
            MoveKind::Castling => None,
            _ => self.piece_at(to).map(|victim| victim.kind()),
        };

        self.history.push(self.undo(captured));
        self.halfmove += 1;
        if color == Color::Black {
            self.fullmove += 1;
        }

        if let Some(ep) = self.ep_square.take() {
            self.key ^= ZobristKey::ep_file(ep.file());
        }

        if let Some(victim) = captured {
            let victim = Piece::new(!color, victim);
            self.halfmove = 0;
            self.remove(victim, to);
            self.toggle_keys(victim, to);

            if victim.kind() == PieceKind::Rook {
                self.remove_castling(CastlingRights::from_corner(to));
            }
        }

        match piece.kind() {
            PieceKind::King => self.remove_castling(CastlingRights::of(color)),
            PieceKind::Rook => self.remove_castling(CastlingRights::from_corner(from)),
            PieceKind::Pawn => {
                self.halfmove = 0;
                if from.inner().abs_diff(to.inner()) == 16 {
                    let ep = to.behind(color);
                    self.ep_square = Some(ep);
                    self.key ^= ZobristKey::ep_file(ep.file());
                }
            }
            _ => {}
        }

        match kind {
            MoveKind::Castling => {
                let short = to > from;
                let rook = Piece::new(color, PieceKind::Rook);
                let king_to = castling::king_to(color, short);
                let rook_to = castling::rook_to(color, short);

                self.remove(piece, from);
                self.remove(rook, to);
                self.place(piece, king_to);
                self.place(rook, rook_to);

                self.toggle_keys(piece, from);
                self.toggle_keys(piece, king_to);
                self.toggle_keys(rook, to);
                self.toggle_keys(rook, rook_to);
            }
            MoveKind::Promotion => {
                let promoted = Piece::new(color, mv.promotion());
                self.remove(piece, from);
                self.place(promoted, to);
                self.toggle_keys(piece, from);
                self.toggle_keys(promoted, to);
            }
            MoveKind::Normal | MoveKind::EnPassant => {
                self.remove(piece, from);
                self.place(piece, to);
                self.toggle_keys(piece, from);
                self.toggle_keys(piece, to);

                if kind == MoveKind::EnPassant {
                    let victim = Piece::new(!color, PieceKind::Pawn);
                    let square = to.behind(color);
                    self.remove(victim, square);
                    self.toggle_keys(victim, square);
                }
            }
        }

        self.side_to_move = !color;
        self.key ^= ZobristKey::side();
        self.update_masks();

        debug_assert_eq!(self.key, self.compute_key());
        debug_assert_eq!(self.pawn_key, self.compute_pawn_key());
    }

    /// Reverts `mv`, which must be the last move made.
    pub fn unmake(&mut self, mv: Move) {
        let Some(undo) = self.history.pop() else {
            debug_assert!(false, "unmake({mv:?}) without a matching make");
            return;
        };
        self.restore(&undo);

        let color = self.side_to_move;
        let (from, to) = (mv.from(), mv.to());

        match mv.kind() {
            MoveKind::Castling => {
                let short = to > from;
                let king = Piece::new(color, PieceKind::King);
                let rook = Piece::new(color, PieceKind::Rook);
                self.remove(king, castling::king_to(color, short));
                self.remove(rook, castling::rook_to(color, short));
                self.place(king, from);
                self.place(rook, to);
            }
            MoveKind::Promotion => {
                self.remove(Piece::new(color, mv.promotion()), to);
                self.place(Piece::new(color, PieceKind::Pawn), from);
                if let Some(captured) = undo.captured {
                    self.place(Piece::new(!color, captured), to);
                }
            }
            MoveKind::Normal | MoveKind::EnPassant => {
                let Some(piece) = self.piece_at(to) else {
                    debug_assert!(false, "nothing to unmake on {to} for {mv:?}");
                    return;
                };
                self.remove(piece, to);
                self.place(piece, from);

                if mv.kind() == MoveKind::EnPassant {
                    self.place(Piece::new(!color, PieceKind::Pawn), to.behind(color));
                } else if let Some(captured) = undo.captured {
                    self.place(Piece::new(!color, captured), to);
                }
            }
        }
    }

    /// Passes the turn without moving a piece.
    pub fn make_null(&mut self) {
        debug_assert!(!self.in_check());
        self.history.push(self.undo(None));

        if self.side_to_move == Color::Black {
            self.fullmove += 1;
        }
        self.side_to_move = !self.side_to_move;
        self.key ^= ZobristKey::side();

        if let Some(ep) = self.ep_square.take() {
            self.key ^= ZobristKey::ep_file(ep.file());
        }

        self.checkers = Bitboard::EMPTY_BOARD;
        self.update_threats();
    }

    /// Reverts [`Position::make_null`].
    pub fn unmake_null(&mut self) {
        if let Some(undo) = self.history.pop() {
            self.restore(&undo);
        }
    }

    fn undo(&self, captured: Option<PieceKind>) -> Undo {
        Undo {
            key: self.key,
            pawn_key: self.pawn_key,
            non_pawn_keys: self.non_pawn_keys,
            castling: self.castling,
            ep_square: self.ep_square,
            halfmove: self.halfmove,
            captured,
            checkers: self.checkers,
            blockers: self.blockers,
            threats: self.threats,
        }
    }

    fn restore(&mut self, undo: &Undo) {
        self.key = undo.key;
        self.pawn_key = undo.pawn_key;
        self.non_pawn_keys = undo.non_pawn_keys;
        self.castling = undo.castling;
        self.ep_square = undo.ep_square;
        self.halfmove = undo.halfmove;
        self.checkers = undo.checkers;
        self.blockers = undo.blockers;
        self.threats = undo.threats;

        self.side_to_move = !self.side_to_move;
        if self.side_to_move == Color::Black {
            self.fullmove -= 1;
        }
    }

    #[inline(always)]
    fn place(&mut self, piece: Piece, square: Square) {
        debug_assert!(self.mailbox[square.index()].is_none());
        self.pieces[piece.kind().index()] |= square;
        self.colors[piece.color().index()] |= square;
        self.mailbox[square.index()] = Some(piece);
    }

    #[inline(always)]
    fn remove(&mut self, piece: Piece, square: Square) {
        debug_assert_eq!(self.mailbox[square.index()], Some(piece));
        self.pieces[piece.kind().index()] ^= square;
        self.colors[piece.color().index()] ^= square;
        self.mailbox[square.index()] = None;
    }

    #[inline(always)]
    fn toggle_keys(&mut self, piece: Piece, square: Square) {
        let key = ZobristKey::piece(piece, square);
        self.key ^= key;
        if piece.kind() == PieceKind::Pawn {
            self.pawn_key ^= key;
        } else {
            self.non_pawn_keys[piece.color().index()] ^= key;
        }
    }

    #[inline(always)]
    fn remove_castling(&mut self, rights: CastlingRights) {
        let removed = self.castling & rights;
        if !removed.is_empty() {
            self.castling ^= removed;
            self.key ^= ZobristKey::castling(removed);
        }
    }

    fn update_masks(&mut self) {
        let color = self.side_to_move;
        let king = self.king_square(color);
        let occupied = self.occupied();

        self.checkers = self.attackers(king, occupied) & self.color(!color);
        for color in Color::all() {
            self.update_blockers(color);
        }
        self.update_threats();
    }

    fn update_blockers(&mut self, color: Color) {
        let king = self.king_square(color);
        let queens = self.kind(PieceKind::Queen);
        let diagonal = self.kind(PieceKind::Bishop) | queens;
        let orthogonal = self.kind(PieceKind::Rook) | queens;

        let snipers = ((bishop_attacks(king, Bitboard::EMPTY_BOARD) & diagonal)
            | (rook_attacks(king, Bitboard::EMPTY_BOARD) & orthogonal))
            & self.color(!color);
        let occupied = self.occupied() ^ snipers;

        let mut blockers = Bitboard::EMPTY_BOARD;
        for sniper in snipers {
            let between = ray_between(king, sniper) & occupied;
            if between.population() == 1 {
                blockers |= between;
            }
        }
        self.blockers[color.index()] = blockers;
    }

    fn update_threats(&mut self) {
        let them = !self.side_to_move;
        let occupied = self.occupied();

        let mut threats = king_attacks(self.king_square(them));

        let pawns = self.pieces_of(them, PieceKind::Pawn).forward(them);
        threats |= pawns.east() | pawns.west();

        for square in self.pieces_of(them, PieceKind::Knight) {
            threats |= knight_attacks(square);
        }
        let queens = self.pieces_of(them, PieceKind::Queen);
        for square in self.pieces_of(them, PieceKind::Bishop) | queens {
            threats |= bishop_attacks(square, occupied);
        }
        for square in self.pieces_of(them, PieceKind::Rook) | queens {
            threats |= rook_attacks(square, occupied);
        }

        self.threats = threats;
    }

    fn compute_key(&self) -> ZobristKey {
        let mut key = self.compute_pawn_key()
            ^ self.compute_non_pawn_key(Color::White)
            ^ self.compute_non_pawn_key(Color::Black)
            ^ ZobristKey::castling(self.castling);

        if let Some(ep) = self.ep_square {
            key ^= ZobristKey::ep_file(ep.file());
        }
        if self.side_to_move == Color::White {
            key ^= ZobristKey::side();
        }
        key
    }

    fn compute_pawn_key(&self) -> ZobristKey {
        let mut key = ZobristKey::default();
        for square in self.kind(PieceKind::Pawn) {
            if let Some(piece) = self.piece_at(square) {
                key.toggle_piece(piece, square);
            }
        }
        key
    }

    fn compute_non_pawn_key(&self, color: Color) -> ZobristKey {
        let mut key = ZobristKey::default();
        for square in self.color(color) & !self.kind(PieceKind::Pawn) {
            if let Some(piece) = self.piece_at(square) {
                key.toggle_piece(piece, square);
            }
        }
        key
    }
}

impl Default for Position {
    fn default() -> Self {
        match Self::from_fen(FEN_STARTPOS) {
            Ok(pos) => pos,
            Err(err) => unreachable!("startpos FEN is invalid: {err}"),
        }
    }
}

impl FromStr for Position {
    type Err = FenError;
    #[inline(always)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

impl fmt::Display for Position {
    /// Display this position's FEN string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

impl fmt::Debug for Position {
    /// Prints the board, with White at the bottom, alongside the position's state.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in Rank::iter().rev() {
            write!(f, "{rank}|")?;
            for file in File::iter() {
                let piece = self.piece_at(Square::new(file, rank));
                write!(f, " {}", piece.map(|p| p.to_uci()).unwrap_or('.'))?;
            }

            match rank {
                Rank::EIGHT => write!(f, "           FEN: {}", self.to_fen())?,
                Rank::SEVEN => write!(f, "          Side: {}", self.side_to_move.name())?,
                Rank::SIX => write!(f, "      Castling: {}", self.castling)?,
                Rank::FIVE => {
                    let ep = self.ep_square.map(|sq| sq.to_string());
                    write!(f, "            EP: {}", ep.as_deref().unwrap_or("-"))?
                }
                Rank::FOUR => write!(f, "     Half-move: {}", self.halfmove)?,
                Rank::THREE => write!(f, "     Full-move: {}", self.fullmove)?,
                Rank::TWO => write!(f, "           Key: {}", self.key)?,
                _ => {}
            }
            writeln!(f)?;
        }

        writeln!(f, " +----------------")?;
        write!(f, "   a b c d e f g h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(pos: &mut Position, moves: &str) {
        for text in moves.split_whitespace() {
            let mv = Move::from_uci(pos, text).unwrap();
            pos.make(mv);
        }
    }

    #[test]
    fn test_fen_round_trip() {
        for fen in [
            FEN_STARTPOS,
            FEN_KIWIPETE,
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
        ] {
            assert_eq!(Position::from_fen(fen).unwrap().to_fen(), fen);
        }
    }

    #[test]
    fn test_fen_errors() {
        assert!(matches!(Position::from_fen(""), Err(FenError::Empty)));
        assert!(matches!(
            Position::from_fen("8/8/8/8/8/8/8 w - - 0 1"),
            Err(FenError::RankCount(7))
        ));
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K4 w - - 0 1"),
            Err(FenError::RankWidth { .. })
        ));
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/8 w - - 0 1"),
            Err(FenError::KingCount(Color::White))
        ));
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 w X - 0 1"),
            Err(FenError::Castling('X'))
        ));
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - x 1"),
            Err(FenError::Counter { .. })
        ));
        assert!(matches!(
            Position::from_fen("4k3/4R3/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::OpponentInCheck)
        ));
    }

    #[test]
    fn test_make_unmake_restores_everything() {
        let mut pos = Position::from_fen(FEN_KIWIPETE).unwrap();
        let fen = pos.to_fen();
        let keys = (pos.key(), pos.pawn_key(), pos.non_pawn_key(Color::White), pos.non_pawn_key(Color::Black));

        for mv in pos.legal_moves() {
            pos.make(mv);
            assert_eq!(pos.key(), pos.compute_key(), "{mv:?}");
            pos.unmake(mv);
            assert_eq!(pos.to_fen(), fen, "{mv:?}");
            assert_eq!(
                (pos.key(), pos.pawn_key(), pos.non_pawn_key(Color::White), pos.non_pawn_key(Color::Black)),
                keys
            );
        }
    }

    #[test]
    fn test_castling_updates_rights_and_board() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        play(&mut pos, "e1g1");
        assert_eq!(pos.to_fen(), "r3k2r/8/8/8/8/8/8/R4RK1 b kq - 1 1");
        play(&mut pos, "a8a1");
        assert_eq!(pos.castling(), CastlingRights::BLACK_SHORT);
    }

    #[test]
    fn test_en_passant_square_always_set() {
        let mut pos = Position::default();
        play(&mut pos, "e2e4");
        assert_eq!(pos.ep_square(), Some(Square::E3));
        play(&mut pos, "g8f6");
        assert_eq!(pos.ep_square(), None);
    }

    #[test]
    fn test_null_move() {
        let mut pos = Position::default();
        play(&mut pos, "e2e4");
        let key = pos.key();
        pos.make_null();
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.ep_square(), None);
        assert_ne!(pos.key(), key);
        pos.unmake_null();
        assert_eq!(pos.key(), key);
        assert_eq!(pos.side_to_move(), Color::Black);
    }

    #[test]
    fn test_repetition() {
        let mut pos = Position::default();
        play(&mut pos, "g1f3 g8f6 f3g1 f6g8");
        assert!(!pos.is_repetition(0));
        assert!(pos.is_repetition(4));

        play(&mut pos, "g1f3 g8f6 f3g1 f6g8");
        assert!(pos.is_repetition(0));
        assert!(pos.is_draw(0));
    }

    #[test]
    fn test_upcoming_repetition() {
        let cuckoo = Cuckoo::new();
        let mut pos = Position::default();
        play(&mut pos, "g1f3 g8f6 f3g1");
        assert!(pos.has_upcoming_repetition(&cuckoo, 0));

        let mut pos = Position::default();
        play(&mut pos, "g1f3 g8f6 e2e4");
        assert!(!pos.has_upcoming_repetition(&cuckoo, 0));
    }

    #[test]
    fn test_insufficient_material() {
        let drawn = [
            "8/8/4k3/8/8/2K5/8/8 w - - 0 1",
            "8/8/4k3/8/8/2K5/8/5b2 w - - 0 1",
            "8/8/4k3/8/8/2K5/8/2B1b3 w - - 0 1",
        ];
        let playable = [
            "8/8/4k3/8/8/2K5/8/2B2b2 w - - 0 1",
            "8/8/4k3/8/8/2K5/8/5p2 w - - 0 1",
            "8/8/4k3/8/8/2K5/8/3NN3 w - - 0 1",
        ];
        for fen in drawn {
            assert!(Position::from_fen(fen).unwrap().is_insufficient_material(), "{fen}");
        }
        for fen in playable {
            assert!(!Position::from_fen(fen).unwrap().is_insufficient_material(), "{fen}");
        }
    }

    #[test]
    fn test_fifty_move_rule_needs_no_check() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K2R b - - 100 80").unwrap();
        assert!(pos.is_fifty_move_draw());
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4R1K1 b - - 100 80").unwrap();
        assert!(!pos.is_fifty_move_draw());
    }

    #[test]
    fn test_pseudo_legality_rejects_garbage() {
        let pos = Position::from_fen(FEN_KIWIPETE).unwrap();
        assert!(!pos.is_pseudo_legal(Move::NULL));
        // Black piece
        assert!(!pos.is_pseudo_legal(Move::new(Square::A8, Square::B8, MoveKind::Normal)));
        // Friendly destination
        assert!(!pos.is_pseudo_legal(Move::new(Square::A1, Square::A2, MoveKind::Normal)));
        // Sliding through a piece
        assert!(!pos.is_pseudo_legal(Move::new(Square::F3, Square::F7, MoveKind::Normal)));
        // Castling with the opponent's rook
        assert!(!pos.is_pseudo_legal(Move::new(Square::E1, Square::H8, MoveKind::Castling)));
        // Promotion by a non-pawn, and a promotion off the last rank
        assert!(!pos.is_pseudo_legal(Move::new_promotion(Square::E5, Square::F7, PieceKind::Queen)));
        assert!(!pos.is_pseudo_legal(Move::new_promotion(Square::A2, Square::A3, PieceKind::Queen)));

        for mv in pos.generate(GenType::All) {
            assert!(pos.is_pseudo_legal(mv), "{mv:?}");
        }
    }

    #[test]
    fn test_double_check_only_king_moves() {
        let pos = Position::from_fen("4k3/8/8/8/8/5n2/8/r3K2R w K - 0 1").unwrap();
        assert!(pos.checkers().is_many());
        for mv in pos.legal_moves() {
            assert_eq!(mv.from(), Square::E1, "{mv:?}");
        }
    }

    #[test]
    fn test_en_passant_discovered_check_is_illegal() {
        let pos = Position::from_fen("8/8/8/K2pP2r/8/8/8/7k w - d6 0 1").unwrap();
        let ep = Move::new(Square::E5, Square::D6, MoveKind::EnPassant);
        assert!(pos.is_pseudo_legal(ep));
        assert!(!pos.is_legal(ep));
    }
}
