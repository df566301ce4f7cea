/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::Neg,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use arrayvec::ArrayVec;
use uci_parser::{UciInfo, UciResponse, UciSearchOptions};

use crate::{
    see, tune, Bound, ContKey, Cuckoo, Evaluator, History, Move, MoveList, MovePicker, Position,
    Score, Stage, TTable, TimeManager, CONT_OFFSETS,
};

/// Maximum number of plies a search can reach from the root.
pub const MAX_PLY: usize = 256;

/// Deepest iteration the iterative deepening loop will start.
pub const MAX_DEPTH: i32 = MAX_PLY as i32 - 1;

/// Entries of the search stack that precede the root, so that looking back a few plies never underflows.
const STACK_OFFSET: usize = 4;

/// Every this many nodes, the main thread checks the clock.
const TIME_CHECK_INTERVAL: u64 = 4096;

/// Every this many nodes, a thread adds its node count to the shared total.
const NODE_FLUSH_INTERVAL: u64 = 1024;

/// How much a search prints to `stdout`.
pub trait LogLevel {
    /// Print `info` lines and `bestmove`.
    const INFO: bool;

    /// Print additional diagnostics as `info string`.
    const DEBUG: bool;
}

/// Prints nothing. Used by helper threads, benchmarks, and tests.
pub struct LogNone;
impl LogLevel for LogNone {
    const INFO: bool = false;
    const DEBUG: bool = false;
}

/// Prints what the UCI protocol expects.
pub struct LogInfo;
impl LogLevel for LogInfo {
    const INFO: bool = true;
    const DEBUG: bool = false;
}

/// Prints everything.
pub struct LogDebug;
impl LogLevel for LogDebug {
    const INFO: bool = true;
    const DEBUG: bool = true;
}

/// A marker trait for the types of nodes encountered during search.
trait NodeType {
    /// Is this node the first searched?
    const ROOT: bool;

    /// Is this node a PV node?
    const PV: bool;
}

/// First node searched.
struct RootNode;
impl NodeType for RootNode {
    const ROOT: bool = true;
    const PV: bool = true;
}

/// A node on the principal variation, searched with a non-null window.
struct PvNode;
impl NodeType for PvNode {
    const ROOT: bool = false;
    const PV: bool = true;
}

/// A node not on the principal variation, searched with a null window.
struct NonPvNode;
impl NodeType for NonPvNode {
    const ROOT: bool = false;
    const PV: bool = false;
}

/// Represents the best sequence of moves found during a search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrincipalVariation(ArrayVec<Move, MAX_PLY>);

impl PrincipalVariation {
    /// An empty PV.
    pub const EMPTY: Self = Self(ArrayVec::new_const());

    #[inline(always)]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Replaces the contents of `self` with `mv` followed by the contents of `other`.
    #[inline(always)]
    pub fn extend(&mut self, mv: Move, other: &Self) {
        self.clear();
        self.0.push(mv);

        // A line can never be longer than the distance to the maximum ply
        let room = self.0.remaining_capacity();
        self.0.extend(other.0.iter().take(room).copied());
    }

    #[inline(always)]
    pub fn moves(&self) -> &[Move] {
        &self.0
    }

    #[inline(always)]
    pub fn first(&self) -> Option<Move> {
        self.0.first().copied()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for PrincipalVariation {
    #[inline(always)]
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for PrincipalVariation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut moves = self.0.iter();
        if let Some(mv) = moves.next() {
            write!(f, "{mv}")?;
        }
        for mv in moves {
            write!(f, " {mv}")?;
        }
        Ok(())
    }
}

/// Bounds within an alpha-beta search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBounds {
    /// Lower bound.
    ///
    /// We are guaranteed a score that is AT LEAST `alpha`.
    /// During search, if no move can raise `alpha`, we are said to have "failed low."
    pub alpha: Score,

    /// Upper bound.
    ///
    /// Our opponent is guaranteed a score that is AT MOST `beta`.
    /// During search, if a move scores higher than `beta`, we are said to have "failed high."
    pub beta: Score,
}

impl SearchBounds {
    /// Create a new [`SearchBounds`] from the provided `alpha` and `beta` values.
    #[inline(always)]
    pub const fn new(alpha: Score, beta: Score) -> Self {
        Self { alpha, beta }
    }

    /// Create a "null window" around `alpha`.
    #[inline(always)]
    fn null_alpha(self) -> Self {
        Self::new(self.alpha, self.alpha + 1)
    }

    /// Create a "null window" around `beta`.
    #[inline(always)]
    fn null_beta(self) -> Self {
        Self::new(self.beta - 1, self.beta)
    }
}

impl Neg for SearchBounds {
    type Output = Self;
    /// Negating a [`SearchBounds`] swaps the `alpha` and `beta` fields and negates them both.
    #[inline(always)]
    fn neg(self) -> Self::Output {
        Self {
            alpha: -self.beta,
            beta: -self.alpha,
        }
    }
}

impl Default for SearchBounds {
    /// Default [`SearchBounds`] are a `(-infinity, infinity)`.
    #[inline(always)]
    fn default() -> Self {
        Self::new(-Score::INF, Score::INF)
    }
}

/// Represents a window around a search result to act as our a/b bounds.
#[derive(Debug)]
struct AspirationWindow {
    /// Bounds of this search window
    bounds: SearchBounds,

    /// Distance from the expected score to the edges of the window.
    delta: Score,
}

impl AspirationWindow {
    /// Creates a new [`AspirationWindow`] centered around `score`.
    #[inline(always)]
    fn new(score: Score, depth: i32) -> Self {
        let delta = Score(tune::initial_aspiration_window_delta!());

        // Mate scores fluctuate too much to guess around, and shallow iterations are cheap enough to search fully
        let bounds = if depth < tune::min_aspiration_window_depth!() || score.is_mate() {
            SearchBounds::default()
        } else {
            SearchBounds::new((score - delta).max(-Score::INF), (score + delta).min(Score::INF))
        };

        Self { bounds, delta }
    }

    /// Widens the window's `alpha` bound, expanding it downwards.
    ///
    /// This also pulls the `beta` bound down to `(alpha + beta) / 2`.
    #[inline(always)]
    fn widen_down(&mut self, score: Score) {
        self.bounds.beta = (self.bounds.alpha + self.bounds.beta) / 2;
        self.bounds.alpha = (score - self.delta).max(-Score::INF);
        self.grow();
    }

    /// Widens the window's `beta` bound, expanding it upwards.
    #[inline(always)]
    fn widen_up(&mut self, score: Score) {
        self.bounds.beta = (score + self.delta).min(Score::INF);
        self.grow();
    }

    #[inline(always)]
    fn grow(&mut self) {
        self.delta += self.delta / 2;
    }

    /// Returns `true` if `score` fails low, meaning it is below `alpha` and the window must be expanded downwards.
    #[inline(always)]
    fn fails_low(&self, score: Score) -> bool {
        self.bounds.alpha != -Score::INF && score <= self.bounds.alpha
    }

    /// Returns `true` if `score` fails high, meaning it is above `beta` and the window must be expanded upwards.
    #[inline(always)]
    fn fails_high(&self, score: Score) -> bool {
        self.bounds.beta != Score::INF && score >= self.bounds.beta
    }
}

/// The result of a search, containing the best move found, score, and total nodes searched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchResult {
    /// Number of nodes searched by this thread.
    pub nodes: u64,

    /// Best move found during the search, or `None` if there are no legal moves.
    pub bestmove: Option<Move>,

    /// Score of the position, from the side to move's perspective.
    pub score: Score,

    /// Depth of the last completed iteration.
    pub depth: i32,

    /// Principal variation of the last completed iteration.
    pub pv: PrincipalVariation,
}

impl Default for SearchResult {
    /// A default search result should initialize to a *very bad* value,
    /// since there isn't a move to play.
    #[inline(always)]
    fn default() -> Self {
        Self {
            nodes: 0,
            bestmove: None,
            score: -Score::INF,
            depth: 0,
            pv: PrincipalVariation::EMPTY,
        }
    }
}

/// Configuration variables for executing a search.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Maximum depth to execute the search.
    pub max_depth: i32,

    /// Node allowance.
    ///
    /// If the search exceeds this many nodes, it will exit as quickly as possible.
    pub max_nodes: u64,

    /// Soft and hard time limits.
    pub time: TimeManager,
}

impl SearchConfig {
    /// Constructs a new [`SearchConfig`] from the provided UCI options.
    ///
    /// The side to move of `position` decides whose clock is budgeted.
    pub fn new(options: &UciSearchOptions, position: &Position) -> Self {
        let mut config = Self {
            time: TimeManager::new(options, position.side_to_move()),
            ..Default::default()
        };

        if let Some(depth) = options.depth {
            config.max_depth = (depth as i32).clamp(1, MAX_DEPTH);
        }

        if let Some(nodes) = options.nodes {
            config.max_nodes = nodes as u64;
        }

        config
    }

    /// A search limited only by `depth`.
    #[inline(always)]
    pub fn depth(depth: i32) -> Self {
        Self {
            max_depth: depth.clamp(1, MAX_DEPTH),
            ..Default::default()
        }
    }
}

impl Default for SearchConfig {
    /// A default [`SearchConfig`] will permit an "infinite" search.
    #[inline(always)]
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_nodes: u64::MAX,
            time: TimeManager::infinite(),
        }
    }
}

/// State shared by every thread of a search.
#[derive(Clone)]
pub struct SearchShared {
    pub ttable: Arc<TTable>,
    pub cuckoo: Arc<Cuckoo>,

    /// If this is ever `false`, every thread must exit as soon as possible.
    pub is_searching: Arc<AtomicBool>,

    /// Nodes searched by all threads, updated every few nodes.
    pub nodes: Arc<AtomicU64>,
}

impl SearchShared {
    /// Allocates a transposition table of `hash_size` megabytes.
    pub fn new(hash_size: usize) -> Self {
        Self {
            ttable: Arc::new(TTable::new(hash_size)),
            cuckoo: Arc::new(Cuckoo::new()),
            is_searching: Arc::new(AtomicBool::new(false)),
            nodes: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for SearchShared {
    #[inline(always)]
    fn default() -> Self {
        Self::new(TTable::DEFAULT_SIZE)
    }
}

/// Per-ply state of the search.
#[derive(Debug, Clone, Default)]
struct StackEntry {
    pv: PrincipalVariation,

    /// Move played from this ply.
    mv: Move,

    /// Last quiet move to cause a cutoff at this ply.
    killer: Move,

    /// Move skipped while testing whether the hash move is singular.
    excluded: Move,

    /// Corrected static evaluation, or [`Score::NONE`] when in check.
    eval: Score,

    /// Plies taken off the search of the move played from this ply.
    reduction: i32,

    /// Continuation history key of the move played from this ply.
    cont: Option<ContKey>,
}

/// Late move reductions, indexed by `[depth][moves searched]`.
struct ReductionTable(Box<[[i32; 64]; 64]>);

impl ReductionTable {
    fn new() -> Self {
        let base = tune::lmr_bias!() as f64 / 100.0;
        let coef = tune::lmr_coef!() as f64 / 100.0;

        let mut table = Box::new([[0; 64]; 64]);
        for (depth, row) in table.iter_mut().enumerate().skip(1) {
            for (moves, reduction) in row.iter_mut().enumerate().skip(1) {
                *reduction = (base + (depth as f64).ln() * (moves as f64).ln() * coef) as i32;
            }
        }

        Self(table)
    }

    #[inline(always)]
    fn get(&self, depth: i32, moves: usize) -> i32 {
        self.0[depth.clamp(0, 63) as usize][moves.min(63)]
    }
}

/// A single search thread.
///
/// Owns its own copy of the position, evaluation accumulator, and move ordering heuristics,
/// and talks to its siblings only through [`SearchShared`].
pub struct Searcher {
    /// Thread 0 keeps time and reports results.
    id: usize,

    shared: SearchShared,
    config: SearchConfig,

    position: Position,
    evaluator: Evaluator,
    history: History,
    reductions: ReductionTable,
    stack: Vec<StackEntry>,
    ply: usize,

    /// Nodes searched by this thread.
    nodes: u64,

    /// Portion of `nodes` already added to the shared total.
    flushed: u64,

    seldepth: usize,

    /// Nodes spent below each root move, indexed by the lower 12 bits of the move.
    root_nodes: Box<[u64; 4096]>,
}

impl Searcher {
    /// Creates a new search thread with empty history.
    pub fn new(id: usize, shared: SearchShared) -> Self {
        let position = Position::default();
        Self {
            id,
            shared,
            config: SearchConfig::default(),
            evaluator: Evaluator::new(&position),
            position,
            history: History::new(),
            reductions: ReductionTable::new(),
            stack: vec![StackEntry::default(); MAX_PLY + 2 * STACK_OFFSET],
            ply: 0,
            nodes: 0,
            flushed: 0,
            seldepth: 0,
            root_nodes: Box::new([0; 4096]),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline(always)]
    fn is_main(&self) -> bool {
        self.id == 0
    }

    /// Forgets everything learned from previous searches.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Points this thread at another set of shared state, such as after the hash table was resized.
    pub fn set_shared(&mut self, shared: SearchShared) {
        self.shared = shared;
    }

    /// Runs iterative deepening on `position` until a limit in `config` is reached
    /// or the shared searching flag drops.
    ///
    /// The caller must raise the shared searching flag beforehand. The main thread lowers it when it finishes.
    pub fn search<Log: LogLevel>(&mut self, position: &Position, config: SearchConfig) -> SearchResult {
        self.position = position.clone();
        self.evaluator.reset(position);
        self.config = config;
        self.stack.fill(StackEntry::default());
        self.stack.iter_mut().for_each(|entry| entry.eval = Score::NONE);
        self.ply = 0;
        self.nodes = 0;
        self.flushed = 0;
        self.seldepth = 0;
        self.root_nodes.fill(0);

        if Log::DEBUG && self.is_main() {
            Self::send_debug_config(position, &config);
        }
        log::debug!("thread {} searching {}", self.id, position.to_fen());

        let result = self.iterative_deepening::<Log>();
        self.flush_nodes();

        if self.is_main() {
            if Log::INFO {
                Self::send_response(UciResponse::BestMove {
                    bestmove: result.bestmove,
                    ponder: None,
                });
            }

            // Search has concluded, alert other thread(s) that we are no longer searching
            self.stop();
        }

        result
    }

    fn send_debug_config(position: &Position, config: &SearchConfig) {
        Self::send_string(format!("Starting search on {:?}", position.to_fen()));

        if let Some(soft) = config.time.soft_timeout() {
            Self::send_string(format!("Soft timeout := {}ms", soft.as_millis()));
        }
        if let Some(hard) = config.time.hard_timeout() {
            Self::send_string(format!("Hard timeout := {}ms", hard.as_millis()));
        }
        if config.max_nodes < u64::MAX {
            Self::send_string(format!("Max nodes := {} nodes", config.max_nodes));
        }
        if config.max_depth < MAX_DEPTH {
            Self::send_string(format!("Max depth := {}", config.max_depth));
        }
    }

    /// Sends a [`UciResponse`] to `stdout`.
    #[inline(always)]
    fn send_response<T: fmt::Display>(response: UciResponse<T>) {
        println!("{response}");
    }

    /// Helper to send a [`UciInfo`] containing only a `string` message to `stdout`.
    #[inline(always)]
    fn send_string<T: fmt::Display>(string: T) {
        Self::send_info(UciInfo::new().string(string));
    }

    /// Sends a [`UciInfo`] to `stdout`.
    #[inline(always)]
    fn send_info(info: UciInfo) {
        Self::send_response(UciResponse::<String>::Info(Box::new(info)));
    }

    /// Sends UCI info about a completed iteration.
    fn send_iteration_info(&self, result: &SearchResult) {
        let elapsed = self.config.time.elapsed();
        let millis = elapsed.as_millis();
        let nodes = self.total_nodes();

        Self::send_info(
            UciInfo::new()
                .depth(result.depth)
                .seldepth(self.seldepth)
                .score(result.score.into_uci())
                .nodes(nodes)
                .nps((nodes as u128 * 1000 / millis.max(1)) as u64)
                .hashfull(self.shared.ttable.hashfull())
                .time(millis)
                .pv(result.pv.moves().iter().map(|mv| mv.to_string())),
        );
    }

    /// Performs [iterative deepening](https://www.chessprogramming.org/Iterative_Deepening) (ID) on the root position.
    ///
    /// After each iteration, the main thread checks the soft time limit, which stretches while the best move
    /// keeps changing and shrinks while it holds most of the nodes.
    fn iterative_deepening<Log: LogLevel>(&mut self) -> SearchResult {
        // Initialize `bestmove` to the first move available
        let mut result = SearchResult {
            bestmove: self.position.legal_moves().first().copied(),
            ..Default::default()
        };

        // Nothing to search: checkmate or stalemate
        if result.bestmove.is_none() {
            result.score = if self.position.in_check() {
                Score::mated_in(0)
            } else {
                Score::DRAW
            };
            return result;
        }

        let mut stability = 0;

        /****************************************************************************************************
         * Iterative Deepening: https://www.chessprogramming.org/Iterative_Deepening
         ****************************************************************************************************/
        for depth in 1..=self.config.max_depth {
            self.seldepth = 0;

            let score = self.aspiration_window(depth, result.score);

            // An unfinished iteration is discarded in favor of the last completed one
            if self.stopped() {
                log::debug!("thread {} cancelled during depth {depth}", self.id);
                break;
            }

            let pv = &self.stack[STACK_OFFSET].pv;
            let bestmove = pv.first().or(result.bestmove);

            if bestmove == result.bestmove {
                stability += 1;
            } else {
                stability = 0;
            }

            result.pv = pv.clone();
            result.bestmove = bestmove;
            result.score = score;
            result.depth = depth;

            if !self.is_main() {
                continue;
            }

            self.flush_nodes();

            if Log::INFO {
                self.send_iteration_info(&result);
            }

            // Avoids searching too shallow
            if depth < tune::min_aspiration_window_depth!() {
                continue;
            }

            let best_nodes = bestmove.map_or(0, |mv| self.root_nodes[Self::root_index(mv)]);
            if self.config.time.is_over_soft(best_nodes, self.nodes, stability) {
                break;
            }
        }

        result.nodes = self.nodes;
        result
    }

    /****************************************************************************************************
     * Aspiration Windows: https://www.chessprogramming.org/Aspiration_Windows
     ****************************************************************************************************/
    fn aspiration_window(&mut self, depth: i32, previous: Score) -> Score {
        let mut window = AspirationWindow::new(previous, depth);
        let mut search_depth = depth;

        loop {
            let score = self.pvsearch::<RootNode>(window.bounds, search_depth, false);

            if self.stopped() {
                return score;
            }

            if window.fails_low(score) {
                window.widen_down(score);
                search_depth = depth;
            } else if window.fails_high(score) {
                window.widen_up(score);
                search_depth = (search_depth - 1).max(depth - 3).max(1);
            } else {
                return score;
            }
        }
    }

    /// Primary location of search logic.
    ///
    /// A [principal variation search](https://www.chessprogramming.org/Principal_Variation_Search)
    /// in a [fail soft](https://www.chessprogramming.org/Alpha-Beta#Negamax_Framework) framework.
    ///
    /// `cut_node` is `true` when this node is expected to fail high.
    fn pvsearch<Node: NodeType>(&mut self, mut bounds: SearchBounds, mut depth: i32, cut_node: bool) -> Score {
        let ply = self.ply;
        self.frame_mut(0).pv.clear();

        /****************************************************************************************************
         * Upcoming repetition: https://www.chessprogramming.org/Repetitions#Cuckoo_Tables
         *
         * If the side to move can force a repetition, this node is worth at least a draw.
         ****************************************************************************************************/
        if !Node::ROOT
            && bounds.alpha < Score::DRAW
            && self.position.has_upcoming_repetition(&self.shared.cuckoo, ply)
        {
            bounds.alpha = Score::DRAW;
            if bounds.alpha >= bounds.beta {
                return bounds.alpha;
            }
        }

        /****************************************************************************************************
         * Quiescence Search: https://www.chessprogramming.org/Quiescence_Search
         ****************************************************************************************************/
        if depth <= 0 {
            return self.qsearch::<Node>(bounds);
        }

        if self.should_stop() {
            return Score::DRAW;
        }

        self.nodes += 1;
        self.seldepth = self.seldepth.max(ply);

        let in_check = self.position.in_check();

        // Guards against runaway extensions
        if ply >= MAX_PLY {
            return if in_check { Score::DRAW } else { self.evaluate() };
        }

        if !Node::ROOT {
            if self.position.is_draw(ply) {
                return Score::DRAW;
            }

            /****************************************************************************************************
             * Mate Distance Pruning: https://www.chessprogramming.org/Mate_Distance_Pruning
             ****************************************************************************************************/
            bounds.alpha = bounds.alpha.max(Score::mated_in(ply));
            bounds.beta = bounds.beta.min(Score::mate_in(ply + 1));
            if bounds.alpha >= bounds.beta {
                return bounds.alpha;
            }
        }

        /****************************************************************************************************
         * TT Cutoffs: https://www.chessprogramming.org/Transposition_Table#Transposition_Table_Cutoffs
         ****************************************************************************************************/
        let key = self.position.key();
        let excluded = self.frame(0).excluded;
        let singular = excluded.is_some();

        let (entry, slot) = self.shared.ttable.get(key);
        let entry = entry.filter(|_| !singular);

        let tt_move = entry.map_or(Move::NULL, |entry| entry.mv());
        let tt_score = entry.map_or(Score::NONE, |entry| entry.score(ply));
        let tt_bound = entry.map_or(Bound::None, |entry| entry.bound());
        let tt_pv = Node::PV || entry.is_some_and(|entry| entry.is_pv());

        if let Some(entry) = entry {
            if !Node::PV
                && tt_score.is_some()
                && entry.depth() >= depth
                && self.position.halfmove() < 90
                && tt_bound.cuts(tt_score, bounds.alpha, bounds.beta)
            {
                return tt_score;
            }
        }

        self.frame_mut(1).killer = Move::NULL;

        /****************************************************************************************************
         * Static evaluation
         ****************************************************************************************************/
        let mut raw_eval = Score::NONE;
        let mut static_eval = Score::NONE;
        let mut eval = Score::NONE;

        if !in_check {
            raw_eval = match entry {
                Some(entry) if entry.eval().is_some() => entry.eval(),
                _ => self.evaluate(),
            };
            static_eval = self.history.corrected(&self.position, raw_eval);
            eval = static_eval;

            // The search result is a better guess than the static evaluation
            if tt_score.is_some() && tt_bound.cuts(tt_score, bounds.alpha, bounds.beta) {
                eval = tt_score;
            }

            if entry.is_none() && !singular {
                self.shared.ttable.set(
                    slot,
                    key,
                    Move::NULL,
                    Score::NONE,
                    raw_eval,
                    depth,
                    tt_pv,
                    Bound::None,
                    ply,
                );
            }
        }

        self.frame_mut(0).eval = static_eval;

        let two_back = self.frame_back(2).eval;
        let improving = !in_check && two_back.is_some() && static_eval > two_back;

        /****************************************************************************************************
         * Whole-node pruning
         ****************************************************************************************************/
        if !in_check && !singular {
            // Hindsight extension: the parent reduced this node a lot, but it turned out better for us than expected
            let parent = self.frame_back(1);
            if parent.reduction >= tune::hindsight_reduction!()
                && parent.eval.is_some()
                && static_eval + parent.eval <= Score::DRAW
            {
                depth += 1;
            }

            if !Node::PV {
                /****************************************************************************************************
                 * Razoring: https://www.chessprogramming.org/Razoring
                 ****************************************************************************************************/
                if eval + tune::razor_coef!() * depth <= bounds.alpha {
                    let score = self.qsearch::<NonPvNode>(bounds.null_alpha());
                    if score <= bounds.alpha {
                        return score;
                    }
                }

                /****************************************************************************************************
                 * Reverse Futility Pruning: https://www.chessprogramming.org/Reverse_Futility_Pruning
                 ****************************************************************************************************/
                if depth <= tune::max_rfp_depth!()
                    && eval < Score::MATE_FOUND
                    && eval - tune::rfp_coef!() * (depth - improving as i32) >= bounds.beta
                {
                    return eval;
                }

                /****************************************************************************************************
                 * Null Move Pruning: https://www.chessprogramming.org/Null_Move_Pruning
                 ****************************************************************************************************/
                if depth >= tune::min_nmp_depth!()
                    && eval >= bounds.beta
                    && self.frame_back(1).mv.is_some()
                    && self.position.has_non_pawn(self.position.side_to_move())
                {
                    let reduction = tune::nmp_reduction!()
                        + depth / tune::nmp_depth_divisor!()
                        + ((eval - bounds.beta).0 / tune::nmp_eval_divisor!()).min(tune::nmp_eval_max!());

                    self.make_null();
                    let score = -self.pvsearch::<NonPvNode>(-bounds.null_beta(), depth - reduction, !cut_node);
                    self.unmake_null();

                    if self.stopped() {
                        return Score::DRAW;
                    }

                    // Don't return a mate score that the null move made up
                    if score >= bounds.beta {
                        return if score.is_mate() { bounds.beta } else { score };
                    }
                }
            }
        }

        /****************************************************************************************************
         * Internal Iterative Reductions: https://www.chessprogramming.org/Internal_Iterative_Reductions
         ****************************************************************************************************/
        if tt_move.is_null() && (Node::PV || cut_node) && depth >= tune::min_iir_depth!() {
            depth -= 1;
        }

        /****************************************************************************************************
         * Primary move loop
         ****************************************************************************************************/
        let conts = self.conts();
        let killer = self.frame(0).killer;
        let mut picker = MovePicker::new(tt_move, killer);

        let original_alpha = bounds.alpha;
        let mut best = -Score::INF;
        let mut bestmove = Move::NULL;
        let mut legal = 0;
        let mut quiets_tried = MoveList::new();
        let mut noisy_tried = MoveList::new();

        while let Some(mv) = picker.next(&self.position, &self.history, &conts) {
            if mv == excluded || !self.position.is_legal(mv) {
                continue;
            }

            legal += 1;

            let is_quiet = self.position.is_quiet(mv);
            let (history_score, divisor) = if is_quiet {
                let score = self.history.quiet_score(&self.position, &conts, mv);
                (score, tune::lmr_quiet_history_divisor!())
            } else {
                let score = self.history.noisy_score(&self.position, mv);
                (score, tune::lmr_noisy_history_divisor!())
            };

            let mut reduction = self.reductions.get(depth, legal) - history_score / divisor;
            let lmr_depth = (depth - 1 - reduction).max(0);

            /****************************************************************************************************
             * Move pruning
             ****************************************************************************************************/
            if !Node::ROOT && best > -Score::MATE_FOUND {
                // Late Move Pruning: https://www.chessprogramming.org/Futility_Pruning#MoveCountBasedPruning
                let lmp_threshold = (tune::lmp_base!() + depth * depth) / (2 - improving as i32);
                if legal as i32 >= lmp_threshold {
                    picker.skip_quiets();
                }

                // Futility Pruning: https://www.chessprogramming.org/Futility_Pruning
                if is_quiet
                    && !in_check
                    && lmr_depth <= tune::max_fp_depth!()
                    && static_eval + tune::fp_coef!() * lmr_depth + tune::fp_bias!() <= bounds.alpha
                {
                    picker.skip_quiets();
                    continue;
                }

                // SEE pruning, for moves not already expected to be good
                if mv != tt_move && mv != killer {
                    let threshold = if is_quiet {
                        tune::see_quiet_coef!() * lmr_depth
                    } else {
                        tune::see_noisy_coef!() * depth * depth
                    };

                    if !see(&self.position, mv, threshold) {
                        continue;
                    }
                }
            }

            /****************************************************************************************************
             * Singular Extensions: https://www.chessprogramming.org/Singular_Extensions
             ****************************************************************************************************/
            let mut extension = 0;

            if let Some(entry) = entry {
                if !Node::ROOT
                    && mv == tt_move
                    && depth >= tune::min_se_depth!()
                    && entry.depth() >= depth - 3
                    && matches!(tt_bound, Bound::Lower | Bound::Exact)
                    && tt_score.is_some()
                    && !tt_score.is_mate()
                {
                    let singular_beta = tt_score - depth;
                    let singular_depth = (depth - 1) / 2;

                    self.frame_mut(0).excluded = mv;
                    let score = self.pvsearch::<NonPvNode>(
                        SearchBounds::new(singular_beta - 1, singular_beta),
                        singular_depth,
                        cut_node,
                    );
                    self.frame_mut(0).excluded = Move::NULL;

                    if self.stopped() {
                        return Score::DRAW;
                    }

                    if score < singular_beta {
                        extension = 1;
                        if !Node::PV && score < singular_beta - tune::se_double_margin!() {
                            extension = 2;
                            if is_quiet && score < singular_beta - tune::se_triple_margin!() {
                                extension = 3;
                            }
                        }
                    } else if singular_beta >= bounds.beta {
                        // Multicut: even without the hash move, this node fails high
                        return singular_beta;
                    } else if cut_node {
                        extension = -2;
                    } else if tt_score >= bounds.beta {
                        extension = -1;
                    }
                }
            }

            let new_depth = depth - 1 + extension;
            let nodes_before = self.nodes;

            self.make_move(mv);
            let gives_check = self.position.in_check();
            let mut score = -Score::INF;

            /****************************************************************************************************
             * Late Move Reductions: https://www.chessprogramming.org/Late_Move_Reductions
             ****************************************************************************************************/
            if legal > 1 + 2 * Node::ROOT as usize && depth >= tune::min_lmr_depth!() && (is_quiet || !tt_pv) {
                reduction += !Node::PV as i32;
                reduction += cut_node as i32;
                reduction -= gives_check as i32;
                reduction -= (mv == killer) as i32;
                reduction -= improving as i32;

                let reduced = (new_depth - reduction).clamp(1, new_depth + 1);

                self.frame_back_mut(1).reduction = new_depth - reduced;
                score = -self.pvsearch::<NonPvNode>(-bounds.null_alpha(), reduced, true);
                self.frame_back_mut(1).reduction = 0;

                if score > bounds.alpha && reduced < new_depth {
                    score = -self.pvsearch::<NonPvNode>(-bounds.null_alpha(), new_depth, !cut_node);
                }
            } else if !Node::PV || legal > 1 {
                // Scouts with null window for non-PV moves
                score = -self.pvsearch::<NonPvNode>(-bounds.null_alpha(), new_depth, !cut_node);
            }

            /****************************************************************************************************
             * Principal Variation Search: https://en.wikipedia.org/wiki/Principal_variation_search#Pseudocode
             ****************************************************************************************************/
            if Node::PV && (legal == 1 || score > bounds.alpha) {
                score = -self.pvsearch::<PvNode>(-bounds, new_depth, false);
            }

            self.unmake_move(mv);

            if Node::ROOT {
                self.root_nodes[Self::root_index(mv)] += self.nodes - nodes_before;
            }

            if self.stopped() {
                return Score::DRAW;
            }

            /****************************************************************************************************
             * Score evaluation & bounds adjustments
             ****************************************************************************************************/
            if score > best {
                best = score;
                bestmove = mv;

                // PV found
                if score > bounds.alpha {
                    bounds.alpha = score;

                    if Node::PV {
                        self.extend_pv(mv);
                    }
                }
            }

            // Fail high
            if score >= bounds.beta {
                /****************************************************************************************************
                 * History Heuristic: https://www.chessprogramming.org/History_Heuristic
                 ****************************************************************************************************/
                if is_quiet {
                    self.history
                        .reward_quiet(&self.position, &conts, mv, &quiets_tried, depth);
                    self.frame_mut(0).killer = mv;
                }

                let noisy_best = (!is_quiet).then_some(mv);
                self.history
                    .reward_noisy(&self.position, noisy_best, &noisy_tried, depth);

                break;
            }

            if is_quiet {
                quiets_tried.push(mv);
            } else {
                noisy_tried.push(mv);
            }
        }

        // If there are no legal moves, it's either mate or a draw.
        if legal == 0 {
            return if singular {
                bounds.alpha
            } else if in_check {
                Score::mated_in(ply)
            } else {
                Score::DRAW
            };
        }

        let bound = Bound::new(best, original_alpha, bounds.beta);

        /****************************************************************************************************
         * Correction history
         *
         * Only learn from results whose bound says which side of the static eval the truth lies on.
         ****************************************************************************************************/
        if !in_check
            && !singular
            && (bestmove.is_null() || self.position.is_quiet(bestmove))
            && !(bound == Bound::Lower && best <= static_eval)
            && !(bound == Bound::Upper && best >= static_eval)
        {
            self.history
                .update_correction(&self.position, depth, best, static_eval);
        }

        if !singular {
            self.shared
                .ttable
                .set(slot, key, bestmove, best, raw_eval, depth, tt_pv, bound, ply);
        }

        best
    }

    /// Searches only captures and promotions (and every move while in check) until the position is quiet.
    fn qsearch<Node: NodeType>(&mut self, mut bounds: SearchBounds) -> Score {
        let ply = self.ply;
        self.frame_mut(0).pv.clear();

        if self.should_stop() {
            return Score::DRAW;
        }

        self.nodes += 1;
        self.seldepth = self.seldepth.max(ply);

        if self.position.is_draw(ply) {
            return Score::DRAW;
        }

        let in_check = self.position.in_check();

        if ply >= MAX_PLY {
            return if in_check { Score::DRAW } else { self.evaluate() };
        }

        let key = self.position.key();
        let (entry, slot) = self.shared.ttable.get(key);

        let tt_move = entry.map_or(Move::NULL, |entry| entry.mv());
        let tt_score = entry.map_or(Score::NONE, |entry| entry.score(ply));
        let tt_bound = entry.map_or(Bound::None, |entry| entry.bound());
        let tt_pv = Node::PV || entry.is_some_and(|entry| entry.is_pv());

        if !Node::PV && tt_score.is_some() && tt_bound.cuts(tt_score, bounds.alpha, bounds.beta) {
            return tt_score;
        }

        let mut raw_eval = Score::NONE;
        let mut static_eval = Score::NONE;
        let mut best = -Score::INF;

        /****************************************************************************************************
         * Standing pat: the side to move can usually do at least as well as the static evaluation
         ****************************************************************************************************/
        if !in_check {
            raw_eval = match entry {
                Some(entry) if entry.eval().is_some() => entry.eval(),
                _ => self.evaluate(),
            };
            static_eval = self.history.corrected(&self.position, raw_eval);

            let mut eval = static_eval;
            if tt_score.is_some() && tt_bound.cuts(tt_score, bounds.alpha, bounds.beta) {
                eval = tt_score;
            }

            if entry.is_none() {
                self.shared.ttable.set(
                    slot,
                    key,
                    Move::NULL,
                    Score::NONE,
                    raw_eval,
                    0,
                    tt_pv,
                    Bound::None,
                    ply,
                );
            }

            if eval >= bounds.beta {
                return eval;
            }

            best = eval;
            bounds.alpha = bounds.alpha.max(eval);
        }

        let conts = self.conts();
        let mut picker = MovePicker::new_qsearch(tt_move, in_check);
        let futility = static_eval + tune::qs_fp_margin!();

        let original_alpha = bounds.alpha;
        let mut bestmove = Move::NULL;
        let mut legal = 0;

        while let Some(mv) = picker.next(&self.position, &self.history, &conts) {
            if !self.position.is_legal(mv) {
                continue;
            }

            legal += 1;

            if !in_check {
                // Everything left loses material
                if picker.stage() == Stage::NoisyBad {
                    break;
                }

                if best > -Score::MATE_FOUND {
                    // Futility Pruning: this capture must win material to be worth anything
                    if futility <= bounds.alpha && !see(&self.position, mv, 1) {
                        best = best.max(futility);
                        continue;
                    }

                    if !see(&self.position, mv, tune::see_qsearch_threshold!()) {
                        continue;
                    }
                }
            }

            self.make_move(mv);
            let score = -self.qsearch::<Node>(-bounds);
            self.unmake_move(mv);

            if self.stopped() {
                return Score::DRAW;
            }

            if score > best {
                best = score;
                bestmove = mv;

                if score > bounds.alpha {
                    bounds.alpha = score;

                    if Node::PV {
                        self.extend_pv(mv);
                    }
                }
            }

            if score >= bounds.beta {
                break;
            }
        }

        if legal == 0 && in_check {
            return Score::mated_in(ply);
        }

        let bound = Bound::new(best, original_alpha, bounds.beta);
        self.shared
            .ttable
            .set(slot, key, bestmove, best, raw_eval, 0, tt_pv, bound, ply);

        best
    }

    #[inline(always)]
    fn evaluate(&self) -> Score {
        self.evaluator.evaluate(&self.position)
    }

    /// Stack entry at `ply + offset`.
    #[inline(always)]
    fn frame(&self, offset: usize) -> &StackEntry {
        &self.stack[self.ply + STACK_OFFSET + offset]
    }

    #[inline(always)]
    fn frame_mut(&mut self, offset: usize) -> &mut StackEntry {
        &mut self.stack[self.ply + STACK_OFFSET + offset]
    }

    /// Stack entry at `ply - back`.
    #[inline(always)]
    fn frame_back(&self, back: usize) -> &StackEntry {
        &self.stack[self.ply + STACK_OFFSET - back]
    }

    #[inline(always)]
    fn frame_back_mut(&mut self, back: usize) -> &mut StackEntry {
        &mut self.stack[self.ply + STACK_OFFSET - back]
    }

    /// Continuation history keys of the moves 1, 2, and 4 plies ago.
    #[inline(always)]
    fn conts(&self) -> [Option<ContKey>; 3] {
        CONT_OFFSETS.map(|back| self.frame_back(back).cont)
    }

    /// Sets this ply's PV to `mv` followed by the child's PV.
    #[inline(always)]
    fn extend_pv(&mut self, mv: Move) {
        let index = self.ply + STACK_OFFSET;
        let (parents, children) = self.stack.split_at_mut(index + 1);
        parents[index].pv.extend(mv, &children[0].pv);
    }

    #[inline(always)]
    fn root_index(mv: Move) -> usize {
        (mv.bits() & 0xFFF) as usize
    }

    fn make_move(&mut self, mv: Move) {
        let piece = self.position.moved_piece(mv);
        let frame = self.frame_mut(0);
        frame.mv = mv;
        frame.cont = piece.map(|piece| (piece, mv.to()));

        self.evaluator.on_make(&self.position, mv);
        self.position.make(mv);
        self.ply += 1;

        self.shared.ttable.prefetch(self.position.key());
    }

    fn unmake_move(&mut self, mv: Move) {
        self.ply -= 1;
        self.position.unmake(mv);
        self.evaluator.on_unmake();
    }

    fn make_null(&mut self) {
        let frame = self.frame_mut(0);
        frame.mv = Move::NULL;
        frame.cont = None;

        self.evaluator.on_make_null();
        self.position.make_null();
        self.ply += 1;
    }

    fn unmake_null(&mut self) {
        self.ply -= 1;
        self.position.unmake_null();
        self.evaluator.on_unmake();
    }

    /// Returns `true` if the search has been told to stop.
    #[inline(always)]
    fn stopped(&self) -> bool {
        !self.shared.is_searching.load(Ordering::Relaxed)
    }

    /// Tells every thread to stop.
    #[inline(always)]
    fn stop(&self) {
        self.shared.is_searching.store(false, Ordering::Relaxed);
    }

    /// Nodes searched by every thread so far.
    #[inline(always)]
    fn total_nodes(&self) -> u64 {
        self.shared.nodes.load(Ordering::Relaxed) + self.nodes - self.flushed
    }

    #[inline(always)]
    fn flush_nodes(&mut self) {
        self.shared
            .nodes
            .fetch_add(self.nodes - self.flushed, Ordering::Relaxed);
        self.flushed = self.nodes;
    }

    /// Enforces the node and time limits, returning `true` if the search must stop.
    fn should_stop(&mut self) -> bool {
        if self.nodes % NODE_FLUSH_INTERVAL == 0 {
            self.flush_nodes();
        }

        if self.is_main() {
            let out_of_time = self.nodes % TIME_CHECK_INTERVAL == 0 && self.config.time.is_over_hard();
            let out_of_nodes = self.total_nodes() >= self.config.max_nodes;

            if out_of_time || out_of_nodes {
                self.stop();
            }
        }

        self.stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MoveKind, PieceKind, Square, FEN_KIWIPETE, FEN_STARTPOS};

    fn run(fen: &str, config: SearchConfig) -> SearchResult {
        let position = Position::from_fen(fen).unwrap();
        let shared = SearchShared::new(8);
        shared.is_searching.store(true, Ordering::Relaxed);
        Searcher::new(0, shared).search::<LogNone>(&position, config)
    }

    fn mates(fen: &str, mv: Move) -> bool {
        let mut position = Position::from_fen(fen).unwrap();
        position.make(mv);
        position.in_check() && position.legal_moves().is_empty()
    }

    #[test]
    fn test_mate_in_one() {
        let fen = "k7/8/KQ6/8/8/8/8/8 w - - 0 1";
        let result = run(fen, SearchConfig::depth(4));

        assert_eq!(result.score, Score::mate_in(1));
        assert_eq!(result.score.moves_to_mate(), 1);
        assert!(mates(fen, result.bestmove.unwrap()), "{:?} does not mate", result.bestmove);
    }

    #[test]
    fn test_getting_mated() {
        let result = run("1k6/8/KQ6/2Q5/8/8/8/8 b - - 0 1", SearchConfig::depth(4));

        assert_eq!(result.score, Score::mated_in(2));
        assert_eq!(result.score.moves_to_mate(), -1);
        assert_eq!(result.bestmove, Some(Move::new(Square::B8, Square::A8, MoveKind::Normal)));
    }

    #[test]
    fn test_no_legal_moves() {
        let stalemate = run("k7/8/KQ6/8/8/8/8/8 b - - 0 1", SearchConfig::depth(3));
        assert_eq!(stalemate.bestmove, None);
        assert_eq!(stalemate.score, Score::DRAW);

        let checkmate = run("k7/1Q6/K7/8/8/8/8/8 b - - 0 1", SearchConfig::depth(3));
        assert_eq!(checkmate.bestmove, None);
        assert_eq!(checkmate.score, Score::mated_in(0));
    }

    #[test]
    fn test_wins_material() {
        let result = run("3q1n2/4P3/8/8/8/8/k7/7K w - - 0 1", SearchConfig::depth(5));
        assert_eq!(
            result.bestmove,
            Some(Move::new_promotion(Square::E7, Square::D8, PieceKind::Queen))
        );
        assert!(result.score > Score(500));
    }

    #[test]
    fn test_depth_limit_and_pv() {
        let result = run(FEN_KIWIPETE, SearchConfig::depth(5));
        assert_eq!(result.depth, 5);
        assert_eq!(result.pv.first(), result.bestmove);
        assert!(result.nodes > 0);

        // Every move of the PV must be legal in sequence
        let mut position = Position::from_fen(FEN_KIWIPETE).unwrap();
        for &mv in result.pv.moves() {
            assert!(position.legal_moves().contains(&mv), "{mv} is illegal in {}", position.to_fen());
            position.make(mv);
        }
    }

    #[test]
    fn test_node_limit() {
        let config = SearchConfig {
            max_nodes: 5_000,
            ..Default::default()
        };
        let result = run(FEN_STARTPOS, config);

        assert!(result.bestmove.is_some());
        assert!(result.nodes < 5_000 + TIME_CHECK_INTERVAL);
    }

    #[test]
    fn test_stopped_search_plays_a_legal_move() {
        let position = Position::default();
        let shared = SearchShared::new(1);

        // Never raised, so the search stops immediately
        let result = Searcher::new(0, shared).search::<LogNone>(&position, SearchConfig::depth(10));
        assert_eq!(result.depth, 0);
        assert!(position.legal_moves().contains(&result.bestmove.unwrap()));
    }

    #[test]
    fn test_bare_kings_are_drawn() {
        let result = run("8/8/8/4k3/8/8/8/4K3 w - - 0 1", SearchConfig::depth(6));
        assert!(result.bestmove.is_some());
        assert_eq!(result.score, Score::DRAW);
    }

    #[test]
    fn test_aspiration_window() {
        let mut window = AspirationWindow::new(Score(50), 1);
        assert_eq!(window.bounds, SearchBounds::default());

        window = AspirationWindow::new(Score(50), 6);
        assert_eq!(window.bounds, SearchBounds::new(Score(25), Score(75)));
        assert!(window.fails_low(Score(25)));
        assert!(window.fails_high(Score(75)));
        assert!(!window.fails_low(Score(26)) && !window.fails_high(Score(74)));

        window.widen_down(Score(0));
        assert_eq!(window.bounds, SearchBounds::new(Score(-25), Score(50)));
        assert_eq!(window.delta, Score(37));

        window.widen_up(Score(60));
        assert_eq!(window.bounds.beta, Score(97));

        let mate = AspirationWindow::new(Score::mate_in(3), 10);
        assert_eq!(mate.bounds, SearchBounds::default());
    }

    #[test]
    fn test_reduction_table() {
        let table = ReductionTable::new();
        assert_eq!(table.get(1, 1), 0);
        assert!(table.get(10, 30) > table.get(3, 3));
        assert_eq!(table.get(500, 500), table.get(63, 63));
    }
}
