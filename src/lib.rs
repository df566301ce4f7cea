/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Board representation, move generation, and perft.
mod board;

/// Commands the engine understands beyond the UCI protocol.
mod cli;

/// Code related to the engine's functionality, such as user input handling.
mod engine;

/// Evaluation of chess positions.
mod eval;

/// Move ordering statistics learned during search.
mod history;

/// Staged move generation for the search.
mod movepicker;

/// Piece-square tables.
mod psqt;

/// Search scores, including mate scores.
mod score;

/// Main engine logic; all search related code.
mod search;

/// Static exchange evaluation.
mod see;

/// Lazy SMP thread pool.
mod threads;

/// Time management.
mod time;

/// Transposition table shared by every search thread.
mod ttable;

/// Tunable search parameters.
mod tune;

pub use board::*;
pub use cli::*;
pub use engine::*;
pub use eval::*;
pub use history::*;
pub use movepicker::*;
pub use psqt::*;
pub use score::*;
pub use search::*;
pub use see::*;
pub use threads::*;
pub use time::*;
pub use ttable::*;
