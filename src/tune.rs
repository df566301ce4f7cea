/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/*
 * Time management
 */

/// Number of moves assumed to remain in the game when `movestogo` was not given.
macro_rules! default_moves_to_go {
    () => {
        45
    };
}
pub(crate) use default_moves_to_go;

/// Extra moves added to `movestogo` so the last move before a time control isn't rushed.
macro_rules! moves_to_go_buffer {
    () => {
        5
    };
}
pub(crate) use moves_to_go_buffer;

/// Divisor for computing how much of the time increment to use.
macro_rules! time_inc_divisor {
    () => {
        2
    };
}
pub(crate) use time_inc_divisor;

/// Divisor for computing the hard timeout of a search.
macro_rules! hard_timeout_divisor {
    () => {
        2
    };
}
pub(crate) use hard_timeout_divisor;

/// Soft limit scale, in percent, when none of the nodes went to the best move.
macro_rules! node_tm_base {
    () => {
        150
    };
}
pub(crate) use node_tm_base;

/// How much the share of nodes spent on the best move shrinks the soft limit, in percent.
macro_rules! node_tm_coef {
    () => {
        100
    };
}
pub(crate) use node_tm_coef;

/// Soft limit scale, in percent, indexed by how many iterations in a row kept the same best move.
macro_rules! stability_tm_scales {
    () => {
        [250, 120, 90, 80, 75]
    };
}
pub(crate) use stability_tm_scales;

/*
 * Aspiration windows
 */

/// Initial Aspiration Window size
macro_rules! initial_aspiration_window_delta {
    () => {
        25
    };
}
pub(crate) use initial_aspiration_window_delta;

/// Minimum depth to incorporate Aspiration Windows into the Iterative Deepening search.
macro_rules! min_aspiration_window_depth {
    () => {
        4
    };
}
pub(crate) use min_aspiration_window_depth;

/*
 * Whole-node pruning
 */

/// Razoring margin per ply of depth.
macro_rules! razor_coef {
    () => {
        292
    };
}
pub(crate) use razor_coef;

/// Maximum depth at which to apply reverse futility pruning.
macro_rules! max_rfp_depth {
    () => {
        8
    };
}
pub(crate) use max_rfp_depth;

/// Reverse futility margin per ply of depth.
macro_rules! rfp_coef {
    () => {
        69
    };
}
pub(crate) use rfp_coef;

/// Minimum depth at which null move pruning can be applied.
macro_rules! min_nmp_depth {
    () => {
        3
    };
}
pub(crate) use min_nmp_depth;

/// Base value to subtract from `depth` when applying null move pruning.
macro_rules! nmp_reduction {
    () => {
        4
    };
}
pub(crate) use nmp_reduction;

/// Every this many plies of depth add one ply to the null move reduction.
macro_rules! nmp_depth_divisor {
    () => {
        5
    };
}
pub(crate) use nmp_depth_divisor;

/// Every this many centipawns of eval above beta add one ply to the null move reduction.
macro_rules! nmp_eval_divisor {
    () => {
        160
    };
}
pub(crate) use nmp_eval_divisor;

/// Cap on the eval-based part of the null move reduction.
macro_rules! nmp_eval_max {
    () => {
        3
    };
}
pub(crate) use nmp_eval_max;

/// Minimum reduction of the previous ply that allows a hindsight extension.
macro_rules! hindsight_reduction {
    () => {
        3
    };
}
pub(crate) use hindsight_reduction;

/// Minimum depth at which internal iterative reduction applies.
macro_rules! min_iir_depth {
    () => {
        4
    };
}
pub(crate) use min_iir_depth;

/*
 * Move loop pruning
 */

/// Base of the late move pruning threshold.
macro_rules! lmp_base {
    () => {
        3
    };
}
pub(crate) use lmp_base;

/// Maximum reduced depth at which futility pruning applies.
macro_rules! max_fp_depth {
    () => {
        10
    };
}
pub(crate) use max_fp_depth;

/// Futility margin per ply of reduced depth.
macro_rules! fp_coef {
    () => {
        88
    };
}
pub(crate) use fp_coef;

/// Constant part of the futility margin.
macro_rules! fp_bias {
    () => {
        79
    };
}
pub(crate) use fp_bias;

/// Futility margin for captures in quiescence search.
macro_rules! qs_fp_margin {
    () => {
        129
    };
}
pub(crate) use qs_fp_margin;

/// SEE threshold per ply of reduced depth for quiet moves.
macro_rules! see_quiet_coef {
    () => {
        -76
    };
}
pub(crate) use see_quiet_coef;

/// SEE threshold per squared ply of depth for noisy moves.
macro_rules! see_noisy_coef {
    () => {
        -15
    };
}
pub(crate) use see_noisy_coef;

/// SEE threshold for captures in quiescence search.
macro_rules! see_qsearch_threshold {
    () => {
        0
    };
}
pub(crate) use see_qsearch_threshold;

/*
 * Late move reductions
 */

/// Minimum depth at which late move reductions apply.
macro_rules! min_lmr_depth {
    () => {
        3
    };
}
pub(crate) use min_lmr_depth;

/// Scale of `ln(depth) * ln(moves)` in the reduction table, in hundredths.
macro_rules! lmr_coef {
    () => {
        40
    };
}
pub(crate) use lmr_coef;

/// Constant part of the reduction table, in hundredths.
macro_rules! lmr_bias {
    () => {
        80
    };
}
pub(crate) use lmr_bias;

/// History score worth one ply of reduction for quiet moves.
macro_rules! lmr_quiet_history_divisor {
    () => {
        8192
    };
}
pub(crate) use lmr_quiet_history_divisor;

/// History score worth one ply of reduction for noisy moves.
macro_rules! lmr_noisy_history_divisor {
    () => {
        5800
    };
}
pub(crate) use lmr_noisy_history_divisor;

/*
 * Singular extensions
 */

/// Minimum depth at which singular extensions are tried.
macro_rules! min_se_depth {
    () => {
        8
    };
}
pub(crate) use min_se_depth;

/// Margin below the singular beta that earns a double extension.
macro_rules! se_double_margin {
    () => {
        16
    };
}
pub(crate) use se_double_margin;

/// Margin below the singular beta that earns a triple extension for quiet moves.
macro_rules! se_triple_margin {
    () => {
        100
    };
}
pub(crate) use se_triple_margin;

/*
 * History
 */

/// Maximum absolute value of any history entry.
macro_rules! max_history {
    () => {
        16_384
    };
}
pub(crate) use max_history;

/// Value to multiply depth by when computing history bonuses.
macro_rules! history_bonus_coef {
    () => {
        178
    };
}
pub(crate) use history_bonus_coef;

/// Constant part of history bonuses.
macro_rules! history_bonus_bias {
    () => {
        -50
    };
}
pub(crate) use history_bonus_bias;

/// Largest history bonus.
macro_rules! history_bonus_max {
    () => {
        1500
    };
}
pub(crate) use history_bonus_max;

/// Value to multiply depth by when computing history maluses.
macro_rules! history_malus_coef {
    () => {
        150
    };
}
pub(crate) use history_malus_coef;

/// Constant part of history maluses.
macro_rules! history_malus_bias {
    () => {
        -50
    };
}
pub(crate) use history_malus_bias;

/// Largest history malus.
macro_rules! history_malus_max {
    () => {
        1000
    };
}
pub(crate) use history_malus_max;

/// Maximum absolute value of any correction history entry.
macro_rules! max_correction {
    () => {
        1024
    };
}
pub(crate) use max_correction;

/// Weight of the pawn correction, out of 512.
macro_rules! pawn_correction_weight {
    () => {
        64
    };
}
pub(crate) use pawn_correction_weight;

/// Weight of each non-pawn correction, out of 512.
macro_rules! non_pawn_correction_weight {
    () => {
        32
    };
}
pub(crate) use non_pawn_correction_weight;
