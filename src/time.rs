/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::time::{Duration, Instant};

use uci_parser::UciSearchOptions;

use crate::{tune, Color};

/// Decides how long a search may run.
///
/// The hard limit may interrupt an iteration at any node. The soft limit is only consulted
/// between iterations, scaled by how settled the best move looks.
#[derive(Debug, Clone, Copy)]
pub struct TimeManager {
    /// Start time of the search.
    starttime: Instant,

    /// Time after which no new iteration should begin.
    soft_timeout: Option<Duration>,

    /// Time after which the search must stop immediately.
    hard_timeout: Option<Duration>,
}

impl TimeManager {
    /// A search that only ends when told to, or when it runs out of depth or nodes.
    #[inline(always)]
    pub fn infinite() -> Self {
        Self {
            starttime: Instant::now(),
            soft_timeout: None,
            hard_timeout: None,
        }
    }

    /// A search of exactly `movetime`.
    #[inline(always)]
    pub fn fixed(movetime: Duration) -> Self {
        Self {
            starttime: Instant::now(),
            soft_timeout: Some(movetime),
            hard_timeout: Some(movetime),
        }
    }

    /// Budgets a share of the clock of `color`.
    ///
    /// The soft limit spreads what remains (minus this move's increment) over the moves left
    /// until the next time control, then adds half the increment. The hard limit is half the clock.
    ///
    /// # Example
    /// ```
    /// # use std::time::Duration;
    /// # use newt::{Color, TimeManager};
    /// # use uci_parser::UciCommand;
    /// let Ok(UciCommand::Go(options)) = UciCommand::new("go wtime 50000 winc 1000") else {
    ///     panic!("expected a go command");
    /// };
    /// let time = TimeManager::new(&options, Color::White);
    /// assert_eq!(time.soft_timeout(), Some(Duration::from_millis(49_000 / 50 + 500)));
    /// assert_eq!(time.hard_timeout(), Some(Duration::from_millis(25_000)));
    /// ```
    pub fn new(options: &UciSearchOptions, color: Color) -> Self {
        if options.infinite {
            return Self::infinite();
        }

        if let Some(movetime) = options.movetime {
            return Self::fixed(movetime);
        }

        let (remaining, increment) = match color {
            Color::White => (options.wtime, options.winc),
            Color::Black => (options.btime, options.binc),
        };

        // Only calculate timeouts if a time was provided
        let Some(remaining) = remaining else {
            return Self::infinite();
        };
        let increment = increment.unwrap_or(Duration::ZERO);

        let moves_to_go = options.movestogo.map_or(tune::default_moves_to_go!(), |n| n as u32) + tune::moves_to_go_buffer!();
        let soft = remaining.saturating_sub(increment) / moves_to_go + increment / tune::time_inc_divisor!();
        let hard = remaining / tune::hard_timeout_divisor!();

        Self {
            starttime: Instant::now(),
            soft_timeout: Some(soft.min(hard)),
            hard_timeout: Some(hard),
        }
    }

    /// Time elapsed since the search started.
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.starttime.elapsed()
    }

    #[inline(always)]
    pub fn soft_timeout(&self) -> Option<Duration> {
        self.soft_timeout
    }

    #[inline(always)]
    pub fn hard_timeout(&self) -> Option<Duration> {
        self.hard_timeout
    }

    /// Returns `true` if the search must stop now.
    #[inline(always)]
    pub fn is_over_hard(&self) -> bool {
        self.hard_timeout.is_some_and(|hard| self.elapsed() >= hard)
    }

    /// Returns `true` if no new iteration should begin.
    ///
    /// The soft limit grows when few of the nodes went to the best move, or when the best move keeps changing.
    /// `stability` counts the consecutive iterations that kept the same best move.
    pub fn is_over_soft(&self, best_move_nodes: u64, total_nodes: u64, stability: usize) -> bool {
        let Some(soft) = self.soft_timeout else {
            return false;
        };

        let share = best_move_nodes as f64 / total_nodes.max(1) as f64;
        let node_scale = (tune::node_tm_base!() as f64 - tune::node_tm_coef!() as f64 * share) / 100.0;

        let scales = tune::stability_tm_scales!();
        let stability_scale = scales[stability.min(scales.len() - 1)] as f64 / 100.0;

        let scaled = soft.mul_f64(node_scale * stability_scale);
        let limit = self.hard_timeout.map_or(scaled, |hard| scaled.min(hard));

        self.elapsed() >= limit
    }
}

impl Default for TimeManager {
    #[inline(always)]
    fn default() -> Self {
        Self::infinite()
    }
}

#[cfg(test)]
mod tests {
    use uci_parser::UciCommand;

    use super::*;

    fn go(args: &str) -> UciSearchOptions {
        let Ok(UciCommand::Go(options)) = UciCommand::new(&format!("go {args}")) else {
            panic!("failed to parse go {args}");
        };
        options
    }

    #[test]
    fn test_clock_budget() {
        let time = TimeManager::new(&go("wtime 100000 winc 0 btime 0"), Color::White);
        assert_eq!(time.soft_timeout(), Some(Duration::from_millis(2_000)));
        assert_eq!(time.hard_timeout(), Some(Duration::from_millis(50_000)));

        let time = TimeManager::new(&go("wtime 10000 winc 0 btime 0 movestogo 5"), Color::White);
        assert_eq!(time.soft_timeout(), Some(Duration::from_millis(1_000)));

        // Black has no time left
        let time = TimeManager::new(&go("wtime 100000 winc 0 btime 0"), Color::Black);
        assert_eq!(time.hard_timeout(), Some(Duration::ZERO));
        assert!(time.is_over_hard());
    }

    #[test]
    fn test_increment_larger_than_clock() {
        let time = TimeManager::new(&go("wtime 500 winc 2000 btime 0"), Color::White);
        assert_eq!(time.hard_timeout(), Some(Duration::from_millis(250)));
        assert!(time.soft_timeout() <= time.hard_timeout());
    }

    #[test]
    fn test_unbounded_searches() {
        let time = TimeManager::new(&go("wtime 1 btime 1 infinite"), Color::White);
        assert!(!time.is_over_hard());
        assert!(!time.is_over_soft(0, 0, 0));

        let time = TimeManager::new(&go("depth 5"), Color::White);
        assert_eq!(time.soft_timeout(), None);
        assert_eq!(time.hard_timeout(), None);
    }

    #[test]
    fn test_movetime() {
        let time = TimeManager::new(&go("wtime 100000 btime 100000 movetime 1234"), Color::White);
        assert_eq!(time.soft_timeout(), Some(Duration::from_millis(1234)));
        assert_eq!(time.hard_timeout(), Some(Duration::from_millis(1234)));
    }

    #[test]
    fn test_stability_extends_soft_limit() {
        let time = TimeManager::fixed(Duration::ZERO);
        assert!(time.is_over_soft(100, 100, 4));

        let mut time = TimeManager::infinite();
        time.soft_timeout = Some(Duration::from_secs(3600));
        assert!(!time.is_over_soft(100, 100, 4));

        // A stable best move that took every node shrinks the limit to 0.5 * 0.75 of the soft limit
        time.soft_timeout = Some(Duration::from_millis(10));
        time.starttime = Instant::now() - Duration::from_millis(5);
        assert!(time.is_over_soft(100, 100, 4));
        assert!(!time.is_over_soft(0, 100, 0));
    }
}
