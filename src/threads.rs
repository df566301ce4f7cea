/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    sync::{atomic::Ordering, Arc},
    thread::{self, JoinHandle},
};

use crate::{LogLevel, LogNone, Position, SearchConfig, SearchResult, SearchShared, Searcher, TTable};

/// A pool of search threads that share one transposition table.
///
/// Every thread searches the same root independently; they only help each other through the
/// transposition table ([Lazy SMP](https://www.chessprogramming.org/Lazy_SMP)).
/// Thread 0 keeps time and reports to the GUI.
pub struct SearchThreads {
    shared: SearchShared,

    /// Threads waiting for a search, ordered by id.
    idle: Vec<Box<Searcher>>,

    /// Threads currently searching. Each hands itself back when joined.
    running: Vec<JoinHandle<(Box<Searcher>, SearchResult)>>,

    /// Number of threads the pool should have.
    count: usize,
}

impl SearchThreads {
    /// Maximum number of threads.
    pub const MAX_COUNT: usize = 256;

    /// Creates `count` threads sharing a transposition table of `hash_size` megabytes.
    pub fn new(count: usize, hash_size: usize) -> Self {
        let shared = SearchShared::new(hash_size);
        let count = count.clamp(1, Self::MAX_COUNT);
        let idle = (0..count)
            .map(|id| Box::new(Searcher::new(id, shared.clone())))
            .collect();

        Self {
            shared,
            idle,
            running: Vec::new(),
            count,
        }
    }

    /// Number of threads in the pool.
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns `true` while a search is in progress.
    #[inline(always)]
    pub fn is_searching(&self) -> bool {
        self.shared.is_searching.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn ttable(&self) -> &TTable {
        &self.shared.ttable
    }

    /// Nodes searched by every thread during the most recent search.
    #[inline(always)]
    pub fn nodes(&self) -> u64 {
        self.shared.nodes.load(Ordering::Relaxed)
    }

    /// Starts searching `position` on every thread, returning `false` if a search is already running.
    ///
    /// The main thread reports at `Log` level; helper threads never print.
    pub fn start<Log: LogLevel + 'static>(&mut self, position: &Position, config: SearchConfig) -> bool {
        if self.is_searching() {
            return false;
        }

        // Collect the threads of a search that ended on its own
        self.wait();

        self.shared.ttable.update();
        self.shared.nodes.store(0, Ordering::Relaxed);
        self.shared.is_searching.store(true, Ordering::Relaxed);

        for mut searcher in self.idle.drain(..) {
            let position = position.clone();

            let handle = thread::spawn(move || {
                let result = if searcher.id() == 0 {
                    searcher.search::<Log>(&position, config)
                } else {
                    searcher.search::<LogNone>(&position, config)
                };
                (searcher, result)
            });

            self.running.push(handle);
        }

        true
    }

    /// Tells every thread to stop and waits for them, returning the main thread's result.
    pub fn stop(&mut self) -> Option<SearchResult> {
        self.shared.is_searching.store(false, Ordering::Relaxed);
        self.wait()
    }

    /// Waits for the current search to end on its own, returning the main thread's result.
    ///
    /// Returns `None` if nothing was searching.
    pub fn wait(&mut self) -> Option<SearchResult> {
        let mut main = None;

        for handle in self.running.drain(..) {
            match handle.join() {
                Ok((searcher, result)) => {
                    if searcher.id() == 0 {
                        main = Some(result);
                    }
                    self.idle.push(searcher);
                }
                Err(_) => log::error!("A search thread panicked"),
            }
        }

        // The main thread lowers the flag when it finishes, but a panicking one never does
        self.shared.is_searching.store(false, Ordering::Relaxed);
        self.idle.sort_by_key(|searcher| searcher.id());
        self.replace_lost();

        main
    }

    /// Replaces any thread that was lost to a panic.
    fn replace_lost(&mut self) {
        if self.idle.len() == self.count {
            return;
        }

        for id in 0..self.count {
            if self.idle.get(id).map(|searcher| searcher.id()) != Some(id) {
                log::warn!("Restarting search thread {id}");
                self.idle.insert(id, Box::new(Searcher::new(id, self.shared.clone())));
            }
        }
    }

    /// Changes the number of threads, stopping any search in progress.
    ///
    /// New threads start with empty history.
    pub fn set_count(&mut self, count: usize) {
        self.stop();

        self.count = count.clamp(1, Self::MAX_COUNT);
        self.idle.truncate(self.count);
        for id in self.idle.len()..self.count {
            self.idle.push(Box::new(Searcher::new(id, self.shared.clone())));
        }
    }

    /// Replaces the transposition table with an empty one of `size` megabytes, stopping any search in progress.
    pub fn resize_hash(&mut self, size: usize) {
        self.stop();

        // Nothing else holds the table once every thread has let go of it
        for searcher in self.idle.iter_mut() {
            searcher.set_shared(SearchShared {
                ttable: Arc::new(TTable::from_capacity(1)),
                ..self.shared.clone()
            });
        }

        match Arc::get_mut(&mut self.shared.ttable) {
            Some(ttable) => ttable.resize(size),
            None => self.shared.ttable = Arc::new(TTable::new(size)),
        }

        for searcher in self.idle.iter_mut() {
            searcher.set_shared(self.shared.clone());
        }
    }

    /// Forgets everything learned so far: the transposition table and every thread's history.
    pub fn clear(&mut self) {
        self.stop();

        self.shared.ttable.clear();
        for searcher in self.idle.iter_mut() {
            searcher.clear();
        }
    }
}

impl Default for SearchThreads {
    #[inline(always)]
    fn default() -> Self {
        Self::new(1, TTable::DEFAULT_SIZE)
    }
}

impl Drop for SearchThreads {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FEN_KIWIPETE, MAX_DEPTH};

    #[test]
    fn test_helpers_agree_on_a_legal_move() {
        let position = Position::from_fen(FEN_KIWIPETE).unwrap();
        let mut threads = SearchThreads::new(4, 8);

        assert!(threads.start::<LogNone>(&position, SearchConfig::depth(6)));
        let result = threads.wait().unwrap();

        assert_eq!(result.depth, 6);
        assert!(position.legal_moves().contains(&result.bestmove.unwrap()));
        assert!(threads.nodes() >= result.nodes);
        assert!(!threads.is_searching());
        assert_eq!(threads.count(), 4);
    }

    #[test]
    fn test_stop_interrupts_search() {
        let position = Position::default();
        let mut threads = SearchThreads::new(2, 1);

        assert!(threads.start::<LogNone>(&position, SearchConfig::default()));
        assert!(!threads.start::<LogNone>(&position, SearchConfig::default()), "only one search at a time");

        let result = threads.stop().unwrap();
        assert!(result.depth < MAX_DEPTH);
        assert!(result.bestmove.is_some());
        assert!(threads.stop().is_none());
    }

    #[test]
    fn test_reconfigure() {
        let position = Position::default();
        let mut threads = SearchThreads::default();

        threads.set_count(3);
        assert_eq!(threads.count(), 3);
        threads.resize_hash(2);
        assert_eq!(threads.ttable().size(), 2);

        assert!(threads.start::<LogNone>(&position, SearchConfig::depth(7)));
        assert!(threads.wait().is_some());
        assert!(threads.ttable().hashfull() > 0);

        threads.clear();
        assert_eq!(threads.ttable().hashfull(), 0);

        threads.set_count(1);
        assert_eq!(threads.count(), 1);
    }
}
