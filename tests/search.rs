/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::time::{Duration, Instant};

use newt::{LogNone, Move, Position, Score, SearchConfig, SearchResult, SearchThreads};
use uci_parser::UciCommand;

fn search(fen: &str, threads: usize, config: SearchConfig) -> SearchResult {
    let position = Position::from_fen(fen).unwrap();
    let mut pool = SearchThreads::new(threads, 16);
    assert!(pool.start::<LogNone>(&position, config));
    let result = pool.wait().unwrap();

    assert!(!pool.is_searching());
    if let Some(bestmove) = result.bestmove {
        assert!(position.legal_moves().contains(&bestmove), "{bestmove} is illegal in {fen}");
    }
    result
}

/// Plays out the principal variation, checking that every move is legal.
fn play_pv(fen: &str, pv: &[Move]) -> Position {
    let mut position = Position::from_fen(fen).unwrap();
    for &mv in pv {
        assert!(position.legal_moves().contains(&mv), "pv move {mv} is illegal in {}", position.to_fen());
        position.make(mv);
    }
    position
}

#[test]
fn test_finds_mate_in_two() {
    let fen = "r2qkb1r/pp2nppp/3p4/2pNN1B1/2BnP3/3P4/PPP2PPP/R2bK2R w KQkq - 1 1";

    for threads in [1, 3] {
        let result = search(fen, threads, SearchConfig::depth(6));
        assert_eq!(result.score, Score::mate_in(3), "with {threads} threads");
        assert_eq!(result.score.moves_to_mate(), 2);

        // The PV ends in checkmate
        let end = play_pv(fen, result.pv.moves());
        assert_eq!(result.pv.moves().len(), 3);
        assert!(end.in_check() && end.legal_moves().is_empty());
    }
}

#[test]
fn test_defends_against_back_rank_mate() {
    // Moving the rook off the first rank allows Rd1#
    let fen = "3r2k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1";
    let result = search(fen, 2, SearchConfig::depth(6));

    assert!(!result.score.is_mate());
    let mut position = Position::from_fen(fen).unwrap();
    position.make(result.bestmove.unwrap());
    let replies = position.legal_moves();
    assert!(replies.iter().all(|&reply| {
        let mut after = position.clone();
        after.make(reply);
        !(after.in_check() && after.legal_moves().is_empty())
    }));
}

#[test]
fn test_go_depth_end_to_end() {
    let UciCommand::Go(options) = UciCommand::new("go depth 5").unwrap() else {
        panic!("expected a go command");
    };

    let position = Position::default();
    let config = SearchConfig::new(&options, &position);
    assert_eq!(config.max_depth, 5);

    let result = search(&position.to_fen(), 2, config);
    assert_eq!(result.depth, 5);
    assert!(!result.pv.is_empty());
    assert_eq!(result.pv.first(), result.bestmove);
    assert!(result.score.0.abs() < 200, "startpos is roughly balanced, got {}", result.score);
    play_pv(&position.to_fen(), result.pv.moves());
}

#[test]
fn test_go_movetime_respects_the_clock() {
    let UciCommand::Go(options) = UciCommand::new("go movetime 200").unwrap() else {
        panic!("expected a go command");
    };

    let position = Position::default();
    let start = Instant::now();
    let result = search(&position.to_fen(), 2, SearchConfig::new(&options, &position));

    assert!(result.bestmove.is_some());
    assert!(start.elapsed() < Duration::from_millis(1_500));
}

#[test]
fn test_go_nodes_limit() {
    let UciCommand::Go(options) = UciCommand::new("go nodes 20000").unwrap() else {
        panic!("expected a go command");
    };

    let position = Position::default();
    let result = search(&position.to_fen(), 1, SearchConfig::new(&options, &position));
    assert!(result.bestmove.is_some());
    assert!(result.nodes < 40_000);
}

#[test]
fn test_fifty_move_rule_draw() {
    // Every reply completes fifty moves without a capture or pawn move
    let fen = "8/8/8/8/8/2k5/8/K1R5 b - - 99 120";
    let result = search(fen, 1, SearchConfig::depth(4));
    assert_eq!(result.score, Score::DRAW);
}
