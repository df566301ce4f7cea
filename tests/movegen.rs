/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use newt::{Color, GenType, Move, Position, ZobristKey, FEN_KIWIPETE, FEN_STARTPOS};
use proptest::prelude::*;

const FENS: [&str; 5] = [
    FEN_STARTPOS,
    FEN_KIWIPETE,
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
];

/// Every move of `gen`, sorted so that lists can be compared.
fn sorted(position: &Position, gen: GenType) -> Vec<Move> {
    let mut moves = position.generate(gen).to_vec();
    moves.sort_by_key(|mv| mv.to_string());
    moves
}

/// Checks every generator invariant that holds in a single position.
fn check_generators(position: &Position) -> Result<(), TestCaseError> {
    let fen = position.to_fen();
    let all = sorted(position, GenType::All);

    // Quiet and noisy moves partition all moves
    let mut parts = sorted(position, GenType::Quiet);
    parts.extend(sorted(position, GenType::Noisy));
    parts.sort_by_key(|mv| mv.to_string());
    prop_assert_eq!(&parts, &all, "quiet + noisy != all in {}", fen);

    for mv in position.generate(GenType::Quiet) {
        prop_assert!(position.is_quiet(mv), "{} generated as quiet in {}", mv, fen);
    }
    for mv in position.generate(GenType::Noisy) {
        prop_assert!(position.is_noisy(mv), "{} generated as noisy in {}", mv, fen);
    }

    // Generated moves are pseudo-legal, and the legal moves are exactly those that pass `is_legal`
    for &mv in &all {
        prop_assert!(position.is_pseudo_legal(mv), "{} not pseudo-legal in {}", mv, fen);
    }
    let legal = all.iter().filter(|&&mv| position.is_legal(mv)).count();
    prop_assert_eq!(legal, position.legal_moves().len());

    Ok(())
}

/// The full key and every partial key of `position`.
fn keys(position: &Position) -> [ZobristKey; 4] {
    [
        position.key(),
        position.pawn_key(),
        position.non_pawn_key(Color::White),
        position.non_pawn_key(Color::Black),
    ]
}

/// Makes and unmakes every legal move, checking that nothing leaks.
fn check_make_unmake(position: &mut Position) -> Result<(), TestCaseError> {
    let fen = position.to_fen();
    let key = position.key();
    let all_keys = keys(position);

    for mv in position.legal_moves() {
        position.make(mv);

        // The incrementally updated key matches the key of the same position parsed from scratch
        let reparsed = Position::from_fen(&position.to_fen()).unwrap();
        prop_assert_eq!(keys(position), keys(&reparsed), "{} from {}", mv, &fen);

        position.unmake(mv);
        prop_assert_eq!(keys(position), all_keys);
        prop_assert_eq!(&position.to_fen(), &fen);
    }

    if !position.in_check() {
        position.make_null();
        prop_assert_ne!(position.key(), key);
        position.unmake_null();
        prop_assert_eq!(position.key(), key);
        prop_assert_eq!(&position.to_fen(), &fen);
    }

    Ok(())
}

#[test]
fn test_fixed_positions() {
    for fen in FENS {
        let mut position = Position::from_fen(fen).unwrap();
        check_generators(&position).unwrap();
        check_make_unmake(&mut position).unwrap();
    }
}

/// Checks every node of the legal game tree below `position`.
fn walk(position: &mut Position, depth: usize) {
    check_generators(position).unwrap();
    check_make_unmake(position).unwrap();

    if depth == 0 {
        return;
    }

    for mv in position.legal_moves() {
        position.make(mv);
        walk(position, depth - 1);
        position.unmake(mv);
    }
}

#[test]
fn test_game_tree_invariants() {
    for fen in FENS {
        walk(&mut Position::from_fen(fen).unwrap(), 2);
    }
}

#[test]
fn test_pseudo_legal_rejects_foreign_moves() {
    // Moves from one position are rarely playable in another; whatever `is_pseudo_legal` accepts must be generated
    for from in FENS {
        let moves = Position::from_fen(from).unwrap().generate(GenType::All);

        for to in FENS {
            let position = Position::from_fen(to).unwrap();
            let generated = position.generate(GenType::All);

            for &mv in &moves {
                assert_eq!(
                    position.is_pseudo_legal(mv),
                    generated.contains(&mv),
                    "{mv} from {from} in {to}"
                );
            }
        }
    }

    assert!(!Position::default().is_pseudo_legal(Move::NULL));
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_random_games_keep_invariants(start in prop::sample::select(FENS.to_vec()), choices in prop::collection::vec(any::<usize>(), 1..40)) {
        let mut position = Position::from_fen(start).unwrap();
        let mut played = Vec::new();

        for choice in choices {
            check_generators(&position)?;

            let moves = position.legal_moves();
            if moves.is_empty() {
                break;
            }

            let mv = moves[choice % moves.len()];
            position.make(mv);
            played.push(mv);
        }

        check_make_unmake(&mut position)?;

        // Unwinding the whole game returns to the start
        while let Some(mv) = played.pop() {
            position.unmake(mv);
        }
        prop_assert_eq!(position.to_fen(), Position::from_fen(start).unwrap().to_fen());
    }
}
