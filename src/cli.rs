/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::str::FromStr;

use clap::Parser;
use uci_parser::UciCommand;

/// A command to be sent to the engine.
///
/// These are the engine's own commands. Anything the UCI protocol defines arrives as [`EngineCommand::Uci`].
#[derive(Debug, Clone, Parser)]
#[command(
    multicall = true,
    about,
    rename_all = "lower",
    override_usage("<ENGINE COMMAND> | <UCI COMMAND>")
)]
pub enum EngineCommand {
    /// Search a fixed set of positions and report the total nodes and speed.
    Bench {
        /// Override the default benchmark depth.
        depth: Option<i32>,

        /// If set, the benchmarking results will be printed in a well-formatted table.
        #[arg(short, long, default_value = "false")]
        pretty: bool,
    },

    /// Print a visual representation of the current board state.
    #[command(alias = "d")]
    Display,

    /// Print an evaluation of the current position.
    Eval {
        /// If set, every piece's contribution will be printed on the board.
        #[arg(short, long, default_value = "false")]
        pretty: bool,
    },

    /// Quit the engine.
    Exit {
        /// If set, the engine will await the completion of any search threads before exiting.
        #[arg(short, long, default_value = "false")]
        cleanup: bool,
    },

    /// Generate and print a FEN string for the current position.
    Fen,

    /// Performs a perft on the current position at the supplied depth, printing total node count.
    Perft { depth: usize },

    /// Performs a split perft on the current position at the supplied depth.
    #[command(alias = "sperft")]
    Splitperft { depth: usize },

    /// Wrapper over UCI commands sent to the engine.
    #[command(skip)]
    Uci { cmd: UciCommand },

    /// Await the current search, blocking until it completes.
    ///
    /// This is primarily used when executing searches on startup,
    /// to await their results before doing something else.
    Wait,
}

impl FromStr for EngineCommand {
    type Err = clap::Error;

    /// Attempt to parse an [`EngineCommand`] from a string.
    ///
    /// If this fails, it will attempt to parse the string as a [`UciCommand`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::try_parse_from(s.split_ascii_whitespace()) {
            Ok(cmd) => Ok(cmd),
            Err(e) => match UciCommand::new(s) {
                Ok(cmd) => Ok(Self::Uci { cmd }),
                Err(_) => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> EngineCommand {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_engine_commands() {
        assert!(matches!(parse("bench"), EngineCommand::Bench { depth: None, pretty: false }));
        assert!(matches!(parse("bench 5 --pretty"), EngineCommand::Bench { depth: Some(5), pretty: true }));
        assert!(matches!(parse("d"), EngineCommand::Display));
        assert!(matches!(parse("sperft 3"), EngineCommand::Splitperft { depth: 3 }));
        assert!(matches!(parse("exit"), EngineCommand::Exit { cleanup: false }));
        assert!("perft".parse::<EngineCommand>().is_err());
        assert!("perft x".parse::<EngineCommand>().is_err());
    }

    #[test]
    fn test_falls_back_to_uci() {
        assert!(matches!(parse("isready"), EngineCommand::Uci { cmd: UciCommand::IsReady }));
        assert!(matches!(
            parse("go depth 3"),
            EngineCommand::Uci { cmd: UciCommand::Go(options) } if options.depth.is_some()
        ));
        assert!(matches!(
            parse("position startpos moves e2e4"),
            EngineCommand::Uci { cmd: UciCommand::Position { fen: None, .. } }
        ));
        assert!("frobnicate".parse::<EngineCommand>().is_err());
    }
}
