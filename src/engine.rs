/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    io::{self, Write},
    ops::ControlFlow,
    sync::mpsc::{channel, Receiver, Sender},
    thread,
    time::Instant,
};

use anyhow::{bail, Context, Result};
use uci_parser::{UciCommand, UciInfo, UciOption, UciParseError, UciResponse, UciSearchOptions};

use crate::{
    evaluate, perft, splitperft, EngineCommand, EvalTrace, LogDebug, LogInfo, LogNone, Move, Position, SearchConfig,
    SearchThreads, TTable,
};

/// Default depth at which to run the benchmark searches.
pub const BENCH_DEPTH: i32 = 9;

/// Positions searched by `bench`, covering openings, middlegames, and endgames.
pub const BENCHMARK_FENS: [&str; 16] = [
    "r3k2r/2pb1ppp/2pp1q2/p7/1nP1B3/1P2P3/P2N1PPP/R2QK2R w KQkq a6 0 14",
    "4rrk1/2p1b1p1/p1p3q1/4p3/2P2n1p/1P1NR2P/PB3PP1/3R1QK1 b - - 2 24",
    "r3qbrk/6p1/2b2pPp/p3pP1Q/PpPpP2P/3P1B2/2PB3K/R5R1 w - - 16 42",
    "6k1/1R3p2/6p1/2Bp3p/3P2q1/P7/1P2rQ1K/5R2 b - - 4 44",
    "8/8/1p2k1p1/3p3p/1p1P1P1P/1P2PK2/8/8 w - - 3 54",
    "7r/2p3k1/1p1p1qp1/1P1Bp3/p1P2r1P/P7/4R3/Q4RK1 w - - 0 36",
    "r1bq1rk1/pp2b1pp/n1pp1n2/3P1p2/2P1p3/2N1P2N/PP2BPPP/R1BQ1RK1 b - - 2 10",
    "3r3k/2r4p/1p1b3q/p4P2/P2Pp3/1B2P3/3BQ1RP/6K1 w - - 3 87",
    "2r4r/1p4k1/1Pnp4/3Qb1pq/8/4BpPp/5P2/2RR1BK1 w - - 0 42",
    "4q1bk/6b1/7p/p1p4p/PNPpP2P/KN4P1/3Q4/4R3 b - - 0 37",
    "2q3r1/1r2pk2/pp3pp1/2pP3p/P1Pb1BbP/1P4Q1/R3NPP1/4R1K1 w - - 2 34",
    "1r2r2k/1b4q1/pp5p/2pPp1p1/P3Pn2/1P1B1Q1P/2R3P1/4BR1K b - - 1 37",
    "r3kbbr/pp1n1p1P/3ppnp1/q5N1/1P1pP3/P1N1B3/2P1QP2/R3KB1R b KQkq b3 0 17",
    "8/6pk/2b1Rp2/3r4/1R1B2PP/P5K1/8/2r5 b - - 16 42",
    "1r4k1/4ppb1/2n1b1qp/pB4p1/1n1BP1P1/7P/2PNQPK1/3RN3 w - - 8 29",
    "8/8/8/8/5kp1/P7/8/1K1N4 w - - 0 1",
];

/// The newt chess engine.
pub struct Engine {
    /// The position to search, set by `position` and reset by `ucinewgame`.
    position: Position,

    /// One half of a channel, responsible for sending commands to the engine to execute.
    sender: Sender<EngineCommand>,

    /// One half of a channel, responsible for receiving commands for the engine to execute.
    receiver: Receiver<EngineCommand>,

    /// Search threads, and the transposition table they share.
    threads: SearchThreads,

    /// Whether to display extra information during execution.
    debug: bool,
}

impl Engine {
    /// Constructs a new [`Engine`] instance to be executed with [`Engine::run`].
    #[inline(always)]
    pub fn new() -> Self {
        let (sender, receiver) = channel();

        Self {
            position: Position::default(),
            sender,
            receiver,
            threads: SearchThreads::default(),
            debug: false,
        }
    }

    /// Returns a string of the engine's name and current version.
    #[inline(always)]
    pub fn name(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// Returns a string of all authors of this engine.
    #[inline(always)]
    pub fn authors(&self) -> String {
        // Split multiple authors by comma-space
        env!("CARGO_PKG_AUTHORS").replace(':', ", ")
    }

    /// The position the next search will start from.
    #[inline(always)]
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Sends an [`EngineCommand`] to the engine to be executed.
    #[inline(always)]
    pub fn send_command(&self, command: EngineCommand) -> Result<()> {
        self.sender
            .send(command)
            .context("Failed to send a command to the engine")
    }

    /// Entrypoint of the engine.
    ///
    /// This function first spawns a new thread that handles user input from `stdin`.
    /// It then loops on commands received by the engine, executing them in the order received,
    /// until told to exit.
    pub fn run(&mut self) {
        let sender = self.sender.clone();
        thread::spawn(|| {
            if let Err(err) = input_handler(sender) {
                log::warn!("Input handler thread stopping: {err:#}");
            }
        });

        while let Ok(cmd) = self.receiver.recv() {
            if self.execute(cmd).is_break() {
                break;
            }
        }
    }

    /// Executes a single [`EngineCommand`], returning [`ControlFlow::Break`] if the engine should exit.
    pub fn execute(&mut self, cmd: EngineCommand) -> ControlFlow<()> {
        log::debug!("Received command {cmd:?}");

        match cmd {
            EngineCommand::Bench { depth, pretty } => self.bench(depth, pretty),

            EngineCommand::Display => println!("{}", self.position),

            EngineCommand::Eval { pretty } => self.eval(pretty),

            EngineCommand::Exit { cleanup } => {
                if cleanup {
                    self.threads.wait();
                } else {
                    self.threads.stop();
                }

                return ControlFlow::Break(());
            }

            EngineCommand::Fen => println!("{}", self.position.to_fen()),

            EngineCommand::Perft { depth } => println!("{}", perft(&mut self.position.clone(), depth)),

            EngineCommand::Splitperft { depth } => println!("\n{}", splitperft(&mut self.position.clone(), depth)),

            EngineCommand::Uci { cmd } => match self.handle_uci_command(cmd) {
                Ok(flow) => return flow,
                // UCI states to continue execution if an error occurs
                Err(e) => log::error!("{e:#}"),
            },

            EngineCommand::Wait => _ = self.threads.wait(),
        }

        ControlFlow::Continue(())
    }

    /// Handle the execution of a single [`UciCommand`].
    fn handle_uci_command(&mut self, uci: UciCommand) -> Result<ControlFlow<()>> {
        use UciCommand::*;
        match uci {
            Uci => self.uci(),

            Debug(status) => self.debug = status,

            IsReady => println!("{}", UciResponse::<&str>::ReadyOk),

            SetOption { name, value } => self.set_option(&name, value)?,

            Register { name: _, code: _ } => println!("{} requires no registration", self.name()),

            UciNewGame => self.new_game(),

            UciCommand::Position { fen, moves } => self.position = self.parse_position(fen.as_deref(), &moves)?,

            Go(options) => self.go(&options)?,

            Stop => _ = self.threads.stop(),

            PonderHit => log::debug!("Ignoring ponderhit; pondering is not supported"),

            Quit => {
                self.threads.stop();
                return Ok(ControlFlow::Break(()));
            }

            _ => bail!("{} does not support UCI command {uci:?}", self.name()),
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Starts a search of the current position, or a split perft if `go perft` was requested.
    fn go(&mut self, options: &UciSearchOptions) -> Result<()> {
        if let Some(depth) = options.perft {
            println!("\n{}", splitperft(&mut self.position.clone(), depth as usize));
            return Ok(());
        }

        let config = SearchConfig::new(options, &self.position);
        let started = if self.debug {
            self.threads.start::<LogDebug>(&self.position, config)
        } else {
            self.threads.start::<LogInfo>(&self.position, config)
        };

        if !started {
            bail!("A search is already running");
        }

        Ok(())
    }

    /// Execute the `bench` command, running a benchmark of a fixed search on a series of positions and displaying the results.
    fn bench(&mut self, depth: Option<i32>, pretty: bool) {
        let config = SearchConfig::depth(depth.unwrap_or(BENCH_DEPTH));
        let benches = BENCHMARK_FENS;
        let mut nodes = 0;

        // Padding for printing FENs
        let width = benches.iter().map(|fen| fen.len()).max().unwrap_or_default();

        println!(
            "Running fixed-depth search (d={}) on {} positions",
            config.max_depth,
            benches.len()
        );

        let start = Instant::now();
        for (i, fen) in benches.into_iter().enumerate() {
            print!("{:>2}/{:>2}: {fen:<width$} := ", i + 1, benches.len());
            // Flush so the node count will appear on the same line after the search concludes
            _ = io::stdout().lock().flush();

            // Each bench is essentially a new game, so reset hash tables, etc.
            self.new_game();
            let position = match Position::from_fen(fen) {
                Ok(position) => position,
                Err(e) => {
                    log::error!("Skipping bench position {fen:?}: {e}");
                    continue;
                }
            };

            self.threads.start::<LogNone>(&position, config);
            if self.threads.wait().is_none() {
                log::error!("Search failed while running benchmarks on fen {fen}");
            }

            nodes += self.threads.nodes();
            println!("{}", self.threads.nodes());
        }

        // Compute results
        let elapsed = start.elapsed();
        let nps = (nodes as f64 / elapsed.as_secs_f64()) as u64;
        let m_nps = nodes as f64 / elapsed.as_secs_f64() / 1_000_000.0;
        let ms = elapsed.as_millis();

        if pretty {
            println!();
            println!("+-- Benchmark Complete --+");
            println!("| time (ms)  {ms:<12}|");
            println!("|     nodes  {nodes:<12}|");
            println!("|       nps  {nps:<12}|");
            println!("|      Mnps  {m_nps:<12.2}|");
            println!("+------------------------+");
        } else {
            println!("{nodes} nodes {nps} nps");
        }

        self.new_game();
    }

    /// Executes the `eval` command, printing an evaluation of the current position.
    fn eval(&self, pretty: bool) {
        if pretty {
            println!("{}", EvalTrace::new(&self.position));
        } else {
            println!("{}", evaluate(&self.position));
        }
    }

    /// Resets the engine's internal game state.
    ///
    /// This cancels any ongoing search and clears the transposition table and every thread's history.
    fn new_game(&mut self) {
        self.threads.clear();
        self.position = Position::default();
    }

    /// Parses the `position` command: the supplied FEN (or the standard startpos), then `moves` applied one-by-one.
    ///
    /// Nothing changes if any part of it is invalid.
    fn parse_position(&self, fen: Option<&str>, moves: &[String]) -> Result<Position> {
        let mut position = match fen {
            Some(fen) => Position::from_fen(fen).with_context(|| format!("Invalid FEN {fen:?}"))?,
            None => Position::default(),
        };

        for mv_str in moves {
            let mv = Move::from_uci(&position, mv_str)
                .with_context(|| format!("Failed to apply move {mv_str:?} to {}", position.to_fen()))?;
            position.make(mv);
        }

        Ok(position)
    }

    /// Called when the engine receives the `uci` command.
    ///
    /// Prints engine's ID, version, and authors, and lists all UCI options.
    fn uci(&self) {
        println!("id name {}\nid author {}\n", self.name(), self.authors());

        // Print all UCI options
        let options: [UciOption<&str>; 3] = [
            UciOption::spin(
                "Hash",
                TTable::DEFAULT_SIZE as i32,
                TTable::MIN_SIZE as i32,
                TTable::MAX_SIZE as i32,
            ),
            UciOption::spin("Threads", 1, 1, SearchThreads::MAX_COUNT as i32),
            UciOption::button("Clear Hash"),
        ];
        for opt in options {
            println!("{}", UciResponse::Option(opt));
        }

        println!("{}", UciResponse::<&str>::UciOk);
    }

    /// Handles the `setoption` command, setting option `name` to `value`, or pressing it if it is a button.
    ///
    /// Will return an error if `name` isn't a valid option or `value` is not a valid value for that option.
    fn set_option(&mut self, name: &str, value: Option<String>) -> Result<()> {
        match name.to_ascii_lowercase().as_str() {
            "clear hash" => self.threads.clear(),

            "hash" => {
                let mb = parse_spin(name, value.as_deref(), TTable::MIN_SIZE, TTable::MAX_SIZE)?;
                self.threads.resize_hash(mb);
            }

            "threads" => {
                let count = parse_spin(name, value.as_deref(), 1, SearchThreads::MAX_COUNT)?;
                self.threads.set_count(count);
            }

            _ => match value.as_ref() {
                Some(value) => bail!("Unrecognized option {name:?} with value {value:?}"),
                None => bail!("Unrecognized option {name:?}"),
            },
        }

        if self.debug {
            let info = match value.as_ref() {
                Some(value) => format!("Option {name} set to {value}"),
                None => format!("Option {name} toggled"),
            };
            println!("{}", UciResponse::<String>::Info(Box::new(UciInfo::new().string(info))));
        }

        Ok(())
    }
}

impl Default for Engine {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

/// Parses the value of a spin option, rejecting anything outside `min..=max`.
fn parse_spin(name: &str, value: Option<&str>, min: usize, max: usize) -> Result<usize> {
    let Some(value) = value else {
        bail!("usage: setoption name {name} value <value>");
    };

    let Ok(parsed) = value.parse::<usize>() else {
        bail!("expected integer for {name}. got {value:?}");
    };

    if !(min..=max).contains(&parsed) {
        bail!("{name} must be within [{min}, {max}]. got {parsed}");
    }

    Ok(parsed)
}

/// Loops endlessly to await input via `stdin`, sending all successfully-parsed commands through the supplied `sender`.
fn input_handler(sender: Sender<EngineCommand>) -> Result<()> {
    let mut buffer = String::with_capacity(2048);

    loop {
        buffer.clear();
        let bytes = io::stdin()
            .read_line(&mut buffer)
            .context("Failed to read line when parsing UCI commands")?;

        // For ctrl + d
        if 0 == bytes {
            sender
                .send(EngineCommand::Exit { cleanup: false })
                .context("Failed to send 'quit' command after receiving empty input")?;

            bail!("Engine received input of 0 bytes and is quitting");
        }

        let buf = buffer.trim();
        if buf.is_empty() {
            continue;
        }

        // Attempt to parse the input as a UCI command first, since that's the primary use case of the engine
        match UciCommand::new(buf) {
            Ok(cmd) => sender
                .send(EngineCommand::Uci { cmd })
                .context("Failed to send UCI command to engine")?,

            // If it's not a UCI command, check if it's an engine-specific command
            Err(UciParseError::UnrecognizedCommand { .. }) => match buf.parse() {
                Ok(cmd) => sender.send(cmd).context("Failed to send command to engine")?,
                Err(err) => err.print()?,
            },

            Err(uci_err) => log::error!("{uci_err}"),
        }
    }
}
