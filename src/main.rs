/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use clap::{error::ErrorKind, Parser};
use env_logger::Env;
use newt::{Engine, EngineCommand};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let mut engine = Engine::new();

    // Skip the executable name
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    // Commands given on the command line are parsed greedily: the longest run of arguments that
    // forms a command wins, and parsing resumes after it.
    let mut arg_idx = args.len();
    let mut parsed_idx = 0;
    while parsed_idx < arg_idx {
        let slice = &args[parsed_idx..arg_idx];

        match EngineCommand::try_parse_from(slice) {
            Ok(cmd) => {
                if let Err(e) = engine.send_command(cmd) {
                    log::error!("{e:#}");
                }
                parsed_idx = arg_idx;
                arg_idx = args.len();
            }

            // Edge case: `--help` and `--version` are both "error" cases according to Clap
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                println!("{e}");
                parsed_idx = arg_idx;
                arg_idx = args.len();
            }

            Err(e) => {
                if arg_idx - parsed_idx == 1 {
                    log::error!("Skipping unrecognized argument {:?}:\n{e}", slice[0]);
                    parsed_idx += 1;
                    arg_idx = args.len();
                } else {
                    arg_idx -= 1;
                }
            }
        }
    }

    // Commands on the command line run to completion, then the engine exits
    if !args.is_empty() {
        if let Err(e) = engine.send_command(EngineCommand::Exit { cleanup: true }) {
            log::error!("{e:#}");
        }
    }

    engine.run();
}
