/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::str::FromStr;

use newt::{Engine, EngineCommand};

fn main() {
    let mut engine = Engine::new();

    // Anything passed on the command line is forwarded to the engine as a
    // command, so things like `newt fen` or `newt perft 5` work from a shell.
    let args = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !args.is_empty() {
        match EngineCommand::from_str(&args) {
            Ok(cmd) => engine.send_command(cmd),
            Err(e) => eprintln!("{e}"),
        }
    }

    if let Err(e) = engine.run() {
        eprintln!("{} encountered an error: {e}", env!("CARGO_PKG_NAME"));
    }
}
