/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Custom commands understood by the engine, beyond the UCI protocol.
mod cli;

/// Code related to the engine's functionality, such as user input handling.
mod engine;

/// Evaluation of chess positions.
mod eval;

/// Piece-Square tables for positional evaluation.
mod psqt;

/// The score type shared by evaluation and search.
mod score;

/// Main engine logic; all search related code.
mod search;

/// The Monte Carlo search tree.
mod tree;

/// Tunable constants.
mod tune;

pub use cli::*;
pub use engine::*;
pub use eval::*;
pub use psqt::*;
pub use score::*;
pub use search::*;
pub use tree::*;
