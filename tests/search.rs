/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use chessie::Game;
use newt::{Search, SearchConfig, SearchError};

fn run_search(fen: &str, config: SearchConfig) -> Result<newt::SearchResult, SearchError> {
    let game: Game = fen.parse().unwrap();
    let is_searching = Arc::new(AtomicBool::new(true));

    Search::new(&game, is_searching, config).start()
}

#[test]
fn search_finds_backrank_mate_in_1() {
    let config = SearchConfig {
        budget: Duration::from_millis(1000),
        ..Default::default()
    };

    let res = run_search("7k/8/6K1/8/8/8/8/R7 w - - 0 1", config).unwrap();
    assert_eq!(res.bestmove.map(|mv| mv.to_string()), Some("a1a8".into()));
}

#[test]
fn search_on_startpos_yields_a_legal_move() {
    let config = SearchConfig {
        max_iterations: 500,
        ..Default::default()
    };

    let game = Game::default();
    let res = run_search(&game.to_fen(), config).unwrap();

    let bestmove = res.bestmove.expect("a move must be found on startpos");
    assert!(
        game.get_legal_moves().into_iter().any(|mv| mv == bestmove),
        "{bestmove} is not legal on the starting position"
    );
    assert_eq!(res.iterations, 500);
}

#[test]
fn search_refuses_finished_games() {
    // Stalemate; the side to move has no legal continuation.
    let res = run_search("k7/8/KQ6/8/8/8/8/8 b - - 0 1", SearchConfig::default());
    assert_eq!(res.unwrap_err(), SearchError::NoLegalMoveFound);

    // Checkmate likewise.
    let res = run_search("R6k/6pp/8/8/8/8/8/K7 b - - 0 1", SearchConfig::default());
    assert_eq!(res.unwrap_err(), SearchError::NoLegalMoveFound);
}

#[test]
fn search_respects_the_iteration_allowance() {
    let config = SearchConfig {
        max_iterations: 32,
        ..Default::default()
    };

    let res = run_search("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 0 1", config)
        .unwrap();
    assert_eq!(res.iterations, 32);
    assert!(res.bestmove.is_some());
}
