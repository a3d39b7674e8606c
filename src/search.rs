/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use chessie::{Color, Game, Move};
use rand::{rngs::ThreadRng, Rng};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use thiserror::Error;
use uci_parser::{UciInfo, UciResponse, UciSearchOptions};

use crate::{
    evaluate_move, evaluate_terminal, tune, EvalWeights, Evaluator, NodeId, Score, SearchTree,
};

/// Things that can go wrong while searching.
///
/// `InvalidMoveApplied` is the only variant that indicates a bug rather than
/// a property of the position being searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The searched position has no legal moves; the game is already over.
    #[error("cannot search a position with no legal moves")]
    NoLegalMoveFound,

    /// The search concluded without establishing a best move.
    #[error("search concluded without finding a move to play")]
    NoMoveFound,

    /// The move generator and the rules of the game disagree.
    #[error("attempted to apply illegal move {0}")]
    InvalidMoveApplied(Move),
}

/// The result of a search, containing the best move found, score, and statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// Number of completed search iterations (one rollout each).
    pub iterations: u64,

    /// Number of positions visited during rollouts.
    pub nodes: u64,

    /// Best move found during the search.
    pub bestmove: Option<Move>,

    /// Average backpropagated score of `bestmove`.
    pub score: Score,
}

impl Default for SearchResult {
    #[inline(always)]
    fn default() -> Self {
        Self {
            iterations: 0,
            nodes: 0,
            bestmove: None,
            score: Score::ZERO,
        }
    }
}

/// Configuration variables for executing a [`Search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Wall-clock time allotted to the search.
    pub budget: Duration,

    /// Start time of the search.
    pub starttime: Instant,

    /// Iteration allowance.
    ///
    /// If the search completes this many iterations, it will stop and report
    /// its best move.
    pub max_iterations: u64,

    /// Base exploration constant for move selection.
    ///
    /// Higher values favor trying rarely-visited moves over re-visiting
    /// promising ones.
    pub exploration: f64,

    /// Number of plies a rollout may run before it is cut off and statically
    /// evaluated.
    pub rollout_depth: u32,
}

impl SearchConfig {
    /// Constructs a new [`SearchConfig`] from the provided UCI options and game.
    ///
    /// The [`Game`] is used to determine the side to move when computing the
    /// time budget from the clock.
    pub fn new(options: UciSearchOptions, game: &Game) -> Self {
        let mut config = Self::default();

        if let Some(nodes) = options.nodes {
            config.max_iterations = nodes as u64;
        }

        // If `movetime` was supplied, search that long.
        if let Some(movetime) = options.movetime {
            config.budget = movetime;
        } else {
            // Otherwise, budget based on time remaining and increment
            let (time, inc) = if game.side_to_move().is_white() {
                (options.wtime, options.winc)
            } else {
                (options.btime, options.binc)
            };

            if let Some(time) = time {
                // 5% of time remaining + 50% of increment
                config.budget = time / 20 + inc.unwrap_or(Duration::ZERO) / 2;
            }
        }

        config
    }
}

impl Default for SearchConfig {
    /// A default [`SearchConfig`] will permit an "infinite" search.
    ///
    /// The word "infinite" is quoted here because the actual defaults are the `::MAX` values for each field.
    #[inline(always)]
    fn default() -> Self {
        Self {
            budget: Duration::MAX,
            starttime: Instant::now(),
            max_iterations: u64::MAX,
            exploration: tune::exploration_constant!(),
            rollout_depth: tune::max_rollout_depth!(),
        }
    }
}

/// Executes a Monte Carlo Tree Search on the provided game.
///
/// Repeatedly selects a promising leaf, expands it, plays a short random
/// rollout from it, and propagates the outcome back up the tree. Every score
/// in the tree is kept from the perspective of the side to move at the root.
pub struct Search<'a> {
    /// The game to search on.
    ///
    /// This game will be copied when moves are applied to it.
    game: &'a Game,

    /// The side to move at the root, whose interest all scores represent.
    player: Color,

    /// The search tree grown across iterations.
    tree: SearchTree,

    /// Weights used for all static evaluations during this search.
    weights: EvalWeights,

    /// The result of the search, updated as-needed during search.
    result: SearchResult,

    /// An atomic flag to determine if the search should be cancelled at any time.
    ///
    /// If this is ever `false`, the search will exit after the current iteration.
    is_searching: Arc<AtomicBool>,

    /// Configuration variables for this instance of the search.
    config: SearchConfig,

    /// Randomness source for rollouts.
    rng: ThreadRng,
}

impl<'a> Search<'a> {
    /// Construct a new [`Search`] instance to execute on the provided [`Game`].
    pub fn new(game: &'a Game, is_searching: Arc<AtomicBool>, config: SearchConfig) -> Self {
        Self {
            game,
            player: game.side_to_move(),
            tree: SearchTree::new(*game),
            weights: EvalWeights::default(),
            result: SearchResult::default(),
            is_searching,
            config,
            rng: rand::rng(),
        }
    }

    /// Start the search, returning its results if the search was successful.
    ///
    /// This is the entrypoint of the search; it concludes by sending the
    /// `bestmove` message and clearing the search flag.
    pub fn start(mut self) -> Result<SearchResult, SearchError> {
        self.send_info(
            UciInfo::new().string(format!("Starting search on {:?}", self.game.to_fen())),
        );

        let res = self.run();

        // Search has concluded, alert other threads that we are no longer searching
        self.is_searching.store(false, Ordering::Relaxed);

        if let Ok(res) = &res {
            let elapsed = self.config.starttime.elapsed();
            self.send_info(
                UciInfo::new()
                    .nodes(res.nodes)
                    .score(res.score.into_uci())
                    .nps((res.nodes as f32 / elapsed.as_secs_f32()).trunc())
                    .time(elapsed.as_millis())
                    .string(format!("{} iterations", res.iterations)),
            );

            // Search has ended; send bestmove
            let response = UciResponse::BestMove {
                bestmove: res.bestmove,
                ponder: None,
            };

            println!("{response}");
        }

        res
    }

    /// The iteration loop: grow the tree until time, the iteration allowance,
    /// or an external `stop` command ends the search.
    fn run(&mut self) -> Result<SearchResult, SearchError> {
        if self.tree.get(SearchTree::ROOT).is_terminal() {
            return Err(SearchError::NoLegalMoveFound);
        }

        // Expand the root up front so the first selection pass has children
        // to descend into.
        let weights = self.weights;
        self.tree.expand(SearchTree::ROOT, self.player, &weights);

        while self.config.starttime.elapsed() < self.config.budget
            && self.is_searching.load(Ordering::Relaxed)
            && self.result.iterations < self.config.max_iterations
        {
            self.iterate()?;
            self.result.iterations += 1;
        }

        self.extract_best()?;

        Ok(self.result)
    }

    /// One full iteration: selection, expansion, rollout, backpropagation.
    fn iterate(&mut self) -> Result<(), SearchError> {
        // 1. Selection: descend to a leaf by UCB1.
        let mut id = self.select(SearchTree::ROOT);

        // 2. Expansion: a leaf that has already been sampled once gets its
        //    children allocated, and the rollout starts from one of them.
        let node = self.tree.get(id);
        if node.visits > 0 && !node.is_terminal() {
            let weights = self.weights;
            self.tree.expand(id, self.player, &weights);
            id = self.best_child_by_ucb(id);
        }

        // 3. Rollout: play random moves from the selected node's position.
        let score = self.rollout(id)?;

        // 4. Backpropagation: fold the outcome into every node on the path
        //    back to the root.
        self.propagate(id, score);

        Ok(())
    }

    /// Descend from `from` along the highest-UCB1 child at each step until
    /// reaching a leaf.
    ///
    /// Terminal nodes are never expanded, so they are always leaves and the
    /// descent stops at them naturally.
    fn select(&self, from: NodeId) -> NodeId {
        let mut id = from;
        while !self.tree.get(id).is_leaf() {
            id = self.best_child_by_ucb(id);
        }
        id
    }

    /// The child of `id` with the highest UCB1 value.
    ///
    /// Must only be called on non-leaf nodes. Unvisited children score
    /// infinity, so every child is sampled at least once before any child is
    /// re-visited.
    fn best_child_by_ucb(&self, id: NodeId) -> NodeId {
        let parent = self.tree.get(id);

        let mut best = None;
        let mut best_ucb = f64::NEG_INFINITY;
        for &child_id in &parent.children {
            let child = self.tree.get(child_id);
            let ucb = self.ucb1(child.total_score, parent.visits, child.visits);
            if ucb > best_ucb {
                best = Some(child_id);
                best_ucb = ucb;
            }
        }

        match best {
            Some(child_id) => child_id,
            None => unreachable!("selection descended into a node with no children"),
        }
    }

    /// The UCB1 formula: mean exploitation value plus an exploration bonus.
    ///
    /// An unvisited child (or a child of an unvisited parent) is infinitely
    /// attractive. The exploration weight anneals as iterations accumulate,
    /// shifting the search from exploration towards exploitation, but never
    /// drops below a fixed floor.
    fn ucb1(&self, total_score: Score, parent_visits: u32, visits: u32) -> f64 {
        if visits == 0 || parent_visits == 0 {
            return f64::INFINITY;
        }

        let annealed =
            self.config.exploration + 1.0 - tune::anneal_step!() * self.result.iterations as f64;
        let weight = annealed.max(tune::anneal_floor!());

        let exploitation = total_score.0 / visits as f64;
        let exploration = ((parent_visits as f64).ln() / visits as f64).sqrt();

        exploitation + weight * exploration
    }

    /// Play uniformly-random legal moves from `from`'s position until the
    /// game ends or the rollout depth is exhausted, and score the outcome
    /// from the root player's perspective.
    fn rollout(&mut self, from: NodeId) -> Result<Score, SearchError> {
        let mut game = self.tree.get(from).game;
        let mut last_bias = Score::ZERO;

        for ply in 0..self.config.rollout_depth {
            let moves = game.get_legal_moves();

            // Mate or stalemate reached mid-rollout; terminal outcomes found
            // further from the start of the rollout are trusted less.
            if moves.is_empty() {
                return Ok(evaluate_terminal(&game, self.player, ply));
            }

            let mv = moves[self.rng.random_range(0..moves.len())];
            let next = apply(&game, mv)?;
            self.result.nodes += 1;

            last_bias = evaluate_move(&game, &next, mv, self.player);
            game = next;
        }

        if game.get_legal_moves().is_empty() {
            return Ok(evaluate_terminal(&game, self.player, self.config.rollout_depth));
        }

        // Depth cutoff: a static evaluation stands in for the unfinished
        // game, nudged by the character of the last move played and clamped
        // so it can never rival a terminal score.
        let eval = Evaluator::with_weights(&game, self.weights).eval_for(self.player) + last_bias;
        Ok(eval.clamp())
    }

    /// Fold `score` into every node from `from` up to the root.
    ///
    /// Each ply of the tree represents the choice of a different side, so the
    /// score's sign alternates at every step: a node at even depth (the root
    /// player about to move) absorbs the negated score, odd depths absorb it
    /// as-is, and each ancestor flips it again.
    fn propagate(&mut self, from: NodeId, score: Score) {
        let mut score = if self.tree.get(from).depth % 2 == 0 {
            -score
        } else {
            score
        };

        let mut id = from;
        loop {
            let node = self.tree.get_mut(id);
            node.add_score(score);
            node.visits += 1;

            match node.parent {
                Some(parent) => {
                    score = -score;
                    id = parent;
                }
                None => break,
            }
        }
    }

    /// Commit the most-visited root child as the best move.
    ///
    /// Visit count is a more robust criterion than average score: a child
    /// the search kept returning to has survived many more simulations than
    /// one that merely got lucky once.
    fn extract_best(&mut self) -> Result<(), SearchError> {
        let root = self.tree.get(SearchTree::ROOT);

        let mut best = None;
        for &child_id in &root.children {
            let child = self.tree.get(child_id);
            if best.map_or(true, |best_id| child.visits > self.tree.get(best_id).visits) {
                best = Some(child_id);
            }
        }

        let best = self.tree.get(best.ok_or(SearchError::NoMoveFound)?);
        self.result.bestmove = best.incoming;
        self.result.score = Score(best.mean_score());

        Ok(())
    }

    #[inline(always)]
    fn send_info(&self, info: UciInfo) {
        let resp = UciResponse::<String>::Info(Box::new(info));
        println!("{resp}");
    }
}

/// Copy-make `mv` onto `game`, cross-checking it against the rules of the
/// game first.
///
/// A rejection here means a move that came out of the move generator was not
/// actually legal, which is a bug, not a search outcome.
fn apply(game: &Game, mv: Move) -> Result<Game, SearchError> {
    if !game.is_legal(mv) {
        return Err(SearchError::InvalidMoveApplied(mv));
    }

    Ok(game.with_move_made(mv))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn searcher<'a>(game: &'a Game, config: SearchConfig) -> Search<'a> {
        Search::new(game, Arc::new(AtomicBool::new(true)), config)
    }

    #[test]
    fn test_ucb1_prefers_unvisited_children() {
        let game = Game::default();
        let search = searcher(&game, SearchConfig::default());

        assert_eq!(search.ucb1(Score(100.0), 10, 0), f64::INFINITY);
        assert_eq!(search.ucb1(Score(100.0), 0, 3), f64::INFINITY);

        let finite = search.ucb1(Score(100.0), 10, 3);
        assert!(finite.is_finite());
        assert!(finite > 100.0 / 3.0, "exploration bonus must be positive");
    }

    #[test]
    fn test_propagate_alternates_signs() {
        let game = Game::default();
        let mut search = searcher(&game, SearchConfig::default());
        let weights = search.weights;
        search.tree.expand(SearchTree::ROOT, search.player, &weights);

        let child = search.tree.get(SearchTree::ROOT).children[0];
        search.tree.expand(child, search.player, &weights);
        let grandchild = search.tree.get(child).children[0];

        // Zero out the expansion priors so only the propagated score remains.
        for id in [SearchTree::ROOT, child, grandchild] {
            search.tree.get_mut(id).total_score = Score::ZERO;
        }

        // Propagating from an even depth negates the score at that node,
        // then flips the sign at each ancestor.
        let score = Score(10.0);
        search.propagate(grandchild, score);

        assert_eq!(search.tree.get(grandchild).total_score, -score);
        assert_eq!(search.tree.get(child).total_score, score);
        assert_eq!(search.tree.get(SearchTree::ROOT).total_score, -score);

        for id in [SearchTree::ROOT, child, grandchild] {
            assert_eq!(search.tree.get(id).visits, 1);
        }
    }

    #[test]
    fn test_terminal_root_is_an_error() {
        // Stalemate; Black has no legal moves.
        let game: Game = "k7/8/KQ6/8/8/8/8/8 b - - 0 1".parse().unwrap();
        let search = searcher(&game, SearchConfig::default());

        assert_eq!(search.start(), Err(SearchError::NoLegalMoveFound));
    }

    #[test]
    fn test_finds_mate_in_1() {
        let game: Game = "7k/8/6K1/8/8/8/8/R7 w - - 0 1".parse().unwrap();
        let config = SearchConfig {
            budget: Duration::from_millis(500),
            ..Default::default()
        };

        let res = searcher(&game, config).start().unwrap();
        assert_eq!(res.bestmove.map(|mv| mv.to_string()), Some("a1a8".into()));
    }

    #[test]
    fn test_bestmove_is_always_legal() {
        let game = Game::default();
        let config = SearchConfig {
            max_iterations: 200,
            ..Default::default()
        };

        let res = searcher(&game, config).start().unwrap();
        let bestmove = res.bestmove.unwrap();
        assert!(game.get_legal_moves().into_iter().any(|mv| mv == bestmove));
    }
}
