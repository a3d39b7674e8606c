/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use chessie::{Color, Game, Move};

use crate::{EvalWeights, Evaluator, Score};

/// Index of a [`Node`] within its [`SearchTree`] arena.
pub type NodeId = usize;

/// A single node of the Monte Carlo search tree.
///
/// Nodes never hold references to each other; all links are [`NodeId`]
/// indices into the owning [`SearchTree`] arena.
#[derive(Debug, Clone)]
pub struct Node {
    /// Position reached at this node.
    pub game: Game,

    /// Plies between this node and the root (the root itself is 0).
    pub depth: u32,

    /// Arena index of this node's parent, `None` only for the root.
    pub parent: Option<NodeId>,

    /// The move that was applied to the parent's position to reach this node.
    pub incoming: Option<Move>,

    /// How many simulations have passed through this node.
    pub visits: u32,

    /// Accumulated backpropagated score for this node.
    pub total_score: Score,

    /// Arena indices of this node's children; empty until expanded.
    pub children: Vec<NodeId>,
}

impl Node {
    fn new(game: Game, depth: u32, parent: Option<NodeId>, incoming: Option<Move>) -> Self {
        Self {
            game,
            depth,
            parent,
            incoming,
            visits: 0,
            total_score: Score::ZERO,
            children: Vec::new(),
        }
    }

    /// A node is a leaf until it has been expanded.
    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// A node is terminal if its position has no legal continuation.
    #[inline(always)]
    pub fn is_terminal(&self) -> bool {
        self.game.get_legal_moves().is_empty()
    }

    /// Accumulate a backpropagated score into this node.
    #[inline(always)]
    pub fn add_score(&mut self, score: Score) {
        self.total_score += score;
    }

    /// Average backpropagated score per visit, or zero if never visited.
    #[inline(always)]
    pub fn mean_score(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.total_score.0 / self.visits as f64
        }
    }
}

/// Arena-backed Monte Carlo search tree.
///
/// All nodes live in a single `Vec` and are addressed by [`NodeId`], so the
/// tree grows by pushing and never needs interior mutability or `Rc` cycles.
#[derive(Debug, Clone)]
pub struct SearchTree {
    nodes: Vec<Node>,
}

impl SearchTree {
    /// Arena index of the root node.
    pub const ROOT: NodeId = 0;

    /// Create a tree containing only a root node for `game`.
    pub fn new(game: Game) -> Self {
        Self {
            nodes: vec![Node::new(game, 0, None, None)],
        }
    }

    #[inline(always)]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline(always)]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Total number of nodes allocated in the arena.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Expand `id` by allocating one child per legal move, all at once.
    ///
    /// Each child is seeded with a static evaluation of its position from
    /// `side`'s perspective, so the tree carries an initial ordering before
    /// any rollouts have run.
    ///
    /// # Panics
    ///
    /// Panics if `id` has already been expanded or is terminal.
    pub fn expand(&mut self, id: NodeId, side: Color, weights: &EvalWeights) -> usize {
        let parent = &self.nodes[id];
        assert!(parent.is_leaf(), "cannot expand a node twice");

        let game = parent.game;
        let depth = parent.depth;
        let moves = game.get_legal_moves();
        assert!(!moves.is_empty(), "cannot expand a terminal node");

        let mut children = Vec::with_capacity(moves.len());
        for mv in moves {
            let next = game.with_move_made(mv);

            let child_id = self.nodes.len();
            let mut child = Node::new(next, depth + 1, Some(id), Some(mv));
            child.total_score = Evaluator::with_weights(&next, *weights).eval_for(side);
            self.nodes.push(child);

            children.push(child_id);
        }

        let count = children.len();
        self.nodes[id].children = children;
        count
    }

    /// The chain of node ids from `id` up to and including the root.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            path.push(parent);
            current = parent;
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_creates_one_child_per_legal_move() {
        let game = Game::default();
        let mut tree = SearchTree::new(game);
        let side = game.side_to_move();

        let count = tree.expand(SearchTree::ROOT, side, &EvalWeights::default());
        assert_eq!(count, 20);
        assert_eq!(tree.len(), 21);

        let root = tree.get(SearchTree::ROOT);
        assert_eq!(root.children.len(), 20);

        for &child in &root.children {
            let node = tree.get(child);
            assert_eq!(node.depth, 1);
            assert_eq!(node.parent, Some(SearchTree::ROOT));
            assert!(node.incoming.is_some());
            assert_eq!(node.visits, 0);
            assert!(node.is_leaf());
        }
    }

    #[test]
    #[should_panic(expected = "cannot expand a node twice")]
    fn test_expand_twice_panics() {
        let game = Game::default();
        let mut tree = SearchTree::new(game);
        let side = game.side_to_move();

        tree.expand(SearchTree::ROOT, side, &EvalWeights::default());
        tree.expand(SearchTree::ROOT, side, &EvalWeights::default());
    }

    #[test]
    #[should_panic(expected = "cannot expand a terminal node")]
    fn test_expand_terminal_panics() {
        // Stalemate; Black has no legal moves.
        let game: Game = "k7/8/KQ6/8/8/8/8/8 b - - 0 1".parse().unwrap();
        let mut tree = SearchTree::new(game);

        tree.expand(SearchTree::ROOT, Color::White, &EvalWeights::default());
    }

    #[test]
    fn test_path_to_root_ordering() {
        let game = Game::default();
        let mut tree = SearchTree::new(game);
        let side = game.side_to_move();

        tree.expand(SearchTree::ROOT, side, &EvalWeights::default());
        let child = tree.get(SearchTree::ROOT).children[0];
        tree.expand(child, side, &EvalWeights::default());
        let grandchild = tree.get(child).children[0];

        assert_eq!(
            tree.path_to_root(grandchild),
            vec![grandchild, child, SearchTree::ROOT]
        );
        assert_eq!(tree.path_to_root(SearchTree::ROOT), vec![SearchTree::ROOT]);
    }
}
