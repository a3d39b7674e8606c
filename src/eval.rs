/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use chessie::{Board, Color, Game, Move, PieceKind};

use crate::{tune, Psqt, Score};

/// Initial material value of all pieces in a standard setup.
const INITIAL_MATERIAL_VALUE: i32 = value_of(PieceKind::Pawn) * 16
    + value_of(PieceKind::Knight) * 4
    + value_of(PieceKind::Bishop) * 4
    + value_of(PieceKind::Rook) * 4
    + value_of(PieceKind::Queen) * 2;

/// Maximum Chebyshev distance between any two squares on the board.
const MAX_BOARD_DISTANCE: f64 = 7.0;

/// Weights applied to the three positional terms of [`Evaluator::eval_for`].
///
/// Swapping this struct out is how evaluation variants are expressed; the
/// scoring formulas themselves exist exactly once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalWeights {
    pub material: f64,
    pub mobility: f64,
    pub king_safety: f64,
}

impl Default for EvalWeights {
    #[inline(always)]
    fn default() -> Self {
        Self {
            material: tune::material_weight!(),
            mobility: tune::mobility_weight!(),
            king_safety: tune::king_safety_weight!(),
        }
    }
}

/// Encapsulates the logic of scoring a chess position.
///
/// Every term is parameterized by the side being scored: a positive number
/// is good for that side, a negative number is good for its opponent.
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    /// The game whose position to evaluate.
    game: &'a Game,

    /// Weights applied to each positional term.
    weights: EvalWeights,

    /// Whether the position has crossed the endgame material threshold.
    endgame: bool,

    /// `1 - material_fraction`, in `[0, 1]`.
    ///
    /// Near 0 in the opening, approaching 1 as pieces come off the board.
    endgame_weight: f64,
}

impl<'a> Evaluator<'a> {
    /// Construct a new [`Evaluator`] with the default weights.
    #[inline(always)]
    pub fn new(game: &'a Game) -> Self {
        Self::with_weights(game, EvalWeights::default())
    }

    /// Construct a new [`Evaluator`] with the provided weights, computing any important metadata.
    #[inline(always)]
    pub fn with_weights(game: &'a Game, weights: EvalWeights) -> Self {
        let fraction = material_fraction(game);
        Self {
            game,
            weights,
            endgame: fraction < tune::endgame_material_threshold!(),
            endgame_weight: 1.0 - fraction,
        }
    }

    /// Evaluate this position from `side`'s perspective as a weighted sum of
    /// the material, mobility, and king safety terms.
    #[inline(always)]
    pub fn eval_for(&self, side: Color) -> Score {
        self.material(side) * self.weights.material
            + self.mobility(side) * self.weights.mobility
            + self.king_safety(side) * self.weights.king_safety
    }

    /// Sum of piece-square values over every occupied square, positive for
    /// `side`'s pieces and negative for the opponent's.
    pub fn material(&self, side: Color) -> Score {
        let mut total = 0;

        for (square, piece) in self.game.board() {
            let value = Psqt::value(piece, square, self.endgame);

            if piece.color() == side {
                total += value;
            } else {
                total -= value;
            }
        }

        Score(total as f64)
    }

    /// Value of occupied squares each side *exclusively* attacks.
    ///
    /// Squares attacked by both sides are excluded so a contested square is
    /// not counted for either player.
    pub fn mobility(&self, side: Color) -> Score {
        let ours = self.game.attacks_by(side);
        let theirs = self.game.attacks_by(side.opponent());

        let mut total = 0;

        for (square, piece) in self.game.board() {
            let attacked_by_us = ours.intersects(square.bitboard());
            let attacked_by_them = theirs.intersects(square.bitboard());

            if attacked_by_us && !attacked_by_them {
                total += Psqt::value(piece, square, self.endgame);
            } else if attacked_by_them && !attacked_by_us {
                total -= Psqt::value(piece, square, self.endgame);
            }
        }

        Score(total as f64)
    }

    /// Rewards driving the opponent's king away from the center and towards
    /// our own king, scaled by the endgame weight.
    ///
    /// Near-zero while most material is on the board; dominant when
    /// converting a material edge into mate.
    pub fn king_safety(&self, side: Color) -> Score {
        let opponent = side.opponent();

        let (Some(our_king), Some(their_king)) = (
            self.game.king(side).to_square(),
            self.game.king(opponent).to_square(),
        ) else {
            return Score::ZERO;
        };

        let center_distance = their_king.center_distance_chebyshev() as f64;
        let between_kings = our_king.distance_chebyshev(their_king) as f64;

        Score((center_distance + MAX_BOARD_DISTANCE - between_kings) * 10.0 * self.endgame_weight)
    }
}

impl fmt::Display for Evaluator<'_> {
    /// Displays the evaluation breakdown for the side to move.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = self.game.side_to_move();
        let name = if side.is_white() { "white" } else { "black" };

        writeln!(f, "Evaluation for {name}:")?;
        writeln!(
            f,
            "  material:    {} (weight {})",
            self.material(side),
            self.weights.material
        )?;
        writeln!(
            f,
            "  mobility:    {} (weight {})",
            self.mobility(side),
            self.weights.mobility
        )?;
        writeln!(
            f,
            "  king safety: {} (weight {})",
            self.king_safety(side),
            self.weights.king_safety
        )?;
        write!(f, "  total:       {}", self.eval_for(side))
    }
}

/// Score a terminal position (no legal continuation) from `side`'s perspective.
///
/// Checkmate scores `±CHECKMATE / compensation`, negative when `side` is the
/// one mated; a stalemate scores the small draw constant. `depth_from_start`
/// is the number of rollout plies it took to reach this position: the further
/// away a mate was found, the less it is trusted, up to the compensation cap.
///
/// The caller must have established that the position is game over.
pub fn evaluate_terminal(game: &Game, side: Color, depth_from_start: u32) -> Score {
    let compensation = (depth_from_start.max(1) as f64).min(tune::max_depth_compensation!());

    let outcome = if game.is_in_check() {
        // The moving side has no reply while in check: it has been mated.
        if game.side_to_move() == side {
            -Score::CHECKMATE
        } else {
            Score::CHECKMATE
        }
    } else {
        Score::DRAW_BIAS
    };

    outcome / compensation
}

/// Small additive bias for the final move of a rollout: checks, castling,
/// and captures nudge the cutoff score.
///
/// `before` and `after` are the positions on either side of `mv`. Never used
/// as a standalone position score.
pub fn evaluate_move(before: &Game, after: &Game, mv: Move, side: Color) -> Score {
    let mover = before.side_to_move();
    let sign = if mover == side { 1.0 } else { -1.0 };

    let mut bias = Score::ZERO;

    if after.is_in_check() {
        bias += Score(tune::check_bias!()) * sign;
    }

    if mv.is_short_castle() || mv.is_long_castle() {
        bias += Score(tune::castle_bias!()) * sign;
    }

    if mv.is_capture() {
        let captured = if mv.is_en_passant() {
            Some(PieceKind::Pawn)
        } else {
            before.kind_at(mv.to())
        };

        if let Some(kind) = captured {
            bias += Score(value_of(kind) as f64) * sign;
        }
    }

    bias
}

/// Returns `true` iff the total weighted material remaining on the board has
/// dropped *strictly below* the configured fraction of the initial total.
#[inline(always)]
pub fn is_endgame(game: &Game) -> bool {
    material_fraction(game) < tune::endgame_material_threshold!()
}

/// Returns a value of the provided `PieceKind`.
///
/// Values are obtained from here: <https://www.chessprogramming.org/Simplified_Evaluation_Function>
#[inline(always)]
pub const fn value_of(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => 100,
        PieceKind::Knight => 320,
        PieceKind::Bishop => 330,
        PieceKind::Rook => 500,
        PieceKind::Queen => 900,
        PieceKind::King => 0, // King is invaluable, but 0 is easier to work with in computations
    }
}

/// Counts the material value of all pieces on the board
///
/// Does NOT count the material of the King, as it cannot be removed from the board.
#[inline(always)]
fn material_remaining(board: &Board) -> i32 {
    PieceKind::all_except_king()
        .into_iter()
        .fold(0, |score, kind| {
            score + board.kind(kind).population() as i32 * value_of(kind)
        })
}

/// Fraction of the initial material total still on the board, in `[0, 1]`.
#[inline(always)]
fn material_fraction(board: &Board) -> f64 {
    material_remaining(board) as f64 / INITIAL_MATERIAL_VALUE as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endgame_detection() {
        let startpos = Game::default();
        assert!(!is_endgame(&startpos));

        let bare_kings: Game = "k7/8/8/8/8/8/8/7K w - - 0 1".parse().unwrap();
        assert!(is_endgame(&bare_kings));
    }

    #[test]
    fn test_endgame_boundary_is_strict() {
        // Exactly half of the initial material (2 queens, 4 rooks, 2 pawns
        // = 4000 of 8000) sits exactly on the threshold, which is NOT yet
        // an endgame: the comparison is strictly-below.
        let game: Game = "k3q1rr/p7/8/8/8/8/P7/K3Q1RR w - - 0 1".parse().unwrap();
        assert!(!is_endgame(&game));
    }

    #[test]
    fn test_material_is_color_symmetric() {
        let white_pawn: Game = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1".parse().unwrap();
        // Rank-mirrored, color-swapped rendition of the same position.
        let black_pawn: Game = "4k3/4p3/8/8/8/8/8/4K3 b - - 0 1".parse().unwrap();

        let white_eval = Evaluator::new(&white_pawn);
        let black_eval = Evaluator::new(&black_pawn);

        assert_eq!(
            white_eval.material(Color::White),
            black_eval.material(Color::Black)
        );
        assert_eq!(
            white_eval.mobility(Color::White),
            black_eval.mobility(Color::Black)
        );
    }

    #[test]
    fn test_material_and_mobility_antisymmetry() {
        let game: Game = "r3k3/8/8/8/8/8/8/4K2R w - - 0 1".parse().unwrap();
        let eval = Evaluator::new(&game);

        assert_eq!(eval.material(Color::White), -eval.material(Color::Black));
        assert_eq!(eval.mobility(Color::White), -eval.mobility(Color::Black));
    }

    #[test]
    fn test_terminal_magnitude_decreases_with_depth() {
        // Black is mated in the corner.
        let mated: Game = "R6k/6pp/8/8/8/8/8/K7 b - - 0 1".parse().unwrap();

        let mut previous = Score(f64::INFINITY);
        for depth in 1..=6 {
            let score = evaluate_terminal(&mated, Color::White, depth);
            assert!(score > Score::ZERO, "mating side must score positively");
            assert!(
                score < previous,
                "magnitude must strictly decrease up to the cap (depth {depth})"
            );
            previous = score;
        }

        // Beyond the cap the compensation saturates.
        assert_eq!(
            evaluate_terminal(&mated, Color::White, 6),
            evaluate_terminal(&mated, Color::White, 60)
        );

        // The mated side sees the same magnitude, negated.
        assert_eq!(
            evaluate_terminal(&mated, Color::Black, 1),
            -evaluate_terminal(&mated, Color::White, 1)
        );
    }

    #[test]
    fn test_stalemate_scores_draw_bias() {
        let stalemate: Game = "k7/8/KQ6/8/8/8/8/8 b - - 0 1".parse().unwrap();
        assert_eq!(
            evaluate_terminal(&stalemate, Color::White, 1),
            Score::DRAW_BIAS
        );
    }

    #[test]
    fn test_move_bias_rewards_captures() {
        // White queen takes the rook on b7.
        let before: Game = "k7/1r6/8/8/8/8/1Q6/K7 w - - 0 1".parse().unwrap();
        let mv = before
            .get_legal_moves()
            .into_iter()
            .find(|mv| mv.is_capture())
            .unwrap();
        let after = before.with_move_made(mv);

        let bias = evaluate_move(&before, &after, mv, Color::White);
        assert!(bias >= Score(value_of(PieceKind::Rook) as f64));

        // From Black's perspective, losing the rook is equally bad.
        let opposing = evaluate_move(&before, &after, mv, Color::Black);
        assert_eq!(bias, -opposing);
    }
}
