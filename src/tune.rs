/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Exploration constant `C` of the UCB1 formula.
macro_rules! exploration_constant {
    () => {
        2.0
    };
}
pub(crate) use exploration_constant;

/// Amount subtracted from the exploration weight per completed iteration.
macro_rules! anneal_step {
    () => {
        0.05
    };
}
pub(crate) use anneal_step;

/// Floor of the annealed exploration weight.
macro_rules! anneal_floor {
    () => {
        1.0
    };
}
pub(crate) use anneal_floor;

/// Maximum number of random plies played in a single rollout before cutoff.
macro_rules! max_rollout_depth {
    () => {
        4
    };
}
pub(crate) use max_rollout_depth;

/// Cap on the divisor applied to a terminal rollout score.
macro_rules! max_depth_compensation {
    () => {
        6.0
    };
}
pub(crate) use max_depth_compensation;

/// Magnitude of a checkmate found during a rollout.
macro_rules! checkmate_score {
    () => {
        10_000.0
    };
}
pub(crate) use checkmate_score;

/// Score of a drawn or stalemated rollout.
macro_rules! draw_bias {
    () => {
        5.0
    };
}
pub(crate) use draw_bias;

/// Clamp bound for non-terminal rollout scores.
macro_rules! max_eval {
    () => {
        1_000.0
    };
}
pub(crate) use max_eval;

/// Move bias for delivering (or receiving) check.
macro_rules! check_bias {
    () => {
        50.0
    };
}
pub(crate) use check_bias;

/// Move bias for castling.
macro_rules! castle_bias {
    () => {
        60.0
    };
}
pub(crate) use castle_bias;

/// Weight of the material term in the static evaluation.
macro_rules! material_weight {
    () => {
        2.0
    };
}
pub(crate) use material_weight;

/// Weight of the mobility term in the static evaluation.
macro_rules! mobility_weight {
    () => {
        0.5
    };
}
pub(crate) use mobility_weight;

/// Weight of the king safety term in the static evaluation.
macro_rules! king_safety_weight {
    () => {
        3.0
    };
}
pub(crate) use king_safety_weight;

/// Fraction of the initial material below which a position counts as an endgame.
macro_rules! endgame_material_threshold {
    () => {
        0.5
    };
}
pub(crate) use endgame_material_threshold;
