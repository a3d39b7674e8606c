/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use uci_parser::UciScore;

use crate::tune;

/// A numerical evaluation of a position, move, or rollout outcome.
///
/// Unlike a classical centipawn score, this value accumulates over many
/// rollouts, so it is backed by an `f64`. Terminal (mate) scores and
/// clamped rollout scores live on deliberately separate scales: even the
/// most depth-compensated mate ([`Self::CHECKMATE`] divided by the
/// compensation cap) is larger than [`Self::MAX_EVAL`], so a decisive
/// outcome always dominates a heuristic one.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Score(pub f64);

impl Score {
    /// Score of an equal position.
    pub const ZERO: Self = Self(0.0);

    /// Magnitude of a checkmate found during a rollout, before depth compensation.
    pub const CHECKMATE: Self = Self(tune::checkmate_score!());

    /// Score of a draw or stalemate reached during a rollout.
    ///
    /// Small and positive: drawing is better than losing.
    pub const DRAW_BIAS: Self = Self(tune::draw_bias!());

    /// Bound on the magnitude of a non-terminal rollout score.
    pub const MAX_EVAL: Self = Self(tune::max_eval!());

    /// Clamp this score into `[-MAX_EVAL, +MAX_EVAL]`.
    ///
    /// Applied to every depth-cutoff rollout score to bound the variance
    /// any single rollout can contribute to the tree.
    #[inline(always)]
    pub fn clamp(self) -> Self {
        Self(self.0.clamp(-Self::MAX_EVAL.0, Self::MAX_EVAL.0))
    }

    /// Returns the absolute value of this [`Score`].
    #[inline(always)]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Converts this [`Score`] into a [`UciScore`] in (truncated) centipawns.
    ///
    /// Used when sending the `info score` message.
    #[inline(always)]
    pub fn into_uci(self) -> UciScore {
        UciScore::cp(self.0 as i32)
    }
}

macro_rules! impl_binary_op {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            type Output = Self;

            #[inline(always)]
            fn $fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$fn(rhs.0))
            }
        }

        impl std::ops::$trait<f64> for Score {
            type Output = Self;

            #[inline(always)]
            fn $fn(self, rhs: f64) -> Self::Output {
                Self(self.0.$fn(rhs))
            }
        }
    };
}

macro_rules! impl_binary_op_assign {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            #[inline(always)]
            fn $fn(&mut self, rhs: Self) {
                self.0.$fn(rhs.0);
            }
        }

        impl std::ops::$trait<f64> for Score {
            #[inline(always)]
            fn $fn(&mut self, rhs: f64) {
                self.0.$fn(rhs);
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
impl_binary_op!(Div, div);

impl_binary_op_assign!(AddAssign, add_assign);
impl_binary_op_assign!(SubAssign, sub_assign);

impl std::ops::Neg for Score {
    type Output = Self;

    #[inline(always)]
    fn neg(self) -> Self::Output {
        Self(self.0.neg())
    }
}

impl PartialEq<f64> for Score {
    fn eq(&self, other: &f64) -> bool {
        self.0.eq(other)
    }
}

impl PartialOrd<f64> for Score {
    fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl fmt::Display for Score {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

impl fmt::Debug for Score {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(Score(9999.0).clamp(), Score::MAX_EVAL);
        assert_eq!(Score(-9999.0).clamp(), -Score::MAX_EVAL);

        let inside = Score(123.4);
        assert_eq!(inside.clamp(), inside);
    }

    #[test]
    fn test_terminal_scale_dominates_clamped_scale() {
        // The weakest possible mate score must still outrank the strongest
        // clamped rollout score, or the search would prefer material over mate.
        let weakest_mate = Score::CHECKMATE / crate::tune::max_depth_compensation!();
        assert!(weakest_mate > Score::MAX_EVAL);
    }
}
