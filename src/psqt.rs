/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use chessie::{Color, Piece, PieceKind, Square};

use crate::value_of;

/// Piece-Square tables copied from [PeSTO](https://www.chessprogramming.org/PeSTO%27s_Evaluation_Function#Source_Code)
#[rustfmt::skip]
const PAWN: Psqt = Psqt::new(PieceKind::Pawn, [
      0,   0,   0,   0,   0,   0,  0,   0,
     98, 134,  61,  95,  68, 126, 34, -11,
     -6,   7,  26,  31,  65,  56, 25, -20,
    -14,  13,   6,  21,  23,  12, 17, -23,
    -27,  -2,  -5,  12,  17,   6, 10, -25,
    -26,  -4,  -4, -10,   3,   3, 33, -12,
    -35,  -1, -20, -23, -15,  24, 38, -22,
      0,   0,   0,   0,   0,   0,  0,   0,
]);

/// Pawn table used once the game has entered the endgame: passed and advanced
/// pawns matter far more than structure around a castled king.
#[rustfmt::skip]
const PAWN_ENDGAME: Psqt = Psqt::new(PieceKind::Pawn, [
      0,   0,   0,   0,   0,   0,   0,   0,
    178, 173, 158, 134, 147, 132, 165, 187,
     94, 100,  85,  67,  56,  53,  82,  84,
     32,  24,  13,   5,  -2,   4,  17,  17,
     13,   9,  -3,  -7,  -7,  -8,   3,  -1,
      4,   7,  -6,   1,   0,  -5,  -1,  -8,
     13,   8,   8,  10,  13,   0,   2,  -7,
      0,   0,   0,   0,   0,   0,   0,   0,
]);

#[rustfmt::skip]
const KNIGHT: Psqt = Psqt::new(PieceKind::Knight, [
    -167, -89, -34, -49,  61, -97, -15, -107,
     -73, -41,  72,  36,  23,  62,   7,  -17,
     -47,  60,  37,  65,  84, 129,  73,   44,
      -9,  17,  19,  53,  37,  69,  18,   22,
     -13,   4,  16,  13,  28,  19,  21,   -8,
     -23,  -9,  12,  10,  19,  17,  25,  -16,
     -29, -53, -12,  -3,  -1,  18, -14,  -19,
    -105, -21, -58, -33, -17, -28, -19,  -23,
]);

#[rustfmt::skip]
const BISHOP: Psqt = Psqt::new(PieceKind::Bishop, [
    -29,   4, -82, -37, -25, -42,   7,  -8,
    -26,  16, -18, -13,  30,  59,  18, -47,
    -16,  37,  43,  40,  35,  50,  37,  -2,
     -4,   5,  19,  50,  37,  37,   7,  -2,
     -6,  13,  13,  26,  34,  12,  10,   4,
      0,  15,  15,  15,  14,  27,  18,  10,
      4,  15,  16,   0,   7,  21,  33,   1,
    -33,  -3, -14, -21, -13, -12, -39, -21,
]);

#[rustfmt::skip]
const ROOK: Psqt = Psqt::new(PieceKind::Rook, [
     32,  42,  32,  51, 63,  9,  31,  43,
     27,  32,  58,  62, 80, 67,  26,  44,
     -5,  19,  26,  36, 17, 45,  61,  16,
    -24, -11,   7,  26, 24, 35,  -8, -20,
    -36, -26, -12,  -1,  9, -7,   6, -23,
    -45, -25, -16, -17,  3,  0,  -5, -33,
    -44, -16, -20,  -9, -1, 11,  -6, -71,
    -19, -13,   1,  17, 16,  7, -37, -26,
]);

#[rustfmt::skip]
const QUEEN: Psqt = Psqt::new(PieceKind::Queen, [
    -28,   0,  29,  12,  59,  44,  43,  45,
    -24, -39,  -5,   1, -16,  57,  28,  54,
    -13, -17,   7,   8,  29,  56,  47,  57,
    -27, -27, -16, -16,  -1,  17,  -2,   1,
     -9, -26,  -9, -10,  -2,  -4,   3,  -3,
    -14,   2, -11,  -2,  -5,   2,  14,   5,
    -35,  -8,  11,   2,   8,  15,  -3,   1,
     -1, -18,  -9,  10, -15, -25, -31, -50,
]);

#[rustfmt::skip]
const KING: Psqt = Psqt::new(PieceKind::King, [
    -65,  23,  16, -15, -56, -34,   2,  13,
     29,  -1, -20,  -7,  -8,  -4, -38, -29,
     -9,  24,   2, -16, -20,   6,  22, -22,
    -17, -20, -12, -27, -30, -25, -14, -36,
    -49,  -1, -27, -39, -46, -44, -33, -51,
    -14, -14, -22, -46, -44, -30, -15, -27,
      1,   7,  -8, -64, -43, -16,   9,   8,
    -15,  36,  12, -54,   8, -28,  24,  14,
]);

/// King table used once the game has entered the endgame: the king becomes a
/// fighting piece and belongs in the center.
#[rustfmt::skip]
const KING_ENDGAME: Psqt = Psqt::new(PieceKind::King, [
    -74, -35, -18, -18, -11,  15,   4, -17,
    -12,  17,  14,  17,  17,  38,  23,  11,
     10,  17,  23,  15,  20,  45,  44,  13,
     -8,  22,  24,  27,  26,  33,  26,   3,
    -18,  -4,  21,  24,  27,  23,   9, -11,
    -19,  -3,  11,  21,  23,  16,   7,  -9,
    -27, -11,   4,  13,  14,   4,  -5, -17,
    -53, -34, -21, -11, -28, -14, -24, -43
]);

/// A [Piece-Square Table](https://www.chessprogramming.org/Piece-Square_Tables) for use in evaluation.
///
/// The base value of the piece is baked into every cell, so a lookup yields
/// "value of having this piece on this square" directly.
#[derive(Debug)]
pub struct Psqt([i32; Square::COUNT]);

impl Psqt {
    /// Fetch the value of `piece` standing on `square`.
    ///
    /// Pawns and the king switch to their endgame table variants once
    /// `endgame` is true; the other pieces use a single table.
    #[inline(always)]
    pub fn value(piece: Piece, square: Square, endgame: bool) -> i32 {
        Self::table_for(piece.kind(), endgame).get_relative(square, piece.color())
    }

    /// Fetch the table for the provided [`PieceKind`] and game phase.
    #[inline(always)]
    pub fn table_for<'a>(kind: PieceKind, endgame: bool) -> &'a Self {
        match (kind, endgame) {
            (PieceKind::Pawn, false) => &PAWN,
            (PieceKind::Pawn, true) => &PAWN_ENDGAME,
            (PieceKind::Knight, _) => &KNIGHT,
            (PieceKind::Bishop, _) => &BISHOP,
            (PieceKind::Rook, _) => &ROOK,
            (PieceKind::Queen, _) => &QUEEN,
            (PieceKind::King, false) => &KING,
            (PieceKind::King, true) => &KING_ENDGAME,
        }
    }

    /// Creates a new [`Psqt`] for the provided [`PieceKind`] and array of values.
    const fn new(kind: PieceKind, psqt: [i32; Square::COUNT]) -> Self {
        let mut flipped = psqt;

        let mut i = 0;
        while i < psqt.len() {
            // Flip the rank, not the file, so it can be used from White's perspective without modification
            // Also add in the value of this piece
            flipped[i] = psqt[i ^ 56] + value_of(kind);
            i += 1;
        }

        Self(flipped)
    }

    /// Get the value of this PSQT at the provided square.
    #[inline(always)]
    pub const fn get(&self, square: Square) -> i32 {
        self.0[square.index()]
    }

    /// Get the value of this PSQT at the provided square, relative to `color`.
    #[inline(always)]
    pub const fn get_relative(&self, square: Square, color: Color) -> i32 {
        self.get(square.rank_relative_to(color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_color_symmetric() {
        for endgame in [false, true] {
            // Over every possible square
            for square in Square::iter() {
                // For every piece
                for kind in PieceKind::all() {
                    // Assert that White's PSQT value equals Black's on the mirrored square
                    let white = Psqt::value(Piece::new(Color::White, kind), square, endgame);
                    let black = Psqt::value(
                        Piece::new(Color::Black, kind),
                        square.rank_relative_to(Color::Black),
                        endgame,
                    );

                    assert_eq!(
                        white,
                        black,
                        "{} on {square} (endgame := {endgame}): {white} (white) != {black} (black)",
                        kind.name()
                    );
                }
            }
        }
    }

    #[test]
    fn test_base_value_is_baked_in() {
        // A pawn on its starting rank has no positional bonus, so the table
        // cell holds exactly the base piece value.
        assert_eq!(PAWN.get(Square::E2), value_of(PieceKind::Pawn));
    }
}
