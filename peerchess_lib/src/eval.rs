use crate::board::{Color, PieceKind, Square};
use crate::oracle::RulesOracle;

pub fn mat_val(piece: PieceKind) -> i32 {
   match piece {
      PieceKind::Pawn => 10,
      PieceKind::Knight => 30,
      PieceKind::Bishop => 30,
      PieceKind::Rook => 50,
      PieceKind::Queen => 90,
      PieceKind::King => 900,
   }
}

/// Material balance from White's point of view: positive favours White.
///
/// Deliberately naive. There are no positional, mobility or mate terms, so
/// a checkmated side is scored on the material left on the board.
pub fn evaluate<O: RulesOracle>(oracle: &O) -> i32 {
   Square::all()
      .filter_map(|square| oracle.piece_on(square))
      .map(|(color, piece)| match color {
         Color::White => mat_val(piece),
         Color::Black => -mat_val(piece),
      })
      .sum()
}
