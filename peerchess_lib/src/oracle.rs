use crate::board::{Color, LegalMove, Move, PieceKind, Square};
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameStatus {
   Checkmate { loser: Color },
   Draw,
   Ongoing { in_check: bool },
}

/// Chess rules as seen by the search and the session.
///
/// An implementation owns exactly one position. `apply_move` and
/// `undo_last_move` must be exact inverses: applying any legal move and then
/// undoing it leaves `to_fen` unchanged.
pub trait RulesOracle: Sized {
   fn start() -> Self;

   fn from_fen(fen: &str) -> Result<Self>;

   fn to_fen(&self) -> String;

   /// The side to move.
   fn turn(&self) -> Color;

   fn piece_on(&self, square: Square) -> Option<(Color, PieceKind)>;

   fn legal_moves(&self) -> Vec<LegalMove>;

   /// Plays `mv` if it is legal, returning the move as played. A missing
   /// promotion on a promoting move means queen. `None` leaves the position
   /// untouched.
   fn apply_move(&mut self, mv: Move) -> Option<Move>;

   /// Returns false when there is nothing to undo.
   fn undo_last_move(&mut self) -> bool;

   fn is_in_check(&self) -> bool;

   fn is_checkmate(&self) -> bool;

   fn is_draw(&self) -> bool;

   fn is_game_over(&self) -> bool {
      self.is_checkmate() || self.is_draw()
   }

   fn status(&self) -> GameStatus {
      if self.is_checkmate() {
         GameStatus::Checkmate { loser: self.turn() }
      } else if self.is_draw() {
         GameStatus::Draw
      } else {
         GameStatus::Ongoing {
            in_check: self.is_in_check(),
         }
      }
   }
}
