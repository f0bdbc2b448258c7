use crate::board::{Color, LegalMove, Move, PieceKind, Square, START_FEN};
use crate::error::{Error, Result};
use crate::oracle::RulesOracle;
use cozy_chess::{
   Board, Color as CozyColor, File, GameStatus as CozyStatus, Move as CozyMove, Piece, Square as CozySquare,
};
use fxhash::FxHashMap;
use log::trace;
use smallvec::SmallVec;

/// `RulesOracle` backed by `cozy_chess`.
///
/// cozy_chess encodes castling as the king capturing its own rook; moves are
/// translated to the king's two-square step at this boundary.
#[derive(Clone, Debug)]
pub struct CozyOracle {
   board: Board,
   history: SmallVec<[Board; 8]>,
   // position hash -> times seen since the last reset, for threefold repetition
   repetitions: FxHashMap<u64, u8>,
}

impl CozyOracle {
   fn with_board(board: Board) -> CozyOracle {
      let mut repetitions = FxHashMap::default();
      repetitions.insert(board.hash(), 1);
      CozyOracle {
         board,
         history: SmallVec::new(),
         repetitions,
      }
   }

   fn to_standard(&self, mv: CozyMove) -> Move {
      let from = from_cozy_square(mv.from);
      let mut to = from_cozy_square(mv.to);
      let castles =
         self.board.piece_on(mv.from) == Some(Piece::King) && self.board.colors(self.board.side_to_move()).has(mv.to);
      if castles {
         let king_file = if mv.to.file() as u8 > mv.from.file() as u8 { File::G } else { File::C };
         to = from_cozy_square(CozySquare::new(king_file, mv.from.rank()));
      }
      Move {
         from,
         to,
         promotion: mv.promotion.map(from_cozy_piece),
      }
   }

   fn generate(&self) -> Vec<(CozyMove, LegalMove)> {
      let mut moves = Vec::new();
      let theirs = self.board.colors(!self.board.side_to_move());
      self.board.generate_moves(|piece_moves| {
         let is_pawn = piece_moves.piece == Piece::Pawn;
         for mv in piece_moves {
            // a pawn changing file always captures, en passant included
            let is_capture = theirs.has(mv.to) || (is_pawn && mv.from.file() != mv.to.file());
            moves.push((
               mv,
               LegalMove {
                  mv: self.to_standard(mv),
                  is_capture,
               },
            ));
         }
         false
      });
      moves
   }

   fn repetition_count(&self) -> u8 {
      self.repetitions.get(&self.board.hash()).copied().unwrap_or(0)
   }

   fn insufficient_material(&self) -> bool {
      let board = &self.board;
      let decisive = board.pieces(Piece::Pawn) | board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
      if !decisive.is_empty() {
         return false;
      }
      let minors = board.pieces(Piece::Knight) | board.pieces(Piece::Bishop);
      if minors.len() <= 1 {
         return true;
      }
      // any number of bishops, all on the same square colour
      let bishops = board.pieces(Piece::Bishop);
      if bishops != minors {
         return false;
      }
      let mut shades = bishops.into_iter().map(|sq| (sq.file() as usize + sq.rank() as usize) % 2);
      match shades.next() {
         Some(first) => shades.all(|shade| shade == first),
         None => true,
      }
   }
}

fn to_cozy_square(square: Square) -> CozySquare {
   CozySquare::index(square.index() as usize)
}

fn from_cozy_square(square: CozySquare) -> Square {
   Square::from_index_masked(square as u8)
}

fn from_cozy_piece(piece: Piece) -> PieceKind {
   match piece {
      Piece::Pawn => PieceKind::Pawn,
      Piece::Knight => PieceKind::Knight,
      Piece::Bishop => PieceKind::Bishop,
      Piece::Rook => PieceKind::Rook,
      Piece::Queen => PieceKind::Queen,
      Piece::King => PieceKind::King,
   }
}

fn from_cozy_color(color: CozyColor) -> Color {
   match color {
      CozyColor::White => Color::White,
      CozyColor::Black => Color::Black,
   }
}

impl RulesOracle for CozyOracle {
   fn start() -> CozyOracle {
      CozyOracle::with_board(Board::default())
   }

   fn from_fen(fen: &str) -> Result<CozyOracle> {
      Board::from_fen(fen.trim(), false)
         .map(CozyOracle::with_board)
         .map_err(|e| Error::InvalidFen(format!("{} ({:?})", fen, e)))
   }

   fn to_fen(&self) -> String {
      format!("{}", self.board)
   }

   fn turn(&self) -> Color {
      from_cozy_color(self.board.side_to_move())
   }

   fn piece_on(&self, square: Square) -> Option<(Color, PieceKind)> {
      let square = to_cozy_square(square);
      let piece = self.board.piece_on(square)?;
      let color = self.board.color_on(square)?;
      Some((from_cozy_color(color), from_cozy_piece(piece)))
   }

   fn legal_moves(&self) -> Vec<LegalMove> {
      self.generate().into_iter().map(|(_, legal)| legal).collect()
   }

   fn apply_move(&mut self, mv: Move) -> Option<Move> {
      let promotion = mv.promotion.unwrap_or(PieceKind::Queen);
      let (cozy_move, legal) = self.generate().into_iter().find(|(_, legal)| {
         legal.mv.from == mv.from
            && legal.mv.to == mv.to
            && legal.mv.promotion.map_or(true, |p| p == promotion)
      })?;
      self.history.push(self.board.clone());
      self.board.play_unchecked(cozy_move);
      *self.repetitions.entry(self.board.hash()).or_insert(0) += 1;
      Some(legal.mv)
   }

   fn undo_last_move(&mut self) -> bool {
      let previous = match self.history.pop() {
         Some(board) => board,
         None => {
            trace!("undo requested with an empty history");
            return false;
         }
      };
      let hash = self.board.hash();
      if let Some(count) = self.repetitions.get_mut(&hash) {
         *count -= 1;
         if *count == 0 {
            self.repetitions.remove(&hash);
         }
      }
      self.board = previous;
      true
   }

   fn is_in_check(&self) -> bool {
      !self.board.checkers().is_empty()
   }

   fn is_checkmate(&self) -> bool {
      self.board.status() == CozyStatus::Won
   }

   fn is_draw(&self) -> bool {
      self.board.status() == CozyStatus::Drawn || self.repetition_count() >= 3 || self.insufficient_material()
   }
}

impl Default for CozyOracle {
   fn default() -> CozyOracle {
      CozyOracle::start()
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn oracle_from_moves(moves: &str) -> CozyOracle {
      let mut oracle = CozyOracle::start();
      for a_move in moves.split_whitespace() {
         assert!(oracle.apply_move(a_move.parse().unwrap()).is_some(), "{} was illegal", a_move);
      }
      oracle
   }

   #[test]
   fn start_position_round_trips() {
      let oracle = CozyOracle::start();
      assert_eq!(oracle.to_fen(), START_FEN);
      assert_eq!(CozyOracle::from_fen(START_FEN).unwrap().to_fen(), START_FEN);
      assert!(CozyOracle::from_fen("not a fen").is_err());
   }

   #[test]
   fn movegen_test() {
      let mut a = CozyOracle::start();
      assert_eq!(a.legal_moves().len(), 20);
      a.apply_move("e2e4".parse().unwrap()).unwrap();
      assert_eq!(a.legal_moves().len(), 20);
      a = oracle_from_moves("g2g4 e7e5");
      assert_eq!(a.legal_moves().len(), 21);
   }

   #[test]
   fn illegal_move_leaves_position_untouched() {
      let mut a = CozyOracle::start();
      assert_eq!(a.apply_move("e2e5".parse().unwrap()), None);
      assert_eq!(a.apply_move("e7e5".parse().unwrap()), None);
      assert_eq!(a.to_fen(), START_FEN);
   }

   #[test]
   fn undo_restores_fen() {
      let mut a = oracle_from_moves("e2e4 d7d5");
      let before = a.to_fen();
      a.apply_move("e4d5".parse().unwrap()).unwrap();
      assert_ne!(a.to_fen(), before);
      assert!(a.undo_last_move());
      assert_eq!(a.to_fen(), before);
      assert!(a.undo_last_move());
      assert!(a.undo_last_move());
      assert!(!a.undo_last_move());
      assert_eq!(a.to_fen(), START_FEN);
   }

   #[test]
   fn captures_are_flagged() {
      let a = oracle_from_moves("e2e4 d7d5");
      let captures: Vec<String> = a
         .legal_moves()
         .into_iter()
         .filter(|m| m.is_capture)
         .map(|m| m.mv.to_string())
         .collect();
      assert_eq!(captures, vec!["e4d5".to_string()]);
   }

   #[test]
   fn en_passant_is_a_capture() {
      let a = oracle_from_moves("e2e4 a7a6 e4e5 d7d5");
      let ep = a
         .legal_moves()
         .into_iter()
         .find(|m| m.mv.to_string() == "e5d6")
         .unwrap();
      assert!(ep.is_capture);
   }

   #[test]
   fn castling_uses_king_destination() {
      let mut a = CozyOracle::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
      let castles: Vec<String> = a
         .legal_moves()
         .into_iter()
         .filter(|m| m.mv.from.to_string() == "e1" && !m.is_capture)
         .map(|m| m.mv.to_string())
         .filter(|m| m == "e1g1" || m == "e1c1")
         .collect();
      assert_eq!(castles.len(), 2);
      assert!(a.apply_move("e1h1".parse().unwrap()).is_none());
      let played = a.apply_move("e1g1".parse().unwrap()).unwrap();
      assert_eq!(played.to_string(), "e1g1");
      assert_eq!(a.piece_on("f1".parse().unwrap()), Some((Color::White, PieceKind::Rook)));
      assert_eq!(a.piece_on("g1".parse().unwrap()), Some((Color::White, PieceKind::King)));
   }

   #[test]
   fn promotion_defaults_to_queen() {
      let mut a = CozyOracle::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
      let played = a.apply_move("a7a8".parse().unwrap()).unwrap();
      assert_eq!(played.promotion, Some(PieceKind::Queen));
      assert_eq!(a.piece_on("a8".parse().unwrap()), Some((Color::White, PieceKind::Queen)));
   }

   #[test]
   fn checkmate_detected() {
      let a = oracle_from_moves("f2f3 e7e5 g2g4 d8h4");
      assert!(a.is_checkmate());
      assert!(a.is_in_check());
      assert!(a.is_game_over());
      assert!(a.legal_moves().is_empty());
   }

   #[test]
   fn check_is_not_mate() {
      let a = oracle_from_moves("e2e4 f7f6 d1h5");
      assert!(a.is_in_check());
      assert!(!a.is_checkmate());
      assert!(!a.is_draw());
   }

   #[test]
   fn stalemate_is_a_draw() {
      let a = CozyOracle::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
      assert!(a.is_draw());
      assert!(!a.is_checkmate());
   }

   #[test]
   fn threefold_repetition_is_a_draw() {
      let mut a = oracle_from_moves("g1f3 g8f6 f3g1 f6g8 g1f3 g8f6 f3g1");
      assert!(!a.is_draw());
      a.apply_move("f6g8".parse().unwrap()).unwrap();
      assert!(a.is_draw());
      assert!(a.undo_last_move());
      assert!(!a.is_draw());
   }

   #[test]
   fn insufficient_material_is_a_draw() {
      assert!(CozyOracle::from_fen("8/8/4k3/8/8/3K4/8/8 w - - 0 1").unwrap().is_draw());
      assert!(CozyOracle::from_fen("8/8/4k3/8/8/3KN3/8/8 w - - 0 1").unwrap().is_draw());
      // both bishops on dark squares
      assert!(CozyOracle::from_fen("8/8/4k3/2b5/8/3KB3/8/8 w - - 0 1").unwrap().is_draw());
      assert!(!CozyOracle::from_fen("8/8/4k3/8/8/3KNN2/8/8 w - - 0 1").unwrap().is_draw());
      assert!(!CozyOracle::from_fen("8/8/4k3/8/8/3K4/7R/8 w - - 0 1").unwrap().is_draw());
   }
}
