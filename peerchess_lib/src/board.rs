use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
   White,
   Black,
}

impl Color {
   pub fn name(self) -> &'static str {
      match self {
         Color::White => "White",
         Color::Black => "Black",
      }
   }
}

impl std::ops::Not for Color {
   type Output = Color;
   fn not(self) -> Color {
      match self {
         Color::Black => Color::White,
         Color::White => Color::Black,
      }
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
   Pawn,
   Knight,
   Bishop,
   Rook,
   Queen,
   King,
}

impl fmt::Display for PieceKind {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      let display = match self {
         PieceKind::Pawn => "p",
         PieceKind::Knight => "n",
         PieceKind::Bishop => "b",
         PieceKind::Rook => "r",
         PieceKind::Queen => "q",
         PieceKind::King => "k",
      };
      write!(f, "{}", display)
   }
}

/// Parses a promotion target; pawns and kings are never valid here.
impl FromStr for PieceKind {
   type Err = String;

   fn from_str(s: &str) -> Result<PieceKind, String> {
      match s {
         "n" => Ok(PieceKind::Knight),
         "b" => Ok(PieceKind::Bishop),
         "r" => Ok(PieceKind::Rook),
         "q" => Ok(PieceKind::Queen),
         _ => Err(format!("Expected one of ASCII nbrq for promotion target, got {}", s)),
      }
   }
}

/// A board square, stored as `rank * 8 + file` with a1 = 0 and h8 = 63.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square(u8);

impl Square {
   pub fn new(file: u8, rank: u8) -> Option<Square> {
      if file < 8 && rank < 8 {
         Some(Square(rank * 8 + file))
      } else {
         None
      }
   }

   pub fn from_index(index: u8) -> Option<Square> {
      if index < 64 {
         Some(Square(index))
      } else {
         None
      }
   }

   /// Only the low six bits of `index` are used.
   pub(crate) fn from_index_masked(index: u8) -> Square {
      Square(index & 63)
   }

   pub fn index(self) -> u8 {
      self.0
   }

   pub fn file(self) -> u8 {
      self.0 % 8
   }

   pub fn rank(self) -> u8 {
      self.0 / 8
   }

   pub fn all() -> impl Iterator<Item = Square> {
      (0..64).map(Square)
   }
}

impl fmt::Display for Square {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      let file = (b'a' + self.file()) as char;
      write!(f, "{}{}", file, self.rank() + 1)
   }
}

impl FromStr for Square {
   type Err = String;

   fn from_str(algebraic: &str) -> Result<Square, String> {
      if algebraic.len() != 2 {
         return Err(format!("{} not a valid algebraic location; wrong length", algebraic));
      }
      let file = match algebraic.as_bytes()[0] {
         f @ b'a'..=b'h' => f - b'a',
         f => return Err(format!("{} is not a valid algebraic file, expected a..=h", f as char)),
      };
      let rank = match algebraic.as_bytes()[1] {
         r @ b'1'..=b'8' => r - b'1',
         r => return Err(format!("{} is not a valid algebraic rank, expected 1..=8", r as char)),
      };
      Ok(Square(rank * 8 + file))
   }
}

impl TryFrom<String> for Square {
   type Error = String;

   fn try_from(s: String) -> Result<Square, String> {
      s.parse()
   }
}

impl From<Square> for String {
   fn from(square: Square) -> String {
      square.to_string()
   }
}

/// A move in coordinate form. Castling is the king's two-square step (`e1g1`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
   pub from: Square,
   pub to: Square,
   pub promotion: Option<PieceKind>,
}

impl Move {
   pub fn new(from: Square, to: Square) -> Move {
      Move {
         from,
         to,
         promotion: None,
      }
   }
}

impl fmt::Display for Move {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      write!(f, "{}{}", self.from, self.to)?;
      if let Some(promotion) = self.promotion {
         write!(f, "{}", promotion)?;
      }
      Ok(())
   }
}

impl FromStr for Move {
   type Err = String;

   fn from_str(s: &str) -> Result<Move, String> {
      if s.len() < 4 || s.len() > 5 || !s.is_ascii() {
         return Err(format!(
            "A full move has to be 4-5 bytes long, got a move ({}) that was {} bytes long",
            s,
            s.len()
         ));
      }
      let promotion = match s.get(4..5) {
         Some(p) => Some(p.parse::<PieceKind>()?),
         None => None,
      };
      Ok(Move {
         from: s[..2].parse()?,
         to: s[2..4].parse()?,
         promotion,
      })
   }
}

/// A legal move as reported by the rules oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LegalMove {
   pub mv: Move,
   /// Ordinary captures and en passant.
   pub is_capture: bool,
}

/// Reads a typed gesture, `e2e4`, `e2 e4` or `e2-e4`, as a pair of squares.
pub fn parse_gesture(input: &str) -> crate::error::Result<(Square, Square)> {
   let compact: String = input.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
   if compact.len() != 4 || !compact.is_ascii() {
      return Err(Error::InvalidMove(input.trim().to_string()));
   }
   let square = |s: &str| s.parse::<Square>().map_err(|_| Error::InvalidSquare(s.to_string()));
   Ok((square(&compact[..2])?, square(&compact[2..])?))
}

#[cfg(test)]
mod tests {
   use crate::board::*;

   fn sq(s: &str) -> Square {
      s.parse().unwrap()
   }

   #[test]
   fn algebraic_to_index_conversions() {
      assert_eq!(sq("a8").index(), 56);
      assert_eq!(sq("e4").index(), 28);
      assert_eq!(sq("e2").index(), 12);
      assert_eq!(sq("h1").index(), 7);
      assert!("i1".parse::<Square>().is_err());
      assert!("a9".parse::<Square>().is_err());
      assert!("a10".parse::<Square>().is_err());
   }

   #[test]
   fn algebraic_to_moves() {
      assert_eq!("e2e4".parse::<Move>(), Ok(Move::new(sq("e2"), sq("e4"))));
      assert_eq!(
         "a7a8q".parse::<Move>(),
         Ok(Move {
            from: sq("a7"),
            to: sq("a8"),
            promotion: Some(PieceKind::Queen)
         })
      );
      assert_eq!(
         "a7a8n".parse::<Move>(),
         Ok(Move {
            from: sq("a7"),
            to: sq("a8"),
            promotion: Some(PieceKind::Knight)
         })
      );
      assert!("a7a8k".parse::<Move>().is_err());
      assert!("e2".parse::<Move>().is_err());
   }

   #[test]
   fn moves_to_algebraic() {
      for from in Square::all() {
         for to in Square::all() {
            let t_move = format!("{}{}", from, to);
            assert_eq!(format!("{}", t_move.parse::<Move>().unwrap()), t_move);
         }
      }
   }

   #[test]
   fn squares_serialize_as_algebraic_strings() {
      assert_eq!(serde_json::to_string(&sq("g8")).unwrap(), "\"g8\"");
      assert_eq!(serde_json::from_str::<Square>("\"c3\"").unwrap(), sq("c3"));
      assert!(serde_json::from_str::<Square>("\"z3\"").is_err());
   }

   #[test]
   fn typed_gestures() {
      assert_eq!(parse_gesture("e2e4").unwrap(), (sq("e2"), sq("e4")));
      assert_eq!(parse_gesture(" g1 f3 ").unwrap(), (sq("g1"), sq("f3")));
      assert_eq!(parse_gesture("e7-e8").unwrap(), (sq("e7"), sq("e8")));
      assert!(matches!(parse_gesture("e2"), Err(Error::InvalidMove(_))));
      assert!(matches!(parse_gesture("e2e4q"), Err(Error::InvalidMove(_))));
      assert!(matches!(parse_gesture("e2 i4"), Err(Error::InvalidSquare(s)) if s == "i4"));
   }

   #[test]
   fn color_negation() {
      assert_eq!(!Color::White, Color::Black);
      assert_eq!(!Color::Black, Color::White);
   }
}
