use crate::board::{Color, Move};
use crate::eval::evaluate;
use crate::messages::{EngineMessage, InterfaceMessage, SearchRequest};
use crate::oracle::RulesOracle;
use log::{error, trace, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Plies the hard tier searches below each root move.
pub const SEARCH_DEPTH: u32 = 2;

// Wider than any reachable material score.
const SCORE_BOUND: i32 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Difficulty {
   Easy,
   Medium,
   Hard,
}

impl FromStr for Difficulty {
   type Err = String;

   fn from_str(s: &str) -> Result<Difficulty, String> {
      match s.to_ascii_lowercase().as_str() {
         "easy" => Ok(Difficulty::Easy),
         "medium" => Ok(Difficulty::Medium),
         "hard" => Ok(Difficulty::Hard),
         _ => Err(format!("Expected one of easy, medium, hard for difficulty, got {}", s)),
      }
   }
}

impl fmt::Display for Difficulty {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      let display = match self {
         Difficulty::Easy => "easy",
         Difficulty::Medium => "medium",
         Difficulty::Hard => "hard",
      };
      write!(f, "{}", display)
   }
}

/// Picks a move for the side to move, or `None` when there are no legal moves.
///
/// Callers are expected to check for a finished game first. The oracle is
/// left exactly as it was given.
pub fn select_move<O: RulesOracle, R: Rng + ?Sized>(
   oracle: &mut O,
   difficulty: Difficulty,
   rng: &mut R,
) -> Option<Move> {
   let best_move = match difficulty {
      Difficulty::Easy => oracle.legal_moves().choose(rng).map(|m| m.mv),
      Difficulty::Medium => {
         let moves = oracle.legal_moves();
         let captures: Vec<Move> = moves.iter().filter(|m| m.is_capture).map(|m| m.mv).collect();
         if captures.is_empty() {
            moves.choose(rng).map(|m| m.mv)
         } else {
            captures.choose(rng).copied()
         }
      }
      Difficulty::Hard => search(oracle, SEARCH_DEPTH, rng).map(|(best_move, _)| best_move),
   };
   if best_move.is_none() {
      error!("asked for a {} move in a position with no legal moves", difficulty);
   }
   best_move
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
   pub nodes: u64,
   pub cutoffs: u64,
}

/// Minimax with alpha-beta over every root move and `depth` plies below it.
/// White maximizes, Black minimizes.
///
/// Root moves are shuffled first so equal scores don't always resolve to
/// the same move.
pub fn search<O: RulesOracle, R: Rng + ?Sized>(oracle: &mut O, depth: u32, rng: &mut R) -> Option<(Move, i32)> {
   let mut moves: Vec<Move> = oracle.legal_moves().into_iter().map(|m| m.mv).collect();
   moves.shuffle(rng);
   let search_time_start = Instant::now();
   let mut stats = SearchStats::default();
   let result = search_moves(oracle, depth, &moves, &mut stats);
   trace!(
      "search @ depth {} took {}. nodes: {} cutoffs: {}",
      depth,
      search_time_start.elapsed().as_secs_f64(),
      stats.nodes,
      stats.cutoffs
   );
   result
}

/// Searches the root moves in the given order. The first move reaching the
/// best score wins.
fn search_moves<O: RulesOracle>(
   oracle: &mut O,
   depth: u32,
   moves: &[Move],
   stats: &mut SearchStats,
) -> Option<(Move, i32)> {
   let maximizing = oracle.turn() == Color::White;
   let mut alpha = -SCORE_BOUND;
   let mut beta = SCORE_BOUND;
   let mut best: Option<(Move, i32)> = None;
   stats.nodes += 1;
   for &a_move in moves {
      if oracle.apply_move(a_move).is_none() {
         warn!("root move {} was rejected by the rules oracle", a_move);
         continue;
      }
      let score = minimax(oracle, depth, alpha, beta, !maximizing, stats);
      oracle.undo_last_move();
      let improves = match best {
         None => true,
         Some((_, best_score)) if maximizing => score > best_score,
         Some((_, best_score)) => score < best_score,
      };
      if improves {
         best = Some((a_move, score));
      }
      if maximizing {
         alpha = alpha.max(score);
      } else {
         beta = beta.min(score);
      }
   }
   best
}

fn minimax<O: RulesOracle>(
   oracle: &mut O,
   depth: u32,
   mut alpha: i32,
   mut beta: i32,
   maximizing: bool,
   stats: &mut SearchStats,
) -> i32 {
   stats.nodes += 1;
   if depth == 0 || oracle.is_game_over() {
      return evaluate(oracle);
   }
   let mut best_val = if maximizing { -SCORE_BOUND } else { SCORE_BOUND };
   for a_move in oracle.legal_moves() {
      if oracle.apply_move(a_move.mv).is_none() {
         continue;
      }
      let score = minimax(oracle, depth - 1, alpha, beta, !maximizing, stats);
      oracle.undo_last_move();
      if maximizing {
         best_val = best_val.max(score);
         alpha = alpha.max(best_val);
      } else {
         best_val = best_val.min(score);
         beta = beta.min(best_val);
      }
      if beta <= alpha {
         stats.cutoffs += 1;
         break;
      }
   }
   best_val
}

/// Search worker loop. Each request is answered from a fresh oracle built
/// from the request's FEN, never from the session's live position.
pub fn start<O: RulesOracle>(receiver: mpsc::Receiver<InterfaceMessage>, sender: UnboundedSender<EngineMessage>) {
   let mut rng = rand::thread_rng();
   while let Ok(message) = receiver.recv() {
      match message {
         InterfaceMessage::Search(request) => {
            trace!("generation {}: thinking at {}", request.generation, request.difficulty);
            let best_move = match O::from_fen(&request.fen) {
               Ok(mut oracle) => select_move(&mut oracle, request.difficulty, &mut rng),
               Err(e) => {
                  error!("search request carried an unusable position: {}", e);
                  None
               }
            };
            let reply = EngineMessage::BestMove {
               generation: request.generation,
               best_move,
            };
            if sender.send(reply).is_err() {
               trace!("nobody is listening for engine replies, stopping");
               break;
            }
         }
         InterfaceMessage::Shutdown => break,
      }
   }
}

/// Owns the search worker thread. Dropping the handle stops the worker.
pub struct EngineHandle {
   sender: mpsc::Sender<InterfaceMessage>,
   thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
   pub fn spawn<O: RulesOracle + 'static>(replies: UnboundedSender<EngineMessage>) -> EngineHandle {
      let (ite_tx, ite_rx) = mpsc::channel(); // Interface to Engine
      let thread = thread::spawn(move || {
         start::<O>(ite_rx, replies);
      });
      EngineHandle {
         sender: ite_tx,
         thread: Some(thread),
      }
   }

   /// Returns false if the worker has gone away.
   pub fn request(&self, request: SearchRequest) -> bool {
      self.sender.send(InterfaceMessage::Search(request)).is_ok()
   }
}

impl Drop for EngineHandle {
   fn drop(&mut self) {
      let _ = self.sender.send(InterfaceMessage::Shutdown);
      if let Some(thread) = self.thread.take() {
         if thread.join().is_err() {
            error!("search worker panicked");
         }
      }
   }
}
