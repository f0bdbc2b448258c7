use crate::board::Move;
use crate::engine::Difficulty;

// Session <-> search worker messages

/// `generation` identifies the session state the request was made from; a
/// reply carrying an older generation is stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
   pub generation: u64,
   pub fen: String,
   pub difficulty: Difficulty,
}

// Interface to Engine
#[derive(Debug)]
pub enum InterfaceMessage {
   Search(SearchRequest),
   Shutdown,
}

// Engine to Interface
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineMessage {
   BestMove { generation: u64, best_move: Option<Move> },
}
