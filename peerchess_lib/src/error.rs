use crate::peer::ChannelState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
   #[error("invalid FEN: {0}")]
   InvalidFen(String),
   #[error("invalid move: {0}")]
   InvalidMove(String),
   #[error("invalid square: {0}")]
   InvalidSquare(String),
   #[error("malformed peer message: {0}")]
   Parse(#[from] serde_json::Error),
   #[error("peer transport failure: {0}")]
   Io(#[from] std::io::Error),
   #[error("peer channel can't go from {from:?} to {to:?}")]
   ChannelState { from: ChannelState, to: ChannelState },
   #[error("not connected to a peer")]
   NotConnected,
}

pub type Result<T> = std::result::Result<T, Error>;
