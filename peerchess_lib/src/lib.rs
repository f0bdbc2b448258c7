pub mod board;
pub mod cozy;
pub mod engine;
pub mod error;
pub mod eval;
pub mod messages;
pub mod oracle;
pub mod peer;
pub mod session;
