//! Shared data types for the ragbot workspace.

mod chunk;
mod conversation;

pub use chunk::Chunk;
pub use conversation::{ContactStage, ContactState, HistoryItem, Role, SessionInfo};
