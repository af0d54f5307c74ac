//! Storage layer for ragbot.
//!
//! Defines the [`ChunkStore`] and [`ConversationStore`] traits consumed
//! by the core, with two backends: [`PgStore`] (Postgres + pgvector,
//! production) and [`MemStore`] (in-memory, tests and offline runs).
//! Nearest-neighbor search is delegated to the backend's distance
//! operator; this crate implements no vector index of its own.

mod error;
mod memory;
mod postgres;
mod traits;

pub use error::{Result, StoreError};
pub use memory::MemStore;
pub use postgres::PgStore;
pub use traits::{ChunkStore, ConversationStore};
