//! Knowledge-base chunk model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored, independently retrievable fragment of knowledge-base text.
///
/// A chunk enters the store without an embedding; the embedding indexer
/// fills `embedding` and `processed_at` asynchronously. Editing a chunk
/// resets both to `None` so it is picked up again on the next pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable store-assigned identifier.
    pub id: i64,

    /// Fragment text. Unique within the store.
    pub content: String,

    /// Origin tag: "admin", a file path, "yandex.yml", ...
    pub source: String,

    /// External identifier for feed rows; `(source, ext_id)` is the
    /// upsert key for periodic feeds.
    pub ext_id: Option<String>,

    /// Embedding vector, present once the indexer has processed the chunk.
    pub embedding: Option<Vec<f32>>,

    /// Set when the embedding was computed.
    pub processed_at: Option<DateTime<Utc>>,

    /// Creation time; for feed rows this is the feed's publish date.
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Whether the indexer still has to embed this chunk.
    pub fn needs_embedding(&self) -> bool {
        self.processed_at.is_none()
    }
}
