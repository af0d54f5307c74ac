//! Storage traits consumed by the core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragbot_models::{Chunk, HistoryItem, Role, SessionInfo};

use crate::error::Result;

/// Durable collection of knowledge chunks with vector search.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert a chunk without an external id. Content is deduplicated:
    /// returns `None` when an identical chunk already exists.
    async fn add_chunk(&self, content: &str, source: &str) -> Result<Option<i64>>;

    /// Delete a chunk, returning its content. Errors with
    /// [`StoreError::ChunkNotFound`](crate::StoreError::ChunkNotFound)
    /// when the id does not exist.
    async fn delete_chunk(&self, id: i64) -> Result<String>;

    /// Replace a chunk's content. Resets embedding and `processed_at`
    /// so the indexer re-embeds it.
    async fn update_chunk(&self, id: i64, content: &str) -> Result<()>;

    /// Chunks with a null `processed_at`, up to `limit`.
    async fn unprocessed_chunks(&self, limit: i64) -> Result<Vec<Chunk>>;

    /// Store a computed embedding and mark the chunk processed.
    async fn set_chunk_embedding(&self, id: i64, embedding: &[f32]) -> Result<()>;

    /// Contents of the `k` embedded chunks nearest to `embedding`.
    /// Only chunks that have been processed participate.
    async fn nearest_chunks(&self, embedding: &[f32], k: i64) -> Result<Vec<String>>;

    /// Look up a feed row by its `(source, ext_id)` upsert key.
    async fn chunk_by_ext_id(
        &self,
        source: &str,
        ext_id: &str,
    ) -> Result<Option<(i64, DateTime<Utc>, String)>>;

    /// Insert a feed row with its external id and publish date.
    async fn insert_chunk_with_ext_id(
        &self,
        content: &str,
        source: &str,
        ext_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Full feed-row update: new content and date, embedding reset.
    async fn update_chunk_with_created_at(
        &self,
        id: i64,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Date-only bump for a feed row whose content did not change.
    /// Keeps the existing embedding, avoiding a spurious re-embed.
    async fn touch_chunk_created_at(&self, id: i64, created_at: DateTime<Utc>) -> Result<()>;
}

/// Durable per-chat sessions plus the append-only history log.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Get or create the session for `chat_id`, returning its link
    /// token. A non-empty `username` refreshes the stored handle.
    async fn ensure_session(&self, chat_id: i64, username: &str) -> Result<String>;

    async fn session_by_chat_id(&self, chat_id: i64) -> Result<SessionInfo>;

    async fn session_by_token(&self, token: &str) -> Result<SessionInfo>;

    /// Persist an LLM-produced dialogue digest onto the session.
    async fn update_summary(
        &self,
        chat_id: i64,
        summary: &str,
        title: &str,
        interest: &str,
    ) -> Result<()>;

    async fn update_name(&self, chat_id: i64, name: &str) -> Result<()>;

    async fn update_phone(&self, chat_id: i64, phone: &str) -> Result<()>;

    /// Set or clear (`None`) the external CRM contact id.
    async fn update_crm_contact_id(&self, chat_id: i64, contact_id: Option<i64>) -> Result<()>;

    async fn append_history(&self, chat_id: i64, role: Role, text: &str) -> Result<()>;

    /// The most recent `limit` turns, in chronological order. Returned
    /// by value; mutating the result must not affect later calls.
    async fn history(&self, chat_id: i64, limit: i64) -> Result<Vec<HistoryItem>>;

    /// Full chronological history for transcripts.
    async fn full_history(&self, chat_id: i64) -> Result<Vec<HistoryItem>>;

    /// Record a landing-page visit.
    async fn add_visit(&self, ip: &str, user_agent: &str, referer: &str) -> Result<()>;

    /// Number of distinct chats that ever sent a message.
    async fn count_unique_chats(&self) -> Result<i64>;

    /// Number of distinct chats where a callback was requested,
    /// identified by the synthetic history marker.
    async fn count_deals(&self, marker: &str) -> Result<i64>;
}
