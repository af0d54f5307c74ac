//! In-memory storage backend.
//!
//! Backs tests and keyless/offline runs. Mirrors the Postgres backend's
//! observable behavior: content dedup, embedded-only nearest-neighbor
//! search (L2, matching pgvector's `<->`), newest-N history windows.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragbot_models::{Chunk, HistoryItem, Role, SessionInfo};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::traits::{ChunkStore, ConversationStore};

#[derive(Default)]
struct Inner {
    chunks: Vec<Chunk>,
    next_chunk_id: i64,
    sessions: HashMap<i64, SessionInfo>,
    history: HashMap<i64, Vec<HistoryItem>>,
    visits: u64,
}

/// In-memory implementation of both storage traits.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks still waiting for an embedding.
    pub async fn unprocessed_count(&self) -> usize {
        self.inner
            .read()
            .await
            .chunks
            .iter()
            .filter(|c| c.needs_embedding())
            .count()
    }

    /// Snapshot a chunk by id (test helper).
    pub async fn chunk(&self, id: i64) -> Option<Chunk> {
        self.inner
            .read()
            .await
            .chunks
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub async fn visit_count(&self) -> u64 {
        self.inner.read().await.visits
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl ChunkStore for MemStore {
    async fn add_chunk(&self, content: &str, source: &str) -> Result<Option<i64>> {
        let mut inner = self.inner.write().await;
        if inner.chunks.iter().any(|c| c.content == content) {
            return Ok(None);
        }
        inner.next_chunk_id += 1;
        let id = inner.next_chunk_id;
        inner.chunks.push(Chunk {
            id,
            content: content.to_string(),
            source: source.to_string(),
            ext_id: None,
            embedding: None,
            processed_at: None,
            created_at: Utc::now(),
        });
        Ok(Some(id))
    }

    async fn delete_chunk(&self, id: i64) -> Result<String> {
        let mut inner = self.inner.write().await;
        let pos = inner
            .chunks
            .iter()
            .position(|c| c.id == id)
            .ok_or(StoreError::ChunkNotFound(id))?;
        Ok(inner.chunks.remove(pos).content)
    }

    async fn update_chunk(&self, id: i64, content: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let chunk = inner
            .chunks
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::ChunkNotFound(id))?;
        chunk.content = content.to_string();
        chunk.embedding = None;
        chunk.processed_at = None;
        Ok(())
    }

    async fn unprocessed_chunks(&self, limit: i64) -> Result<Vec<Chunk>> {
        let inner = self.inner.read().await;
        Ok(inner
            .chunks
            .iter()
            .filter(|c| c.needs_embedding())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn set_chunk_embedding(&self, id: i64, embedding: &[f32]) -> Result<()> {
        let mut inner = self.inner.write().await;
        let chunk = inner
            .chunks
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::ChunkNotFound(id))?;
        chunk.embedding = Some(embedding.to_vec());
        chunk.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn nearest_chunks(&self, embedding: &[f32], k: i64) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let mut scored: Vec<(f32, &Chunk)> = inner
            .chunks
            .iter()
            .filter(|c| c.processed_at.is_some())
            .filter_map(|c| c.embedding.as_ref().map(|e| (l2_distance(e, embedding), c)))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored
            .into_iter()
            .take(k as usize)
            .map(|(_, c)| c.content.clone())
            .collect())
    }

    async fn chunk_by_ext_id(
        &self,
        source: &str,
        ext_id: &str,
    ) -> Result<Option<(i64, DateTime<Utc>, String)>> {
        let inner = self.inner.read().await;
        Ok(inner
            .chunks
            .iter()
            .find(|c| c.source == source && c.ext_id.as_deref() == Some(ext_id))
            .map(|c| (c.id, c.created_at, c.content.clone())))
    }

    async fn insert_chunk_with_ext_id(
        &self,
        content: &str,
        source: &str,
        ext_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.next_chunk_id += 1;
        let id = inner.next_chunk_id;
        inner.chunks.push(Chunk {
            id,
            content: content.to_string(),
            source: source.to_string(),
            ext_id: Some(ext_id.to_string()),
            embedding: None,
            processed_at: None,
            created_at,
        });
        Ok(())
    }

    async fn update_chunk_with_created_at(
        &self,
        id: i64,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let chunk = inner
            .chunks
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::ChunkNotFound(id))?;
        chunk.content = content.to_string();
        chunk.created_at = created_at;
        chunk.embedding = None;
        chunk.processed_at = None;
        Ok(())
    }

    async fn touch_chunk_created_at(&self, id: i64, created_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let chunk = inner
            .chunks
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::ChunkNotFound(id))?;
        chunk.created_at = created_at;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemStore {
    async fn ensure_session(&self, chat_id: i64, username: &str) -> Result<String> {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.get_mut(&chat_id) {
            if !username.is_empty() {
                session.username = Some(username.to_string());
            }
            return Ok(session.id.clone());
        }
        let token = Uuid::new_v4().to_string();
        inner.sessions.insert(
            chat_id,
            SessionInfo {
                id: token.clone(),
                chat_id,
                username: (!username.is_empty()).then(|| username.to_string()),
                ..SessionInfo::default()
            },
        );
        Ok(token)
    }

    async fn session_by_chat_id(&self, chat_id: i64) -> Result<SessionInfo> {
        self.inner
            .read()
            .await
            .sessions
            .get(&chat_id)
            .cloned()
            .ok_or(StoreError::SessionNotFound(chat_id))
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionInfo> {
        self.inner
            .read()
            .await
            .sessions
            .values()
            .find(|s| s.id == token)
            .cloned()
            .ok_or_else(|| StoreError::TokenNotFound(token.to_string()))
    }

    async fn update_summary(
        &self,
        chat_id: i64,
        summary: &str,
        title: &str,
        interest: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&chat_id)
            .ok_or(StoreError::SessionNotFound(chat_id))?;
        session.summary = Some(summary.to_string());
        session.title = Some(title.to_string());
        session.interest = Some(interest.to_string());
        Ok(())
    }

    async fn update_name(&self, chat_id: i64, name: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&chat_id)
            .ok_or(StoreError::SessionNotFound(chat_id))?;
        session.name = Some(name.to_string());
        Ok(())
    }

    async fn update_phone(&self, chat_id: i64, phone: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&chat_id)
            .ok_or(StoreError::SessionNotFound(chat_id))?;
        session.phone = Some(phone.to_string());
        Ok(())
    }

    async fn update_crm_contact_id(&self, chat_id: i64, contact_id: Option<i64>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&chat_id)
            .ok_or(StoreError::SessionNotFound(chat_id))?;
        session.crm_contact_id = contact_id;
        Ok(())
    }

    async fn append_history(&self, chat_id: i64, role: Role, text: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .history
            .entry(chat_id)
            .or_default()
            .push(HistoryItem::new(role, text));
        Ok(())
    }

    async fn history(&self, chat_id: i64, limit: i64) -> Result<Vec<HistoryItem>> {
        let inner = self.inner.read().await;
        let items = match inner.history.get(&chat_id) {
            Some(items) => items,
            None => return Ok(Vec::new()),
        };
        let start = items.len().saturating_sub(limit as usize);
        Ok(items[start..].to_vec())
    }

    async fn full_history(&self, chat_id: i64) -> Result<Vec<HistoryItem>> {
        let inner = self.inner.read().await;
        Ok(inner.history.get(&chat_id).cloned().unwrap_or_default())
    }

    async fn add_visit(&self, _ip: &str, _user_agent: &str, _referer: &str) -> Result<()> {
        self.inner.write().await.visits += 1;
        Ok(())
    }

    async fn count_unique_chats(&self) -> Result<i64> {
        Ok(self.inner.read().await.history.len() as i64)
    }

    async fn count_deals(&self, marker: &str) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .history
            .values()
            .filter(|items| items.iter().any(|h| h.content == marker))
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_returns_most_recent_window_in_order() {
        let store = MemStore::new();
        for i in 0..25 {
            store
                .append_history(1, Role::User, &format!("msg{}", i))
                .await
                .unwrap();
        }

        let items = store.history(1, 20).await.unwrap();
        assert_eq!(items.len(), 20);
        assert_eq!(items[0].content, "msg5");
        assert_eq!(items[19].content, "msg24");
    }

    #[tokio::test]
    async fn history_result_is_a_copy() {
        let store = MemStore::new();
        store.append_history(1, Role::User, "hello").await.unwrap();

        let mut items = store.history(1, 20).await.unwrap();
        items[0].content = "mutated".to_string();

        let again = store.history(1, 20).await.unwrap();
        assert_eq!(again[0].content, "hello");
    }

    #[tokio::test]
    async fn history_is_isolated_per_chat() {
        let store = MemStore::new();
        store.append_history(1, Role::User, "a").await.unwrap();
        store.append_history(2, Role::User, "b").await.unwrap();

        assert_eq!(store.history(1, 20).await.unwrap().len(), 1);
        assert_eq!(store.history(2, 20).await.unwrap().len(), 1);
        assert_eq!(store.count_unique_chats().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn add_chunk_deduplicates_content() {
        let store = MemStore::new();
        let first = store.add_chunk("Сальса по вторникам", "admin").await.unwrap();
        assert!(first.is_some());
        let second = store.add_chunk("Сальса по вторникам", "admin").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn delete_missing_chunk_reports_not_found() {
        let store = MemStore::new();
        store.add_chunk("что-то", "admin").await.unwrap();

        let err = store.delete_chunk(7).await.unwrap_err();
        assert!(matches!(err, StoreError::ChunkNotFound(7)));
        // Other chunks are unaffected.
        assert_eq!(store.unprocessed_count().await, 1);
    }

    #[tokio::test]
    async fn nearest_chunks_ignores_unembedded() {
        let store = MemStore::new();
        let a = store.add_chunk("a", "admin").await.unwrap().unwrap();
        store.add_chunk("b", "admin").await.unwrap();

        store.set_chunk_embedding(a, &[1.0, 0.0]).await.unwrap();

        let found = store.nearest_chunks(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(found, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn nearest_chunks_orders_by_distance() {
        let store = MemStore::new();
        let far = store.add_chunk("far", "admin").await.unwrap().unwrap();
        let near = store.add_chunk("near", "admin").await.unwrap().unwrap();
        store.set_chunk_embedding(far, &[10.0, 0.0]).await.unwrap();
        store.set_chunk_embedding(near, &[1.0, 0.0]).await.unwrap();

        let found = store.nearest_chunks(&[0.0, 0.0], 2).await.unwrap();
        assert_eq!(found, vec!["near".to_string(), "far".to_string()]);
    }

    #[tokio::test]
    async fn update_chunk_resets_embedding() {
        let store = MemStore::new();
        let id = store.add_chunk("old", "admin").await.unwrap().unwrap();
        store.set_chunk_embedding(id, &[0.5]).await.unwrap();
        assert_eq!(store.unprocessed_count().await, 0);

        store.update_chunk(id, "new").await.unwrap();
        let chunk = store.chunk(id).await.unwrap();
        assert!(chunk.needs_embedding());
        assert!(chunk.embedding.is_none());
        assert_eq!(chunk.content, "new");
    }

    #[tokio::test]
    async fn ensure_session_is_idempotent_and_refreshes_username() {
        let store = MemStore::new();
        let token = store.ensure_session(5, "").await.unwrap();
        let again = store.ensure_session(5, "dancer").await.unwrap();
        assert_eq!(token, again);

        let info = store.session_by_chat_id(5).await.unwrap();
        assert_eq!(info.username.as_deref(), Some("dancer"));

        let by_token = store.session_by_token(&token).await.unwrap();
        assert_eq!(by_token.chat_id, 5);
    }

    #[tokio::test]
    async fn count_deals_matches_marker_per_chat() {
        let store = MemStore::new();
        let marker = "** хочет, чтобы ему перезвонили **";
        store.append_history(1, Role::User, marker).await.unwrap();
        store.append_history(1, Role::User, marker).await.unwrap();
        store.append_history(2, Role::User, "привет").await.unwrap();

        assert_eq!(store.count_deals(marker).await.unwrap(), 1);
    }
}
