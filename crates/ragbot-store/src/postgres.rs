//! Postgres + pgvector storage backend.
//!
//! Schema and queries follow the shape the rest of the workspace
//! expects: `chunks` with a `vector` column ordered by the `<->`
//! distance operator, `conversations` keyed by chat id with a uuid
//! link token, and an append-only `conversation_history` log whose
//! serial id provides per-chat ordering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use ragbot_models::{Chunk, HistoryItem, Role, SessionInfo};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::traits::{ChunkStore, ConversationStore};

/// Embedding dimensionality of the `vector` column. Must match the
/// embedding model in use.
const EMBEDDING_DIM: usize = 1536;

/// Postgres implementation of both storage traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database and bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        info!("Connected to Postgres and verified schema");
        Ok(store)
    }

    /// Wrap an existing pool (tests, migrations).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS chunks (
                id           BIGSERIAL PRIMARY KEY,
                content      TEXT NOT NULL UNIQUE,
                source       TEXT NOT NULL DEFAULT 'admin',
                ext_id       TEXT,
                embedding    vector({EMBEDDING_DIM}),
                processed_at TIMESTAMPTZ,
                created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                uuid           TEXT PRIMARY KEY,
                chat_id        BIGINT NOT NULL UNIQUE,
                username       TEXT,
                name           TEXT,
                phone          TEXT,
                summary        TEXT,
                title          TEXT,
                interest       TEXT,
                crm_contact_id BIGINT,
                updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversation_history (
                id         BIGSERIAL PRIMARY KEY,
                chat_id    BIGINT NOT NULL,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS visits (
                id         BIGSERIAL PRIMARY KEY,
                ip         TEXT,
                user_agent TEXT,
                referer    TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_session(row: &sqlx::postgres::PgRow, chat_id: i64) -> Result<SessionInfo> {
        Ok(SessionInfo {
            id: row.try_get("uuid")?,
            chat_id,
            username: row.try_get("username")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            summary: row.try_get("summary")?,
            title: row.try_get("title")?,
            interest: row.try_get("interest")?,
            crm_contact_id: row.try_get("crm_contact_id")?,
        })
    }

    fn rows_to_history(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<HistoryItem>> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.try_get("role")?;
            let role = role.parse::<Role>().unwrap_or(Role::Assistant);
            items.push(HistoryItem::new(role, row.try_get::<String, _>("content")?));
        }
        Ok(items)
    }
}

#[async_trait]
impl ChunkStore for PgStore {
    async fn add_chunk(&self, content: &str, source: &str) -> Result<Option<i64>> {
        let row = sqlx::query(
            "INSERT INTO chunks(content, source) VALUES ($1, $2)
             ON CONFLICT (content) DO NOTHING RETURNING id",
        )
        .bind(content)
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("id")?)),
            None => Ok(None),
        }
    }

    async fn delete_chunk(&self, id: i64) -> Result<String> {
        let row = sqlx::query("DELETE FROM chunks WHERE id = $1 RETURNING content")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::ChunkNotFound(id))?;
        Ok(row.try_get("content")?)
    }

    async fn update_chunk(&self, id: i64, content: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE chunks SET content = $1, embedding = NULL, processed_at = NULL WHERE id = $2",
        )
        .bind(content)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ChunkNotFound(id));
        }
        Ok(())
    }

    async fn unprocessed_chunks(&self, limit: i64) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, content, source, ext_id, created_at FROM chunks
             WHERE processed_at IS NULL ORDER BY id LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in rows {
            chunks.push(Chunk {
                id: row.try_get("id")?,
                content: row.try_get("content")?,
                source: row.try_get("source")?,
                ext_id: row.try_get("ext_id")?,
                embedding: None,
                processed_at: None,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(chunks)
    }

    async fn set_chunk_embedding(&self, id: i64, embedding: &[f32]) -> Result<()> {
        sqlx::query("UPDATE chunks SET embedding = $1, processed_at = NOW() WHERE id = $2")
            .bind(Vector::from(embedding.to_vec()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn nearest_chunks(&self, embedding: &[f32], k: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT content FROM chunks WHERE processed_at IS NOT NULL
             ORDER BY embedding <-> $1 LIMIT $2",
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(k)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| r.try_get::<String, _>("content").map_err(StoreError::from))
            .collect()
    }

    async fn chunk_by_ext_id(
        &self,
        source: &str,
        ext_id: &str,
    ) -> Result<Option<(i64, DateTime<Utc>, String)>> {
        let row = sqlx::query(
            "SELECT id, created_at, content FROM chunks WHERE source = $1 AND ext_id = $2",
        )
        .bind(source)
        .bind(ext_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some((
                row.try_get("id")?,
                row.try_get("created_at")?,
                row.try_get("content")?,
            ))),
            None => Ok(None),
        }
    }

    async fn insert_chunk_with_ext_id(
        &self,
        content: &str,
        source: &str,
        ext_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO chunks(content, source, ext_id, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(content)
        .bind(source)
        .bind(ext_id)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_chunk_with_created_at(
        &self,
        id: i64,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE chunks SET content = $1, created_at = $2, embedding = NULL,
             processed_at = NULL WHERE id = $3",
        )
        .bind(content)
        .bind(created_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_chunk_created_at(&self, id: i64, created_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE chunks SET created_at = $1 WHERE id = $2")
            .bind(created_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn ensure_session(&self, chat_id: i64, username: &str) -> Result<String> {
        let existing = sqlx::query("SELECT uuid FROM conversations WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = existing {
            if !username.is_empty() {
                sqlx::query("UPDATE conversations SET username = $1 WHERE chat_id = $2")
                    .bind(username)
                    .bind(chat_id)
                    .execute(&self.pool)
                    .await?;
            }
            return Ok(row.try_get("uuid")?);
        }

        let token = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO conversations(uuid, chat_id, username) VALUES ($1, $2, NULLIF($3, ''))
             ON CONFLICT (chat_id) DO NOTHING",
        )
        .bind(&token)
        .bind(chat_id)
        .bind(username)
        .execute(&self.pool)
        .await?;

        // A concurrent insert may have won the conflict; read back the
        // authoritative token.
        let row = sqlx::query("SELECT uuid FROM conversations WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("uuid")?)
    }

    async fn session_by_chat_id(&self, chat_id: i64) -> Result<SessionInfo> {
        let row = sqlx::query(
            "SELECT uuid, username, name, phone, summary, title, interest, crm_contact_id
             FROM conversations WHERE chat_id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::SessionNotFound(chat_id))?;
        Self::row_to_session(&row, chat_id)
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionInfo> {
        let row = sqlx::query(
            "SELECT uuid, chat_id, username, name, phone, summary, title, interest, crm_contact_id
             FROM conversations WHERE uuid = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::TokenNotFound(token.to_string()))?;
        let chat_id: i64 = row.try_get("chat_id")?;
        Self::row_to_session(&row, chat_id)
    }

    async fn update_summary(
        &self,
        chat_id: i64,
        summary: &str,
        title: &str,
        interest: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE conversations SET summary = $1, title = $2, interest = $3,
             updated_at = NOW() WHERE chat_id = $4",
        )
        .bind(summary)
        .bind(title)
        .bind(interest)
        .bind(chat_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_name(&self, chat_id: i64, name: &str) -> Result<()> {
        sqlx::query("UPDATE conversations SET name = $1, updated_at = NOW() WHERE chat_id = $2")
            .bind(name)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_phone(&self, chat_id: i64, phone: &str) -> Result<()> {
        sqlx::query("UPDATE conversations SET phone = $1, updated_at = NOW() WHERE chat_id = $2")
            .bind(phone)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_crm_contact_id(&self, chat_id: i64, contact_id: Option<i64>) -> Result<()> {
        sqlx::query(
            "UPDATE conversations SET crm_contact_id = $1, updated_at = NOW() WHERE chat_id = $2",
        )
        .bind(contact_id)
        .bind(chat_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_history(&self, chat_id: i64, role: Role, text: &str) -> Result<()> {
        sqlx::query("INSERT INTO conversation_history(chat_id, role, content) VALUES ($1, $2, $3)")
            .bind(chat_id)
            .bind(role.as_str())
            .bind(text)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn history(&self, chat_id: i64, limit: i64) -> Result<Vec<HistoryItem>> {
        let rows = sqlx::query(
            "SELECT role, content FROM conversation_history
             WHERE chat_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(chat_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        // Rows come newest-first; reverse to chronological.
        let mut items = Self::rows_to_history(rows)?;
        items.reverse();
        Ok(items)
    }

    async fn full_history(&self, chat_id: i64) -> Result<Vec<HistoryItem>> {
        let rows = sqlx::query(
            "SELECT role, content FROM conversation_history WHERE chat_id = $1 ORDER BY id ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Self::rows_to_history(rows)
    }

    async fn add_visit(&self, ip: &str, user_agent: &str, referer: &str) -> Result<()> {
        sqlx::query("INSERT INTO visits(ip, user_agent, referer) VALUES ($1, $2, $3)")
            .bind(ip)
            .bind(user_agent)
            .bind(referer)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_unique_chats(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(DISTINCT chat_id) AS n FROM conversation_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn count_deals(&self, marker: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT chat_id) AS n FROM conversation_history WHERE content = $1",
        )
        .bind(marker)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("n")?)
    }
}
