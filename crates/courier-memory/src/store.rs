//! MemoryStore: SQLite persistence for remembered facts and the
//! per-user message log.
//!
//! Tables: `memories`, `messages`.

use crate::category::MemoryCategory;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

/// One remembered fact.
#[derive(Debug, Clone)]
pub struct Memory {
    /// Unique id
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Category the fact is filed under
    pub category: MemoryCategory,
    /// The fact itself
    pub content: String,
    /// When it was stored
    pub created_at: DateTime<Utc>,
}

/// One logged conversation message.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Unique id
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// "user" or "assistant"
    pub role: String,
    /// Message text
    pub content: String,
    /// When it was logged
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed memory store.
#[derive(Clone)]
pub struct MemoryStore {
    pool: SqlitePool,
}

impl MemoryStore {
    /// Open (or create) a store at the given path.
    pub async fn from_path(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Internal(format!("mkdir: {e}")))?;
        }
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        // Enable WAL for read/write concurrency
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Memory store initialized at {}", db_path.display());
        Ok(store)
    }

    /// In-memory store (for tests).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        debug!("In-memory store initialized");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS memories (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                category   TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_memories_user
             ON memories(user_id, category)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_user
             ON messages(user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store one remembered fact and return it.
    pub async fn save_memory(
        &self,
        user_id: &str,
        category: MemoryCategory,
        content: &str,
    ) -> Result<Memory> {
        let memory = Memory {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            category,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO memories (id, user_id, category, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&memory.id)
        .bind(&memory.user_id)
        .bind(memory.category.as_str())
        .bind(&memory.content)
        .bind(memory.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(user = %user_id, category = %category, "Memory saved");
        Ok(memory)
    }

    /// Facts for a user, optionally restricted to one category,
    /// oldest first.
    pub async fn list_memories(
        &self,
        user_id: &str,
        category: Option<MemoryCategory>,
    ) -> Result<Vec<Memory>> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    "SELECT id, user_id, category, content, created_at
                     FROM memories WHERE user_id = ?1 AND category = ?2
                     ORDER BY created_at",
                )
                .bind(user_id)
                .bind(category.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, user_id, category, content, created_at
                     FROM memories WHERE user_id = ?1 ORDER BY created_at",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::row_to_memory).collect()
    }

    /// Append one message to the user's conversation log.
    pub async fn log_message(&self, user_id: &str, role: &str, content: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (id, user_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(role)
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The user's most recent messages, oldest first.
    pub async fn recent_messages(&self, user_id: &str, limit: u32) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query(
            "SELECT id, user_id, role, content, created_at FROM (
                SELECT id, user_id, role, content, created_at
                FROM messages WHERE user_id = ?1
                ORDER BY created_at DESC LIMIT ?2
             ) ORDER BY created_at",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(StoredMessage {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    role: row.try_get("role")?,
                    content: row.try_get("content")?,
                    created_at: parse_timestamp(row.try_get::<String, _>("created_at")?),
                })
            })
            .collect()
    }

    fn row_to_memory(row: &sqlx::sqlite::SqliteRow) -> Result<Memory> {
        let category: String = row.try_get("category")?;
        Ok(Memory {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            category: MemoryCategory::parse(&category),
            content: row.try_get("content")?,
            created_at: parse_timestamp(row.try_get::<String, _>("created_at")?),
        })
    }
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
