//! SQLite persistence using rusqlite behind a deadpool-sqlite pool
//!
//! One database file holds the long-term memories and the known-handles
//! registry. The schema is created on open; there are no migrations yet.

use super::codec::{decode_embedding, encode_embedding};
use super::{HandleRegistry, MemoryRepository};
use crate::error::{KairosError, Result};
use crate::types::{LongTermMemory, MemoryId, NewMemory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_sqlite::{Config, Pool, Runtime};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS long_term_memories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    significance_score REAL NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS known_handles (
    handle TEXT PRIMARY KEY,
    first_seen TEXT NOT NULL
);
";

/// Pooled SQLite repository
pub struct SqliteRepository {
    pool: Pool,
}

/// A row before its blob and timestamp are decoded
struct RawMemory {
    id: i64,
    content: String,
    embedding: Vec<u8>,
    significance_score: f64,
    created_at: String,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `db_path`
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening memory database at: {}", path.display());

        let pool = Config::new(path)
            .create_pool(Runtime::Tokio1)
            .map_err(|e| KairosError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let repo = Self { pool };
        repo.interact(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(repo)
    }

    /// Run `f` on a pooled connection
    async fn interact<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.pool.get().await.map_err(|e| {
            KairosError::Storage(format!("Failed to get connection from pool: {}", e))
        })?;

        conn.interact(f)
            .await
            .map_err(|e| KairosError::Storage(format!("Pool interaction failed: {}", e)))?
    }
}

fn decode_row(raw: RawMemory) -> Result<LongTermMemory> {
    let created_at = DateTime::parse_from_rfc3339(&raw.created_at)
        .map_err(|e| {
            KairosError::Storage(format!("memory {} has bad timestamp: {}", raw.id, e))
        })?
        .with_timezone(&Utc);

    Ok(LongTermMemory {
        id: MemoryId(raw.id),
        content: raw.content,
        embedding: decode_embedding(&raw.embedding)?,
        significance_score: raw.significance_score as f32,
        created_at,
    })
}

#[async_trait]
impl MemoryRepository for SqliteRepository {
    async fn append(&self, memory: NewMemory) -> Result<LongTermMemory> {
        let created_at = Utc::now();
        let blob = encode_embedding(&memory.embedding);
        let timestamp = created_at.to_rfc3339();
        let content = memory.content.clone();
        let score = memory.significance_score as f64;

        let id = self
            .interact(move |conn| {
                conn.execute(
                    "INSERT INTO long_term_memories (content, embedding, significance_score, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![content, blob, score, timestamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!("Stored long-term memory {}", id);

        Ok(LongTermMemory {
            id: MemoryId(id),
            content: memory.content,
            embedding: memory.embedding,
            significance_score: memory.significance_score,
            created_at,
        })
    }

    async fn list_all(&self) -> Result<Vec<LongTermMemory>> {
        let rows = self
            .interact(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, content, embedding, significance_score, created_at
                     FROM long_term_memories ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(RawMemory {
                            id: row.get(0)?,
                            content: row.get(1)?,
                            embedding: row.get(2)?,
                            significance_score: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(decode_row).collect()
    }

    async fn count(&self) -> Result<usize> {
        self.interact(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM long_term_memories", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

#[async_trait]
impl HandleRegistry for SqliteRepository {
    async fn filter_unknown(&self, handles: &[String]) -> Result<Vec<String>> {
        let handles = handles.to_vec();
        self.interact(move |conn| {
            let mut stmt = conn.prepare("SELECT 1 FROM known_handles WHERE handle = ?1")?;
            let mut unknown = Vec::new();
            for handle in handles {
                if !stmt.exists([handle.to_lowercase()])? {
                    unknown.push(handle);
                }
            }
            Ok(unknown)
        })
        .await
    }

    async fn remember(&self, handles: &[String]) -> Result<()> {
        let handles = handles.to_vec();
        let now = Utc::now().to_rfc3339();
        self.interact(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO known_handles (handle, first_seen) VALUES (?1, ?2)",
                )?;
                for handle in &handles {
                    stmt.execute(rusqlite::params![handle.to_lowercase(), now])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
