//! SQLite implementation of [`KnowledgeStore`].
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE knowledge (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,  -- never reused
//!     key_text TEXT NOT NULL,                -- short label matched by the gate
//!     content TEXT NOT NULL,                 -- knowledge body
//!     created_at TIMESTAMP NOT NULL,
//!     last_accessed TIMESTAMP,               -- NULL until first returned by a search
//!     access_count INTEGER NOT NULL DEFAULT 0
//! );
//! ```
//!
//! ## Locking
//!
//! Every read and write, including single-row lookups, goes through one async mutex.
//! SQLite already makes single statements atomic; the mutex additionally keeps
//! the multi-row `record_access` transaction and the scans from interleaving,
//! which is the ordering the retrieval index relies on when it rebuilds its
//! keyword cache right after an insert.
//!
//! File databases use WAL mode with a busy timeout, like the other SQLite
//! databases in this workspace. In-memory databases are pinned to a single
//! pooled connection so the data lives as long as the store.

use super::{EntryId, KnowledgeEntry, KnowledgeStore, validate_entry};
use crate::clock::{Clock, SystemClock};
use crate::config::RetrieverConfig;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// SQLite-backed knowledge store. See module docs for the schema.
pub struct SqliteStore {
    path: Option<PathBuf>,
    pool: SqlitePool,
    lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Opens the database named by `config`, creating the directory and file if needed.
    pub async fn open(config: &RetrieverConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.base_dir).await?;
        Self::open_path(&config.database_path()).await
    }

    /// Opens a persistent database at an explicit file path.
    pub async fn open_path(db_path: &Path) -> Result<Self> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(5))
                .create_if_missing(true),
        )
        .await?;
        info!("Opened knowledge database at {}", db_path.display());
        Self::new_with_pool(pool, Some(db_path.to_path_buf())).await
    }

    /// Opens an in-memory database for testing.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool, None).await
    }

    async fn new_with_pool(pool: SqlitePool, path: Option<PathBuf>) -> Result<Self> {
        Self::create_tables(&pool).await?;

        Ok(Self {
            path,
            pool,
            lock: Mutex::new(()),
            clock: Arc::new(SystemClock),
        })
    }

    /// Use `clock` for `created_at` stamps instead of the system time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key_text TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                last_accessed TIMESTAMP,
                access_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_knowledge_key_text ON knowledge(key_text)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Database file backing this store, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<KnowledgeEntry> {
    Ok(KnowledgeEntry {
        id: row.try_get("id")?,
        key_text: row.try_get("key_text")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        last_accessed: row.try_get("last_accessed")?,
        access_count: row.try_get("access_count")?,
    })
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn insert(&self, key_text: &str, content: &str) -> Result<EntryId> {
        validate_entry(key_text, content)?;

        let _guard = self.lock.lock().await;
        let result = sqlx::query(
            r#"
            INSERT INTO knowledge (key_text, content, created_at, access_count)
            VALUES (?1, ?2, ?3, 0)
            "#,
        )
        .bind(key_text)
        .bind(content)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, key_text, "Inserted knowledge entry");
        Ok(id)
    }

    async fn all_entries(&self) -> Result<Vec<KnowledgeEntry>> {
        let _guard = self.lock.lock().await;
        let rows = sqlx::query(
            "SELECT id, key_text, content, created_at, last_accessed, access_count
             FROM knowledge ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn distinct_key_texts(&self) -> Result<HashSet<String>> {
        let _guard = self.lock.lock().await;
        let keys = sqlx::query_scalar::<_, String>("SELECT DISTINCT key_text FROM knowledge")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys.into_iter().collect())
    }

    async fn record_access(&self, ids: &[EntryId], at: DateTime<Utc>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut seen = HashSet::new();

        for &id in ids {
            if !seen.insert(id) {
                continue;
            }
            let result = sqlx::query(
                "UPDATE knowledge
                 SET last_accessed = ?1, access_count = access_count + 1
                 WHERE id = ?2",
            )
            .bind(at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                debug!(id, "Skipping access update for unknown entry");
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_entry(&self, id: EntryId) -> Result<Option<KnowledgeEntry>> {
        let _guard = self.lock.lock().await;
        let row = sqlx::query(
            "SELECT id, key_text, content, created_at, last_accessed, access_count
             FROM knowledge WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn entry_count(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
