//! Durable stream cursor: the bookmark of indexing progress.
//!
//! The cursor is advanced only after the corresponding block's events are
//! fully written or skipped, and persisted before the next block is
//! requested. Reprocessing after a crash is safe (writers dedup); silent
//! gaps are not, so a cursor is never committed past a block with an
//! unresolved write.

use anyhow::{bail, Context, Result};
use sqlx::{any::AnyPoolOptions, Any, Pool, Row};
use std::path::Path;
use std::str::FromStr;

/// Embedded cursor table schema (portable DDL, SQLite and Postgres).
const CURSOR_SCHEMA_SQL: &str = include_str!("../../sql/cursor_schema.sql");

/// How confirmed the blocks behind the cursor are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finality {
    Pending,
    Accepted,
    Finalized,
}

impl Finality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for Finality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Finality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "finalized" => Ok(Self::Finalized),
            other => Err(format!("unknown finality tier: {other}")),
        }
    }
}

/// Last durably-processed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub block_number: u64,
    pub block_hash: String,
    pub finality: Finality,
}

impl Cursor {
    /// Synthetic cursor pointing just below `first_block`, so a fresh
    /// subscription starts exactly at the configured genesis height.
    /// Callers pass no cursor at all for `first_block == 0`.
    pub fn genesis(first_block: u64, finality: Finality) -> Self {
        Self {
            block_number: first_block.saturating_sub(1),
            block_hash: "0x0".to_string(),
            finality,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct CursorStoreConfig {
    /// SQLite path or `postgres://` URL.
    pub url: String,
}

/// SQL-backed cursor persistence, one row per indexer identity. At most one
/// process may own a given identity; the store itself does not arbitrate.
pub struct CursorStore {
    pool: Pool<Any>,
    backend: DbBackend,
}

impl CursorStore {
    pub async fn connect(config: CursorStoreConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let backend = if config.url.starts_with("postgres://")
            || config.url.starts_with("postgresql://")
        {
            DbBackend::Postgres
        } else {
            DbBackend::Sqlite
        };

        let is_memory = config.url == ":memory:" || config.url == "sqlite::memory:";

        // Ensure parent directory exists for sqlite file databases.
        if backend == DbBackend::Sqlite && !is_memory && !config.url.starts_with("sqlite:") {
            if let Some(parent) = Path::new(&config.url).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create directory: {}", parent.display()))?;
            }
        }

        let database_url = match backend {
            DbBackend::Postgres => config.url.clone(),
            DbBackend::Sqlite => {
                if is_memory {
                    "sqlite::memory:".to_string()
                } else if config.url.starts_with("sqlite:") {
                    config.url.clone()
                } else {
                    format!("sqlite://{}?mode=rwc", config.url)
                }
            }
        };

        // A shared in-memory sqlite database only exists per-connection.
        let max_connections = if is_memory { 1 } else { 5 };

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(&database_url)
            .await
            .context("failed to connect to cursor store")?;

        let store = Self { pool, backend };
        store.init_schema().await?;
        Ok(store)
    }

    fn sql<'a>(&self, sqlite: &'a str, postgres: &'a str) -> &'a str {
        match self.backend {
            DbBackend::Sqlite => sqlite,
            DbBackend::Postgres => postgres,
        }
    }

    async fn init_schema(&self) -> Result<()> {
        if self.backend == DbBackend::Sqlite {
            sqlx::query("PRAGMA journal_mode=WAL")
                .execute(&self.pool)
                .await?;
            sqlx::query("PRAGMA synchronous=NORMAL")
                .execute(&self.pool)
                .await?;
        }

        for statement in CURSOR_SCHEMA_SQL.split(';') {
            let statement = statement.trim();
            if statement.is_empty() || statement.starts_with("--") {
                continue;
            }
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("failed to initialize cursor schema")?;
        }

        tracing::debug!(target: "ember::cursor", "cursor store schema initialized");
        Ok(())
    }

    /// Load the persisted cursor for an indexer identity, if any.
    pub async fn load(&self, indexer_id: &str) -> Result<Option<Cursor>> {
        let query = self.sql(
            "SELECT block_number, block_hash, finality FROM indexer_cursor WHERE indexer_id = ?",
            "SELECT block_number, block_hash, finality FROM indexer_cursor WHERE indexer_id = $1",
        );

        let row = sqlx::query(query)
            .bind(indexer_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load cursor")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let block_number: i64 = row.try_get("block_number")?;
        let block_hash: String = row.try_get("block_hash")?;
        let finality_str: String = row.try_get("finality")?;
        let Ok(finality) = finality_str.parse::<Finality>() else {
            bail!("corrupt cursor row for {indexer_id}: finality `{finality_str}`");
        };

        Ok(Some(Cursor {
            block_number: block_number as u64,
            block_hash,
            finality,
        }))
    }

    /// Durably record the cursor for an indexer identity.
    pub async fn commit(&self, indexer_id: &str, cursor: &Cursor) -> Result<()> {
        let query = self.sql(
            "INSERT INTO indexer_cursor (indexer_id, block_number, block_hash, finality, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(indexer_id) DO UPDATE SET \
             block_number = excluded.block_number, block_hash = excluded.block_hash, \
             finality = excluded.finality, updated_at = excluded.updated_at",
            "INSERT INTO indexer_cursor (indexer_id, block_number, block_hash, finality, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT(indexer_id) DO UPDATE SET \
             block_number = excluded.block_number, block_hash = excluded.block_hash, \
             finality = excluded.finality, updated_at = excluded.updated_at",
        );

        sqlx::query(query)
            .bind(indexer_id)
            .bind(cursor.block_number as i64)
            .bind(&cursor.block_hash)
            .bind(cursor.finality.as_str())
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to commit cursor for {indexer_id}"))?;

        tracing::debug!(
            target: "ember::cursor",
            indexer_id,
            block_number = cursor.block_number,
            "cursor committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (CursorStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("cursor.db").to_string_lossy().to_string();
        let store = CursorStore::connect(CursorStoreConfig { url }).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn load_returns_none_for_fresh_identity() {
        let (store, _dir) = temp_store().await;
        assert_eq!(store.load("launchpad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn commit_then_load_round_trips() {
        let (store, _dir) = temp_store().await;
        let cursor = Cursor {
            block_number: 1234,
            block_hash: "0xabc".to_string(),
            finality: Finality::Accepted,
        };
        store.commit("launchpad", &cursor).await.unwrap();
        assert_eq!(store.load("launchpad").await.unwrap(), Some(cursor.clone()));

        // Re-commit overwrites in place.
        let later = Cursor {
            block_number: 1240,
            ..cursor
        };
        store.commit("launchpad", &later).await.unwrap();
        assert_eq!(store.load("launchpad").await.unwrap(), Some(later));
    }

    #[tokio::test]
    async fn identities_are_independent() {
        let (store, _dir) = temp_store().await;
        let cursor = Cursor {
            block_number: 5,
            block_hash: "0x1".to_string(),
            finality: Finality::Pending,
        };
        store.commit("dao", &cursor).await.unwrap();
        assert_eq!(store.load("launchpad").await.unwrap(), None);
        assert_eq!(store.load("dao").await.unwrap(), Some(cursor));
    }

    #[test]
    fn genesis_points_just_below_first_block() {
        let genesis = Cursor::genesis(100, Finality::Accepted);
        assert_eq!(genesis.block_number, 99);
        // first_block == 0 callers pass no cursor instead; saturation keeps
        // the constructor total anyway.
        assert_eq!(Cursor::genesis(0, Finality::Accepted).block_number, 0);
    }
}
