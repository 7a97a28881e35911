//! SQLite pool for the session store
//!
//! Pool size, lock timeout and journal mode come from [`StorageConfig`].
//! The schema is applied on every open; every statement in it is idempotent.

use std::path::Path;

use abacus_core::config::StorageConfig;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::CacheError;

const SCHEMA: &str = include_str!("migrations/20261019_initial.sql");

/// Connection pool backing [`crate::SqliteSessionStore`]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database described by `config`
    pub async fn open(config: &StorageConfig) -> Result<Self, CacheError> {
        let path = config.database.as_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!("create {}: {}", parent.display(), e))
            })?;
        }

        // A snapshot write must reach disk before the call returns, so the
        // rollback journal runs with FULL sync; WAL only needs NORMAL.
        let (journal, synchronous) = if config.write_ahead_log {
            (SqliteJournalMode::Wal, SqliteSynchronous::Normal)
        } else {
            (SqliteJournalMode::Delete, SqliteSynchronous::Full)
        };
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(journal)
            .synchronous(synchronous)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("{}: {}", path.display(), e)))?;

        apply_schema(&pool).await?;
        tracing::info!(
            path = %path.display(),
            max_connections = config.max_connections,
            wal = config.write_ahead_log,
            "Session database opened"
        );
        Ok(Self { pool })
    }

    /// Opens `db_path` with the default pool settings
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        Self::open(&StorageConfig {
            database: db_path.to_path_buf(),
            ..StorageConfig::default()
        })
        .await
    }

    /// Private in-memory database on a single connection
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory: {}", e)))?;
        apply_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The journal mode SQLite actually settled on, lower-cased
    pub async fn journal_mode(&self) -> Result<String, CacheError> {
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(mode.to_lowercase())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), CacheError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;
    tracing::debug!("Session schema applied");
    Ok(())
}
