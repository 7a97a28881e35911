//! Abacus Cache - Durable session state
//!
//! Storage adapters for the `ISessionStore` port:
//! - Session snapshots (one JSON document per attempt)
//! - The pending-answer queue
//! - Submission-intent and expiry flags
//!
//! ## Architecture
//!
//! This crate implements the `ISessionStore` port from `abacus-core`. It is a
//! driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteSessionStore`] - SQLite-backed `ISessionStore`
//! - [`InMemorySessionStore`] - Process-local `ISessionStore` for tests and
//!   for running without a writable data directory
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use abacus_cache::{DatabasePool, SqliteSessionStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/abacus/sessions.db")).await?;
//! let store = SqliteSessionStore::new(pool.pool().clone());
//! // Use store as ISessionStore...
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod pool;
pub mod store;

pub use memory::InMemorySessionStore;
pub use pool::DatabasePool;
pub use store::SqliteSessionStore;

use abacus_core::ports::StorageError;

/// SQLite result code for "database or disk is full"
const SQLITE_FULL: &str = "13";

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The disk or database is full
    #[error("Storage full")]
    StorageFull,

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.code().as_deref() == Some(SQLITE_FULL) {
                return CacheError::StorageFull;
            }
        }
        CacheError::QueryFailed(e.to_string())
    }
}

impl From<CacheError> for StorageError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::StorageFull => StorageError::QuotaExceeded,
            CacheError::SerializationError(msg) => StorageError::Serialization(msg),
            other => StorageError::Io(other.to_string()),
        }
    }
}
