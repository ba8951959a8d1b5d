//! Unified database layer for Concord.
//!
//! This crate is the single place that talks SQL. The lifecycle engine reads
//! through the typed methods on [`ConcordDb`] and performs every mutation
//! inside a [`ContractTx`], so a failure partway through an operation leaves
//! no partial state behind.
//!
//! # Usage
//!
//! ```rust,ignore
//! use concord_db::{ConcordDb, Result};
//!
//! let db = ConcordDb::open("~/.concord/concord.sqlite3").await?;
//!
//! let mut tx = db.begin().await?;
//! let contract = tx.claim_contract(contract_id).await?;
//! // ... check and mutate ...
//! tx.commit().await?;
//! ```

mod error;
mod schema;
mod types;

// Method implementations organized by entity
mod contracts;
mod notifications;
mod tx;
mod users;

pub use error::{DbError, Result};
pub use tx::ContractTx;
pub use types::*;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// How long a writer waits for another transaction to release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Unified database for all Concord operations.
#[derive(Clone)]
pub struct ConcordDb {
    pool: SqlitePool,
}

impl ConcordDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %path.display(), "Database opened");

        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::NotFound(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        Self::open(path).await
    }

    /// In-memory database on a single pinned connection (for testing).
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Start a transaction for one lifecycle operation.
    ///
    /// Dropping the handle without [`ContractTx::commit`] rolls back.
    pub async fn begin(&self) -> Result<ContractTx> {
        let tx = self.pool.begin().await?;
        Ok(ContractTx::new(tx))
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamp utilities
impl ConcordDb {
    /// Current time as milliseconds since Unix epoch.
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Convert milliseconds to DateTime.
    pub fn millis_to_datetime(millis: i64) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_else(chrono::Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("test.db");

        let db = ConcordDb::open(&db_path).await.unwrap();
        assert!(db_path.exists());

        db.close().await;
    }

    #[tokio::test]
    async fn test_open_existing_fails_if_not_exists() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nonexistent.db");

        let result = ConcordDb::open_existing(&db_path).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reopen_keeps_schema() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("test.db");

        ConcordDb::open(&db_path).await.unwrap().close().await;
        let db = ConcordDb::open_existing(&db_path).await.unwrap();
        assert!(db.list_users(0, 10).await.unwrap().is_empty());
    }
}
