//! Database schema creation for all Concord tables.
//!
//! All CREATE TABLE statements live here - single source of truth.

use crate::error::Result;
use crate::ConcordDb;
use tracing::info;

impl ConcordDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        self.create_user_tables().await?;
        self.create_contract_tables().await?;
        self.create_notification_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    async fn create_user_tables(&self) -> Result<()> {
        // Credentials are opaque here: hashing belongs to the auth layer.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                full_name TEXT,
                credential TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_contract_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS contracts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                file_ref TEXT NOT NULL,
                file_name TEXT NOT NULL,
                sender_id INTEGER NOT NULL REFERENCES users(id),
                recipient_id INTEGER NOT NULL REFERENCES users(id),
                status TEXT NOT NULL DEFAULT 'pending',
                notes TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER,
                signed_at INTEGER,
                locked_by_id INTEGER REFERENCES users(id),
                locked_at INTEGER,
                sender_approved INTEGER NOT NULL DEFAULT 0,
                recipient_approved INTEGER NOT NULL DEFAULT 0,
                CHECK (sender_id <> recipient_id),
                CHECK (locked_by_id IS NULL OR locked_by_id IN (sender_id, recipient_id))
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Append-only; (contract_id, version_number) uniqueness backs the
        // gapless numbering computed inside each edit transaction.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS contract_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contract_id INTEGER NOT NULL REFERENCES contracts(id),
                version_number INTEGER NOT NULL,
                file_ref TEXT NOT NULL,
                file_name TEXT NOT NULL,
                created_by_id INTEGER NOT NULL REFERENCES users(id),
                created_at INTEGER NOT NULL,
                change_notes TEXT,
                UNIQUE(contract_id, version_number)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_contracts_sender ON contracts(sender_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_contracts_recipient ON contracts(recipient_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_versions_contract ON contract_versions(contract_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_notification_tables(&self) -> Result<()> {
        // contract_id is a plain reference: notifications outlive a deleted contract.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                contract_id INTEGER NOT NULL,
                type TEXT NOT NULL,
                message TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
