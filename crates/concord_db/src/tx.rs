//! Per-operation write transaction.
//!
//! Every lifecycle mutation runs as: claim the contract row, check the rules
//! against what was read, write the new state plus any version and
//! notification rows, commit. The claim is an UPDATE issued before any read,
//! so SQLite hands the transaction its write lock up front and a concurrent
//! operation on the same store waits (up to the busy timeout) instead of
//! acting on a stale read.

use crate::contracts::{row_to_contract, row_to_version, CONTRACT_COLUMNS, VERSION_COLUMNS};
use crate::error::{DbError, Result};
use crate::notifications::row_to_notification;
use crate::types::*;
use chrono::{DateTime, Utc};
use concord_ids::{ContractId, FileRef, NotificationId, VersionId};
use concord_lifecycle::ContractState;
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

/// Open write transaction. Dropped without `commit` means rolled back.
pub struct ContractTx {
    tx: Transaction<'static, Sqlite>,
}

impl ContractTx {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    /// Take the write lock and read the contract. `None` if it doesn't exist.
    pub async fn claim_contract(&mut self, id: ContractId) -> Result<Option<Contract>> {
        let claimed = sqlx::query("UPDATE contracts SET id = id WHERE id = ?")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;

        if claimed.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query(&format!(
            "SELECT {} FROM contracts WHERE id = ?",
            CONTRACT_COLUMNS
        ))
        .bind(id.get())
        .fetch_one(&mut *self.tx)
        .await?;

        debug!(contract_id = %id, "Contract claimed");
        row_to_contract(&row).map(Some)
    }

    pub async fn insert_contract(
        &mut self,
        new: &NewContract,
        now: DateTime<Utc>,
    ) -> Result<Contract> {
        new.state.check_invariants().map_err(DbError::InvalidState)?;

        let result = sqlx::query(
            r#"
            INSERT INTO contracts (title, file_ref, file_name, sender_id, recipient_id,
                                   status, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.title)
        .bind(new.file_ref.as_str())
        .bind(&new.file_name)
        .bind(new.state.sender_id.get())
        .bind(new.state.recipient_id.get())
        .bind(new.state.status.as_str())
        .bind(&new.notes)
        .bind(now.timestamp_millis())
        .execute(&mut *self.tx)
        .await?;

        let id = ContractId::new(result.last_insert_rowid());
        self.claim_contract(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("Contract {} vanished after insert", id)))
    }

    /// Persist lifecycle fields and bump `updated_at`.
    pub async fn save_state(
        &mut self,
        id: ContractId,
        state: &ContractState,
        now: DateTime<Utc>,
    ) -> Result<()> {
        state
            .check_invariants()
            .map_err(|e| DbError::invalid_state(format!("contract {}: {}", id, e)))?;

        let result = sqlx::query(
            r#"
            UPDATE contracts SET
                status = ?,
                sender_approved = ?,
                recipient_approved = ?,
                locked_by_id = ?,
                locked_at = ?,
                signed_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(state.status.as_str())
        .bind(state.sender_approved)
        .bind(state.recipient_approved)
        .bind(state.lock.map(|lock| lock.holder.get()))
        .bind(state.lock.map(|lock| lock.locked_at.timestamp_millis()))
        .bind(state.signed_at.map(|at| at.timestamp_millis()))
        .bind(now.timestamp_millis())
        .bind(id.get())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("Contract {}", id)));
        }
        Ok(())
    }

    /// Point the contract's head at a new document.
    pub async fn set_head_file(
        &mut self,
        id: ContractId,
        file_ref: &FileRef,
        file_name: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE contracts SET file_ref = ?, file_name = ? WHERE id = ?")
            .bind(file_ref.as_str())
            .bind(file_name)
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// `max(version_number) + 1`, or 1 for a contract without versions.
    pub async fn next_version_number(&mut self, contract_id: ContractId) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(version_number), 0) + 1 AS next FROM contract_versions WHERE contract_id = ?",
        )
        .bind(contract_id.get())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.try_get("next")?)
    }

    /// Append the next version of a contract.
    ///
    /// `change_notes` of `None` is stored as `Version {n} edited`, or
    /// `Initial version` for the first one.
    pub async fn append_version(
        &mut self,
        new: &NewVersion,
        now: DateTime<Utc>,
    ) -> Result<ContractVersion> {
        let number = self.next_version_number(new.contract_id).await?;
        let notes = match &new.change_notes {
            Some(notes) => notes.clone(),
            None if number == 1 => "Initial version".to_string(),
            None => format!("Version {} edited", number),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO contract_versions (contract_id, version_number, file_ref, file_name,
                                           created_by_id, created_at, change_notes)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.contract_id.get())
        .bind(number)
        .bind(new.file_ref.as_str())
        .bind(&new.file_name)
        .bind(new.created_by.get())
        .bind(now.timestamp_millis())
        .bind(&notes)
        .execute(&mut *self.tx)
        .await?;

        let id = VersionId::new(result.last_insert_rowid());
        let row = sqlx::query(&format!(
            "SELECT {} FROM contract_versions WHERE id = ?",
            VERSION_COLUMNS
        ))
        .bind(id.get())
        .fetch_one(&mut *self.tx)
        .await?;

        debug!(contract_id = %new.contract_id, version = number, "Version appended");
        row_to_version(&row)
    }

    pub async fn insert_notification(
        &mut self,
        new: &NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Notification> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, contract_id, type, message, is_read, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(new.user_id.get())
        .bind(new.contract_id.get())
        .bind(new.kind.as_str())
        .bind(&new.message)
        .bind(now.timestamp_millis())
        .execute(&mut *self.tx)
        .await?;

        let id = NotificationId::new(result.last_insert_rowid());
        let row = sqlx::query(
            "SELECT id, user_id, contract_id, type, message, is_read, created_at FROM notifications WHERE id = ?",
        )
        .bind(id.get())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_notification(&row)
    }

    /// Remove a contract and its versions. Returns every file reference
    /// the removed rows pointed at, so the caller can clean up blobs.
    pub async fn delete_contract(&mut self, id: ContractId) -> Result<Vec<FileRef>> {
        let mut refs = Vec::new();

        let head = sqlx::query("SELECT file_ref FROM contracts WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| DbError::not_found(format!("Contract {}", id)))?;
        refs.push(head.try_get::<String, _>("file_ref")?);

        let versions = sqlx::query("SELECT file_ref FROM contract_versions WHERE contract_id = ?")
            .bind(id.get())
            .fetch_all(&mut *self.tx)
            .await?;
        for row in &versions {
            refs.push(row.try_get::<String, _>("file_ref")?);
        }

        sqlx::query("DELETE FROM contract_versions WHERE contract_id = ?")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM contracts WHERE id = ?")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;

        refs.sort();
        refs.dedup();
        refs.iter()
            .map(|raw| FileRef::parse(raw).map_err(|e| DbError::invalid_state(e.to_string())))
            .collect()
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
