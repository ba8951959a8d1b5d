//! Contract and version reads.
//!
//! Mutations go through [`crate::ContractTx`].

use crate::error::{DbError, Result};
use crate::types::*;
use crate::ConcordDb;
use concord_ids::{ContractId, FileRef, UserId, VersionId};
use concord_lifecycle::{ContractState, ContractStatus, EditLock};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

pub(crate) const CONTRACT_COLUMNS: &str = "id, title, file_ref, file_name, sender_id, \
     recipient_id, status, notes, created_at, updated_at, signed_at, locked_by_id, locked_at, \
     sender_approved, recipient_approved";

pub(crate) const VERSION_COLUMNS: &str =
    "id, contract_id, version_number, file_ref, file_name, created_by_id, created_at, change_notes";

fn parse_file_ref(raw: &str) -> Result<FileRef> {
    FileRef::parse(raw).map_err(|e| DbError::invalid_state(e.to_string()))
}

pub(crate) fn row_to_contract(row: &SqliteRow) -> Result<Contract> {
    let id = ContractId::new(row.try_get("id")?);
    let status_str: String = row.try_get("status")?;
    let status = ContractStatus::from_str(&status_str)
        .map_err(|e| DbError::invalid_state(format!("contract {}: {}", id, e)))?;

    let locked_by: Option<i64> = row.try_get("locked_by_id")?;
    let locked_at: Option<i64> = row.try_get("locked_at")?;
    let lock = match (locked_by, locked_at) {
        (Some(holder), Some(at)) => Some(EditLock {
            holder: UserId::new(holder),
            locked_at: ConcordDb::millis_to_datetime(at),
        }),
        (None, _) => None,
        (Some(_), None) => {
            return Err(DbError::invalid_state(format!(
                "contract {}: lock holder without lock time",
                id
            )))
        }
    };

    let state = ContractState {
        sender_id: UserId::new(row.try_get("sender_id")?),
        recipient_id: UserId::new(row.try_get("recipient_id")?),
        status,
        sender_approved: row.try_get("sender_approved")?,
        recipient_approved: row.try_get("recipient_approved")?,
        lock,
        signed_at: row
            .try_get::<Option<i64>, _>("signed_at")?
            .map(ConcordDb::millis_to_datetime),
    };
    state
        .check_invariants()
        .map_err(|e| DbError::invalid_state(format!("contract {}: {}", id, e)))?;

    let file_ref: String = row.try_get("file_ref")?;
    let created_at: i64 = row.try_get("created_at")?;

    Ok(Contract {
        id,
        title: row.try_get("title")?,
        file_name: row.try_get("file_name")?,
        file_ref: parse_file_ref(&file_ref)?,
        notes: row.try_get("notes")?,
        created_at: ConcordDb::millis_to_datetime(created_at),
        updated_at: row
            .try_get::<Option<i64>, _>("updated_at")?
            .map(ConcordDb::millis_to_datetime),
        state,
    })
}

pub(crate) fn row_to_version(row: &SqliteRow) -> Result<ContractVersion> {
    let file_ref: String = row.try_get("file_ref")?;
    let created_at: i64 = row.try_get("created_at")?;

    Ok(ContractVersion {
        id: VersionId::new(row.try_get("id")?),
        contract_id: ContractId::new(row.try_get("contract_id")?),
        version_number: row.try_get("version_number")?,
        file_name: row.try_get("file_name")?,
        file_ref: parse_file_ref(&file_ref)?,
        created_by: UserId::new(row.try_get("created_by_id")?),
        created_at: ConcordDb::millis_to_datetime(created_at),
        change_notes: row.try_get("change_notes")?,
    })
}

impl ConcordDb {
    // ========================================================================
    // Contracts
    // ========================================================================

    pub async fn get_contract(&self, id: ContractId) -> Result<Option<Contract>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM contracts WHERE id = ?",
            CONTRACT_COLUMNS
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_contract).transpose()
    }

    /// Contracts where `user` is sender or recipient, newest first.
    pub async fn list_contracts_for_user(&self, user: UserId) -> Result<Vec<Contract>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM contracts
            WHERE sender_id = ?1 OR recipient_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
            CONTRACT_COLUMNS
        ))
        .bind(user.get())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_contract).collect()
    }

    // ========================================================================
    // Versions
    // ========================================================================

    /// All versions of a contract, highest number first.
    pub async fn list_versions(&self, contract_id: ContractId) -> Result<Vec<ContractVersion>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM contract_versions
            WHERE contract_id = ?
            ORDER BY version_number DESC
            "#,
            VERSION_COLUMNS
        ))
        .bind(contract_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_version).collect()
    }

    /// A version by row id, only if it belongs to `contract_id`.
    pub async fn get_version(
        &self,
        contract_id: ContractId,
        version_id: VersionId,
    ) -> Result<Option<ContractVersion>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM contract_versions WHERE id = ? AND contract_id = ?",
            VERSION_COLUMNS
        ))
        .bind(version_id.get())
        .bind(contract_id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_version).transpose()
    }
}
