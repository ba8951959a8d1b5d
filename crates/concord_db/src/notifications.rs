//! Notification inbox operations.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::ConcordDb;
use concord_ids::{ContractId, NotificationId, UserId};
use concord_lifecycle::NotificationKind;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

pub(crate) fn row_to_notification(row: &SqliteRow) -> Result<Notification> {
    let kind_str: String = row.try_get("type")?;
    let kind = NotificationKind::from_str(&kind_str)
        .map_err(|e| DbError::invalid_state(e.to_string()))?;
    let created_at: i64 = row.try_get("created_at")?;

    Ok(Notification {
        id: NotificationId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        contract_id: ContractId::new(row.try_get("contract_id")?),
        kind,
        message: row.try_get("message")?,
        is_read: row.try_get("is_read")?,
        created_at: ConcordDb::millis_to_datetime(created_at),
    })
}

impl ConcordDb {
    // ========================================================================
    // Notifications
    // ========================================================================

    /// A user's notifications, newest first.
    pub async fn list_notifications(&self, user: UserId, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, contract_id, type, message, is_read, created_at
            FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user.get())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect()
    }

    pub async fn count_unread_notifications(&self, user: UserId) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS unread FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("unread")?)
    }

    /// Mark one notification read. Returns false if it doesn't exist or
    /// belongs to someone else.
    pub async fn mark_notification_read(&self, user: UserId, id: NotificationId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
                .bind(id.get())
                .bind(user.get())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every unread notification of `user` read; returns how many changed.
    pub async fn mark_all_notifications_read(&self, user: UserId) -> Result<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
                .bind(user.get())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}
