//! User directory operations.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::ConcordDb;
use concord_ids::UserId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const USER_COLUMNS: &str = "id, username, email, full_name, created_at";

pub(crate) fn row_to_user(row: &SqliteRow) -> Result<User> {
    let created_at: i64 = row.try_get("created_at")?;
    Ok(User {
        id: UserId::new(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        created_at: ConcordDb::millis_to_datetime(created_at),
    })
}

/// Escape LIKE wildcards so a search term matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl ConcordDb {
    // ========================================================================
    // Users
    // ========================================================================

    /// Create a user. Duplicate usernames or emails fail with `Constraint`.
    pub async fn create_user(&self, new: &NewUser) -> Result<User> {
        let now = Self::now_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, full_name, credential, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.full_name)
        .bind(&new.credential)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = UserId::new(result.last_insert_rowid());
        self.get_user(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("User {} vanished after insert", id)))
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Users in id order, paginated.
    pub async fn list_users(&self, skip: i64, limit: i64) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY id LIMIT ? OFFSET ?",
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    /// Case-insensitive substring match over username or email.
    ///
    /// SQLite's LIKE folds ASCII case only.
    pub async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<User>> {
        let pattern = like_pattern(query);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM users
            WHERE username LIKE ?1 ESCAPE '\'
               OR email LIKE ?1 ESCAPE '\'
            ORDER BY id
            LIMIT ?2
            "#,
            USER_COLUMNS
        ))
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    /// Apply a partial profile update and return the updated row.
    pub async fn update_user(&self, id: UserId, update: &UserUpdate) -> Result<User> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                full_name = COALESCE(?, full_name),
                email = COALESCE(?, email),
                credential = COALESCE(?, credential)
            WHERE id = ?
            "#,
        )
        .bind(&update.full_name)
        .bind(&update.email)
        .bind(&update.credential)
        .bind(id.get())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("User {}", id)));
        }

        self.get_user(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("User {}", id)))
    }
}
