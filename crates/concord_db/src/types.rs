//! Row types returned by the store.

use chrono::{DateTime, Utc};
use concord_ids::{ContractId, FileRef, NotificationId, UserId, VersionId};
use concord_lifecycle::{ContractState, NotificationKind};
use serde::{Deserialize, Serialize};

// ============================================================================
// Users
// ============================================================================

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for account creation.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Opaque credential material. The store never inspects it.
    pub credential: String,
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub credential: Option<String>,
}

// ============================================================================
// Contracts
// ============================================================================

/// A contract row: descriptive fields plus its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub title: String,
    /// Original filename of the current head document.
    pub file_name: String,
    /// Storage reference of the current head document.
    pub file_ref: FileRef,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub state: ContractState,
}

/// Input for contract creation.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub title: String,
    pub file_name: String,
    pub file_ref: FileRef,
    pub notes: Option<String>,
    pub state: ContractState,
}

/// An immutable snapshot of one document revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractVersion {
    pub id: VersionId,
    pub contract_id: ContractId,
    pub version_number: i64,
    pub file_name: String,
    pub file_ref: FileRef,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub change_notes: Option<String>,
}

/// Input for appending a version. The number is assigned by the transaction.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub contract_id: ContractId,
    pub file_name: String,
    pub file_ref: FileRef,
    pub created_by: UserId,
    pub change_notes: Option<String>,
}

// ============================================================================
// Notifications
// ============================================================================

/// An inbox entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    /// May point at a contract that has since been deleted.
    pub contract_id: ContractId,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub contract_id: ContractId,
    pub kind: NotificationKind,
    pub message: String,
}
