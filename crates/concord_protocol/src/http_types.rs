//! HTTP API types for the contract service.
//!
//! Field names follow the JSON the web client already consumes.

use chrono::{DateTime, Utc};
use concord_ids::{ContractId, NotificationId, UserId, VersionId};
use concord_lifecycle::{ContractStatus, LockAction, NotificationKind};
use serde::{Deserialize, Serialize};

// ============================================================================
// Users
// ============================================================================

/// Public view of an account. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `PUT /users/profile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdateRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

// ============================================================================
// Contracts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractVersionResponse {
    pub id: VersionId,
    pub contract_id: ContractId,
    pub version_number: i64,
    pub file_name: String,
    pub created_by_id: UserId,
    pub created_at: DateTime<Utc>,
    pub change_notes: Option<String>,
    pub created_by: UserResponse,
}

/// Contract representation returned by upload, get, list and edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractResponse {
    pub id: ContractId,
    pub title: String,
    pub file_name: String,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub status: ContractStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub locked_by_id: Option<UserId>,
    pub locked_at: Option<DateTime<Utc>>,
    pub sender_approved: bool,
    pub recipient_approved: bool,
    pub sender: UserResponse,
    pub recipient: UserResponse,
    /// Highest version first.
    #[serde(default)]
    pub versions: Vec<ContractVersionResponse>,
}

/// Body of `POST /contracts/{id}/lock`.
///
/// `action` stays a raw string so a bad value is reported as a 400 with the
/// offending text rather than a deserialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub action: String,
}

impl LockRequest {
    pub fn new(action: LockAction) -> Self {
        Self {
            action: action.as_str().to_string(),
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: NotificationId,
    pub contract_id: ContractId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Response for GET /notifications/count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}

// ============================================================================
// Acknowledgements
// ============================================================================

/// `{"message": ...}` acknowledgement for state-changing calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn lock(action: LockAction) -> Self {
        Self::new(format!("Contract {}ed successfully", action))
    }

    pub fn signed() -> Self {
        Self::new("Contract signed successfully")
    }

    pub fn denied() -> Self {
        Self::new("Contract denied successfully")
    }

    pub fn approved() -> Self {
        Self::new("Contract approved successfully")
    }

    pub fn deleted() -> Self {
        Self::new("Contract deleted successfully")
    }

    pub fn notification_read() -> Self {
        Self::new("Notification marked as read")
    }

    pub fn all_notifications_read() -> Self {
        Self::new("All notifications marked as read")
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// Standard error response for the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
