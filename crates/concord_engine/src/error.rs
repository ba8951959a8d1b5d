//! Engine error taxonomy and its HTTP mapping.

use concord_db::DbError;
use concord_lifecycle::LifecycleError;
use thiserror::Error;

use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    LockConflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    ApprovalRequired(String),

    #[error("Cannot send contract to yourself")]
    SelfTarget,

    #[error("Either recipient_username or recipient_email is required")]
    MissingRecipient,

    #[error("Recipient not found")]
    RecipientNotFound,

    /// The row exists but its blob is gone from the file store.
    #[error("File not found")]
    FileMissing,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Username already registered")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EngineError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// HTTP status the API layer answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::NotFound(_)
            | EngineError::RecipientNotFound
            | EngineError::FileMissing => 404,
            EngineError::Forbidden(_) => 403,
            EngineError::LockConflict(_) => 409,
            EngineError::InvalidState(_)
            | EngineError::ApprovalRequired(_)
            | EngineError::SelfTarget
            | EngineError::MissingRecipient
            | EngineError::InvalidInput(_)
            | EngineError::UsernameTaken
            | EngineError::EmailTaken => 400,
            EngineError::Db(DbError::NotFound(_)) => 404,
            EngineError::Storage(_) | EngineError::Db(_) | EngineError::Encode(_) => 500,
        }
    }

    /// Stable machine-readable code for `ErrorResponse`.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Forbidden(_) => "FORBIDDEN",
            EngineError::LockConflict(_) => "LOCK_CONFLICT",
            EngineError::InvalidState(_) => "INVALID_STATE",
            EngineError::ApprovalRequired(_) => "APPROVAL_REQUIRED",
            EngineError::SelfTarget => "SELF_TARGET",
            EngineError::MissingRecipient => "MISSING_RECIPIENT",
            EngineError::RecipientNotFound => "RECIPIENT_NOT_FOUND",
            EngineError::FileMissing => "FILE_MISSING",
            EngineError::InvalidInput(_) => "INVALID_INPUT",
            EngineError::UsernameTaken => "USERNAME_TAKEN",
            EngineError::EmailTaken => "EMAIL_TAKEN",
            EngineError::Storage(_) => "STORAGE_ERROR",
            EngineError::Db(DbError::NotFound(_)) => "NOT_FOUND",
            EngineError::Db(_) => "DATABASE_ERROR",
            EngineError::Encode(_) => "ENCODING_ERROR",
        }
    }

    /// Caller mistakes as opposed to infrastructure failures.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<LifecycleError> for EngineError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Forbidden(msg) => EngineError::Forbidden(msg),
            LifecycleError::LockConflict(msg) => EngineError::LockConflict(msg),
            LifecycleError::InvalidState(msg) => EngineError::InvalidState(msg),
            LifecycleError::ApprovalRequired(msg) => EngineError::ApprovalRequired(msg),
            LifecycleError::SelfTarget => EngineError::SelfTarget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(EngineError::not_found("Contract not found").status_code(), 404);
        assert_eq!(EngineError::Forbidden("no".into()).status_code(), 403);
        assert_eq!(EngineError::LockConflict("busy".into()).status_code(), 409);
        assert_eq!(EngineError::RecipientNotFound.status_code(), 404);
        assert_eq!(EngineError::FileMissing.status_code(), 404);
        assert_eq!(EngineError::SelfTarget.status_code(), 400);
        assert_eq!(EngineError::MissingRecipient.status_code(), 400);
        assert_eq!(EngineError::EmailTaken.status_code(), 400);
        assert_eq!(
            EngineError::Db(DbError::constraint("boom")).status_code(),
            500
        );
    }

    #[test]
    fn test_lifecycle_errors_keep_their_message() {
        let err: EngineError = LifecycleError::approval_required(
            "Both parties must approve the contract before signing",
        )
        .into();
        assert_eq!(err.code(), "APPROVAL_REQUIRED");
        assert_eq!(
            err.to_string(),
            "Both parties must approve the contract before signing"
        );

        let err: EngineError = LifecycleError::SelfTarget.into();
        assert_eq!(err.to_string(), "Cannot send contract to yourself");
        assert!(err.is_client_error());
    }
}
