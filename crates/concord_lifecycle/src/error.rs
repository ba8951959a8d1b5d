//! Errors raised by lifecycle rules.

use thiserror::Error;

/// Lifecycle result type.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Rejections produced by the state machine.
///
/// Every variant carries a human-readable reason that is safe to show to the
/// acting participant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// Actor is not allowed to perform this action (non-participant, wrong
    /// role, or releasing a lock they do not hold).
    #[error("{0}")]
    Forbidden(String),

    /// The edit lock is held by the other participant.
    #[error("{0}")]
    LockConflict(String),

    /// The contract's status does not permit this action.
    #[error("{0}")]
    InvalidState(String),

    /// Signing requires both participants to have approved.
    #[error("{0}")]
    ApprovalRequired(String),

    /// Sender and recipient are the same user.
    #[error("Cannot send contract to yourself")]
    SelfTarget,
}

impl LifecycleError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn lock_conflict(msg: impl Into<String>) -> Self {
        Self::LockConflict(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn approval_required(msg: impl Into<String>) -> Self {
        Self::ApprovalRequired(msg.into())
    }
}
