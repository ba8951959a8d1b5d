use chrono::{DateTime, Duration, Utc};
use concord_ids::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::{LifecycleError, Result};
use crate::status::ContractStatus;

/// Which side of the contract a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Recipient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sender => "sender",
            Role::Recipient => "recipient",
        }
    }

    pub fn other(&self) -> Role {
        match self {
            Role::Sender => Role::Recipient,
            Role::Recipient => Role::Sender,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contract-scoped actions guarded by the participant check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Download,
    Lock,
    Edit,
    Approve,
    Deny,
    Sign,
    Delete,
}

impl Action {
    pub fn verb(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Download => "download",
            Action::Lock => "lock",
            Action::Edit => "edit",
            Action::Approve => "approve",
            Action::Deny => "deny",
            Action::Sign => "sign",
            Action::Delete => "delete",
        }
    }
}

/// Requested lock operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockAction {
    Lock,
    Unlock,
}

impl LockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockAction::Lock => "lock",
            LockAction::Unlock => "unlock",
        }
    }
}

impl fmt::Display for LockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Action must be 'lock' or 'unlock', got '{0}'")]
pub struct LockActionParseError(String);

impl std::str::FromStr for LockAction {
    type Err = LockActionParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lock" => Ok(LockAction::Lock),
            "unlock" => Ok(LockAction::Unlock),
            _ => Err(LockActionParseError(s.to_string())),
        }
    }
}

/// Advisory single-holder edit lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLock {
    pub holder: UserId,
    pub locked_at: DateTime<Utc>,
}

impl EditLock {
    /// A lock older than `ttl` no longer excludes anyone.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => now - self.locked_at >= ttl,
            None => false,
        }
    }
}

/// Lifecycle-relevant fields of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub status: ContractStatus,
    pub sender_approved: bool,
    pub recipient_approved: bool,
    pub lock: Option<EditLock>,
    pub signed_at: Option<DateTime<Utc>>,
}

impl ContractState {
    /// Fresh state for a newly submitted contract.
    pub fn submitted(sender_id: UserId, recipient_id: UserId) -> Result<Self> {
        if sender_id == recipient_id {
            return Err(LifecycleError::SelfTarget);
        }
        Ok(Self {
            sender_id,
            recipient_id,
            status: ContractStatus::Pending,
            sender_approved: false,
            recipient_approved: false,
            lock: None,
            signed_at: None,
        })
    }

    /// Role of `user`, if they are a participant.
    pub fn role_of(&self, user: UserId) -> Option<Role> {
        if user == self.sender_id {
            Some(Role::Sender)
        } else if user == self.recipient_id {
            Some(Role::Recipient)
        } else {
            None
        }
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        self.role_of(user).is_some()
    }

    /// Participant guard shared by every contract-scoped operation.
    pub fn authorize(&self, user: UserId, action: Action) -> Result<Role> {
        self.role_of(user).ok_or_else(|| {
            LifecycleError::forbidden(format!(
                "Not authorized to {} this contract",
                action.verb()
            ))
        })
    }

    pub fn party(&self, role: Role) -> UserId {
        match role {
            Role::Sender => self.sender_id,
            Role::Recipient => self.recipient_id,
        }
    }

    /// The participant on the other side of `role`.
    pub fn counterparty(&self, role: Role) -> UserId {
        self.party(role.other())
    }

    pub fn approved(&self, role: Role) -> bool {
        match role {
            Role::Sender => self.sender_approved,
            Role::Recipient => self.recipient_approved,
        }
    }

    pub(crate) fn set_approved(&mut self, role: Role, value: bool) {
        match role {
            Role::Sender => self.sender_approved = value,
            Role::Recipient => self.recipient_approved = value,
        }
    }

    pub fn both_approved(&self) -> bool {
        self.sender_approved && self.recipient_approved
    }

    pub fn locked_by(&self) -> Option<UserId> {
        self.lock.map(|lock| lock.holder)
    }

    /// Lock that still excludes others at `now`.
    pub fn active_lock(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> Option<EditLock> {
        self.lock.filter(|lock| !lock.is_expired(now, ttl))
    }

    /// Structural invariants every persisted contract must satisfy.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.sender_id == self.recipient_id {
            return Err(format!(
                "sender and recipient are the same user ({})",
                self.sender_id
            ));
        }
        if let Some(holder) = self.locked_by() {
            if !self.is_participant(holder) {
                return Err(format!("lock held by non-participant {}", holder));
            }
        }
        if self.status == ContractStatus::Signed && self.lock.is_some() {
            return Err("signed contract is still locked".to_string());
        }
        if self.status == ContractStatus::Signed && self.signed_at.is_none() {
            return Err("signed contract has no signature time".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::new(1)
    }

    fn bob() -> UserId {
        UserId::new(2)
    }

    #[test]
    fn test_submitted_rejects_self_target() {
        let result = ContractState::submitted(alice(), alice());
        assert_eq!(result, Err(LifecycleError::SelfTarget));
    }

    #[test]
    fn test_roles() {
        let state = ContractState::submitted(alice(), bob()).unwrap();
        assert_eq!(state.role_of(alice()), Some(Role::Sender));
        assert_eq!(state.role_of(bob()), Some(Role::Recipient));
        assert_eq!(state.role_of(UserId::new(3)), None);
        assert_eq!(state.counterparty(Role::Sender), bob());
        assert_eq!(state.counterparty(Role::Recipient), alice());
    }

    #[test]
    fn test_authorize_names_action() {
        let state = ContractState::submitted(alice(), bob()).unwrap();
        let err = state.authorize(UserId::new(9), Action::Download).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::Forbidden("Not authorized to download this contract".to_string())
        );
    }

    #[test]
    fn test_lock_expiry() {
        let now = Utc::now();
        let lock = EditLock {
            holder: alice(),
            locked_at: now - Duration::minutes(10),
        };
        assert!(!lock.is_expired(now, None));
        assert!(!lock.is_expired(now, Some(Duration::minutes(30))));
        assert!(lock.is_expired(now, Some(Duration::minutes(5))));
    }

    #[test]
    fn test_lock_action_parse() {
        assert_eq!("lock".parse::<LockAction>().unwrap(), LockAction::Lock);
        assert_eq!("unlock".parse::<LockAction>().unwrap(), LockAction::Unlock);
        assert!("grab".parse::<LockAction>().is_err());
    }

    #[test]
    fn test_invariants_flag_foreign_lock() {
        let mut state = ContractState::submitted(alice(), bob()).unwrap();
        assert!(state.check_invariants().is_ok());
        state.lock = Some(EditLock {
            holder: UserId::new(3),
            locked_at: Utc::now(),
        });
        assert!(state.check_invariants().is_err());
    }
}
