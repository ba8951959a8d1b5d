//! Lifecycle policy: how each operation moves a contract between states.
//!
//! Two policies exist:
//!
//! - **Strict** (default): editing auto-approves the editor's own change and
//!   invalidates the other side's approval; either participant may sign once
//!   both have approved; either may deny before signature, which resets both
//!   approvals. Every transition notifies the other participant.
//! - **Legacy**: editing leaves approvals untouched; only the recipient may
//!   sign or deny, without an approval gate and without notification.

use chrono::{DateTime, Duration, Utc};
use concord_ids::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::{LifecycleError, Result};
use crate::notice::{Notice, NotificationKind};
use crate::state::{Action, ContractState, EditLock, LockAction, Role};
use crate::status::ContractStatus;

// ============================================================================
// Policy selection
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePolicy {
    /// Dual approval before signature, auto-approve on edit.
    #[default]
    Strict,
    /// Recipient-only signature, no approval gate.
    Legacy,
}

impl LifecyclePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePolicy::Strict => "strict",
            LifecyclePolicy::Legacy => "legacy",
        }
    }
}

impl fmt::Display for LifecyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, Clone)]
#[error("invalid lifecycle policy '{0}' (expected 'strict' or 'legacy')")]
pub struct PolicyParseError(String);

impl std::str::FromStr for LifecyclePolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(LifecyclePolicy::Strict),
            "legacy" => Ok(LifecyclePolicy::Legacy),
            _ => Err(PolicyParseError(s.to_string())),
        }
    }
}

// ============================================================================
// Transition
// ============================================================================

/// Outcome of a successful lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ContractStatus,
    pub to: ContractStatus,
    pub actor_role: Role,
    pub notice: Option<Notice>,
}

// ============================================================================
// Rules
// ============================================================================

/// Policy-selected strategy applied to a [`ContractState`].
///
/// Every method validates before it mutates: on `Err` the state is untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleRules {
    policy: LifecyclePolicy,
    lock_ttl: Option<Duration>,
}

impl LifecycleRules {
    pub fn new(policy: LifecyclePolicy) -> Self {
        Self {
            policy,
            lock_ttl: None,
        }
    }

    pub fn strict() -> Self {
        Self::new(LifecyclePolicy::Strict)
    }

    pub fn legacy() -> Self {
        Self::new(LifecyclePolicy::Legacy)
    }

    /// Treat locks older than `ttl` as released. `None` keeps locks forever.
    pub fn with_lock_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    pub fn lock_ttl(&self) -> Option<Duration> {
        self.lock_ttl
    }

    /// Acquire or release the advisory edit lock.
    ///
    /// Re-locking a lock you already hold refreshes its timestamp.
    pub fn set_lock(
        &self,
        state: &mut ContractState,
        actor: UserId,
        action: LockAction,
        now: DateTime<Utc>,
    ) -> Result<()> {
        state.authorize(actor, Action::Lock)?;
        match action {
            LockAction::Lock => {
                if state.status.is_terminal() {
                    return Err(LifecycleError::invalid_state(format!(
                        "Cannot lock a {} contract",
                        state.status
                    )));
                }
                self.ensure_not_locked_by_other(state, actor, now)?;
                state.lock = Some(EditLock {
                    holder: actor,
                    locked_at: now,
                });
            }
            LockAction::Unlock => {
                if state.locked_by() != Some(actor) {
                    return Err(LifecycleError::forbidden(
                        "You don't have a lock on this contract",
                    ));
                }
                state.lock = None;
            }
        }
        Ok(())
    }

    /// Record a new version by `actor`.
    ///
    /// The editor holds the lock for the span of the store transaction and the
    /// lock is released before commit, so a successful edit always leaves the
    /// contract unlocked.
    pub fn edit(
        &self,
        state: &mut ContractState,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let role = state.authorize(actor, Action::Edit)?;
        if state.status.is_terminal() {
            return Err(LifecycleError::invalid_state(format!(
                "Cannot edit a {} contract",
                state.status
            )));
        }
        self.ensure_not_locked_by_other(state, actor, now)?;

        let from = state.status;
        state.lock = None;

        match self.policy {
            LifecyclePolicy::Strict => {
                state.set_approved(role, true);
                state.set_approved(role.other(), false);
                state.status = if state.both_approved() {
                    ContractStatus::Complete
                } else {
                    ContractStatus::Edited
                };
            }
            LifecyclePolicy::Legacy => {
                state.status = ContractStatus::Edited;
            }
        }

        Ok(Transition {
            from,
            to: state.status,
            actor_role: role,
            notice: Some(Notice::new(
                state.counterparty(role),
                NotificationKind::ContractEdited,
            )),
        })
    }

    /// Record `actor`'s approval of the current version. Never touches the lock.
    pub fn approve(&self, state: &mut ContractState, actor: UserId) -> Result<Transition> {
        let role = state.authorize(actor, Action::Approve)?;
        match state.status {
            ContractStatus::Denied => {
                return Err(LifecycleError::invalid_state(
                    "Cannot approve a denied contract",
                ))
            }
            ContractStatus::Complete => {
                return Err(LifecycleError::invalid_state("Contract is already complete"))
            }
            ContractStatus::Signed => {
                return Err(LifecycleError::invalid_state(
                    "Cannot approve a signed contract",
                ))
            }
            _ => {}
        }

        let from = state.status;
        state.set_approved(role, true);
        let completed = state.both_approved();
        if completed {
            state.status = ContractStatus::Complete;
        } else if self.policy == LifecyclePolicy::Legacy {
            state.status = ContractStatus::Approved;
        }

        Ok(Transition {
            from,
            to: state.status,
            actor_role: role,
            notice: Some(
                Notice::new(state.counterparty(role), NotificationKind::ContractApproved)
                    .completing(completed),
            ),
        })
    }

    /// Sign the contract. Clears the lock and stamps `signed_at`.
    pub fn sign(
        &self,
        state: &mut ContractState,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let role = state.authorize(actor, Action::Sign)?;
        if self.policy == LifecyclePolicy::Legacy && role != Role::Recipient {
            return Err(LifecycleError::forbidden(
                "Only the recipient can sign this contract",
            ));
        }
        match state.status {
            ContractStatus::Denied => {
                return Err(LifecycleError::invalid_state("Cannot sign a denied contract"))
            }
            ContractStatus::Signed => {
                return Err(LifecycleError::invalid_state("Contract is already signed"))
            }
            _ => {}
        }
        if self.policy == LifecyclePolicy::Strict && !state.both_approved() {
            return Err(LifecycleError::approval_required(
                "Both parties must approve the contract before signing",
            ));
        }

        let from = state.status;
        state.status = ContractStatus::Signed;
        state.signed_at = Some(now);
        state.lock = None;

        let notice = match self.policy {
            LifecyclePolicy::Strict => Some(Notice::new(
                state.counterparty(role),
                NotificationKind::ContractSigned,
            )),
            LifecyclePolicy::Legacy => None,
        };

        Ok(Transition {
            from,
            to: state.status,
            actor_role: role,
            notice,
        })
    }

    /// Deny (cancel) the contract. Clears the lock.
    ///
    /// `Complete` counts as settled, so only signing can follow it.
    pub fn deny(&self, state: &mut ContractState, actor: UserId) -> Result<Transition> {
        let role = state.authorize(actor, Action::Deny)?;
        if self.policy == LifecyclePolicy::Legacy && role != Role::Recipient {
            return Err(LifecycleError::forbidden(
                "Only the recipient can deny this contract",
            ));
        }
        match state.status {
            ContractStatus::Signed => {
                return Err(LifecycleError::invalid_state("Cannot deny a signed contract"))
            }
            ContractStatus::Denied => {
                return Err(LifecycleError::invalid_state("Contract is already denied"))
            }
            ContractStatus::Complete => {
                return Err(LifecycleError::invalid_state(
                    "Cannot deny a complete contract",
                ))
            }
            _ => {}
        }

        let from = state.status;
        state.status = ContractStatus::Denied;
        state.lock = None;

        let notice = match self.policy {
            LifecyclePolicy::Strict => {
                state.sender_approved = false;
                state.recipient_approved = false;
                Some(Notice::new(
                    state.counterparty(role),
                    NotificationKind::ContractDenied,
                ))
            }
            LifecyclePolicy::Legacy => None,
        };

        Ok(Transition {
            from,
            to: state.status,
            actor_role: role,
            notice,
        })
    }

    fn ensure_not_locked_by_other(
        &self,
        state: &ContractState,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match state.active_lock(now, self.lock_ttl) {
            Some(lock) if lock.holder != actor => Err(LifecycleError::lock_conflict(
                "Contract is currently being edited by another user",
            )),
            _ => Ok(()),
        }
    }
}
