//! Contract lifecycle core types and state machine.
//!
//! Canonical definitions for contract status, participant roles, the advisory
//! edit lock, the dual-approval flags and the policy that decides how each
//! lifecycle operation moves a contract between states.
//!
//! Nothing in this crate performs I/O. The engine loads a [`ContractState`]
//! inside a store transaction, applies one operation through
//! [`LifecycleRules`], persists the result and emits the returned
//! [`Notice`] in the same transaction.

mod error;
mod notice;
mod rules;
mod state;
mod status;

pub use error::{LifecycleError, Result};
pub use notice::{Notice, NotificationKind, NotificationKindParseError};
pub use rules::{LifecyclePolicy, LifecycleRules, PolicyParseError, Transition};
pub use state::{Action, ContractState, EditLock, LockAction, LockActionParseError, Role};
pub use status::{ContractStatus, StatusParseError};
