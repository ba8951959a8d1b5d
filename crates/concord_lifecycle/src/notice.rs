use concord_ids::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Notification type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewContract,
    ContractEdited,
    ContractSigned,
    ContractDenied,
    ContractApproved,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewContract => "new_contract",
            NotificationKind::ContractEdited => "contract_edited",
            NotificationKind::ContractSigned => "contract_signed",
            NotificationKind::ContractDenied => "contract_denied",
            NotificationKind::ContractApproved => "contract_approved",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, Clone)]
#[error("invalid notification type: {0}")]
pub struct NotificationKindParseError(String);

impl std::str::FromStr for NotificationKind {
    type Err = NotificationKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_contract" => Ok(NotificationKind::NewContract),
            "contract_edited" => Ok(NotificationKind::ContractEdited),
            "contract_signed" => Ok(NotificationKind::ContractSigned),
            "contract_denied" => Ok(NotificationKind::ContractDenied),
            "contract_approved" => Ok(NotificationKind::ContractApproved),
            _ => Err(NotificationKindParseError(s.to_string())),
        }
    }
}

/// A notification the engine must record alongside a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// User who receives the notification.
    pub recipient: UserId,
    pub kind: NotificationKind,
    /// The transition completed the contract (both approvals set).
    pub completed: bool,
}

impl Notice {
    pub fn new(recipient: UserId, kind: NotificationKind) -> Self {
        Self {
            recipient,
            kind,
            completed: false,
        }
    }

    pub fn completing(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Render the message shown to the recipient.
    ///
    /// `actor_name` is only used by `new_contract`.
    pub fn render(&self, title: &str, actor_name: &str) -> String {
        match self.kind {
            NotificationKind::NewContract => {
                format!("New contract '{}' from {}", title, actor_name)
            }
            NotificationKind::ContractEdited => format!("Contract '{}' has been edited", title),
            NotificationKind::ContractSigned => format!("Contract '{}' has been signed", title),
            NotificationKind::ContractDenied => {
                format!("Contract '{}' has been denied/cancelled", title)
            }
            NotificationKind::ContractApproved => {
                let mut message = format!("Contract '{}' has been approved", title);
                if self.completed {
                    message.push_str(" - Contract is now complete!");
                }
                message
            }
        }
    }
}
