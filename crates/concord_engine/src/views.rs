//! Read models returned by the engine and their wire representations.

use concord_db::{Contract, ContractVersion, Notification, User};
use concord_protocol::{
    ContractResponse, ContractVersionResponse, NotificationResponse, UserResponse,
};

/// A contract with both participants and its version history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDetails {
    pub contract: Contract,
    pub sender: User,
    pub recipient: User,
    /// Highest version number first.
    pub versions: Vec<VersionDetails>,
}

/// A version with its author resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDetails {
    pub version: ContractVersion,
    pub created_by: User,
}

/// Bytes of a stored document plus the name it was uploaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Public profile of a stored user. The credential never leaves the store.
pub fn user_response(user: &User) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        created_at: user.created_at,
    }
}

impl From<&VersionDetails> for ContractVersionResponse {
    fn from(details: &VersionDetails) -> Self {
        let version = &details.version;
        ContractVersionResponse {
            id: version.id,
            contract_id: version.contract_id,
            version_number: version.version_number,
            file_name: version.file_name.clone(),
            created_by_id: version.created_by,
            created_at: version.created_at,
            change_notes: version.change_notes.clone(),
            created_by: user_response(&details.created_by),
        }
    }
}

impl From<&ContractDetails> for ContractResponse {
    fn from(details: &ContractDetails) -> Self {
        let contract = &details.contract;
        let state = &contract.state;
        ContractResponse {
            id: contract.id,
            title: contract.title.clone(),
            file_name: contract.file_name.clone(),
            sender_id: state.sender_id,
            recipient_id: state.recipient_id,
            status: state.status,
            notes: contract.notes.clone(),
            created_at: contract.created_at,
            updated_at: contract.updated_at,
            signed_at: state.signed_at,
            locked_by_id: state.locked_by(),
            locked_at: state.lock.map(|lock| lock.locked_at),
            sender_approved: state.sender_approved,
            recipient_approved: state.recipient_approved,
            sender: user_response(&details.sender),
            recipient: user_response(&details.recipient),
            versions: details.versions.iter().map(Into::into).collect(),
        }
    }
}

pub fn notification_response(notification: &Notification) -> NotificationResponse {
    NotificationResponse {
        id: notification.id,
        contract_id: notification.contract_id,
        kind: notification.kind,
        message: notification.message.clone(),
        is_read: notification.is_read,
        created_at: notification.created_at,
    }
}
