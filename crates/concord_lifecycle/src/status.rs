use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Contract status.
///
/// `Pending` is the initial state. `Signed` and `Denied` are final; `Complete`
/// is settled (both parties approved) and only moves on to `Signed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Pending,
    Edited,
    Signed,
    Denied,
    Approved,
    Complete,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 6] = [
        ContractStatus::Pending,
        ContractStatus::Edited,
        ContractStatus::Signed,
        ContractStatus::Denied,
        ContractStatus::Approved,
        ContractStatus::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Pending => "pending",
            ContractStatus::Edited => "edited",
            ContractStatus::Signed => "signed",
            ContractStatus::Denied => "denied",
            ContractStatus::Approved => "approved",
            ContractStatus::Complete => "complete",
        }
    }

    /// Terminal states: no lock, edit, approval or denial is accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContractStatus::Signed | ContractStatus::Denied | ContractStatus::Complete
        )
    }

    /// Final states: nothing at all is accepted, not even a signature.
    pub fn is_final(&self) -> bool {
        matches!(self, ContractStatus::Signed | ContractStatus::Denied)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when parsing a ContractStatus from string.
#[derive(Debug, Error, Clone)]
#[error("invalid contract status: {0}")]
pub struct StatusParseError(String);

impl std::str::FromStr for ContractStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ContractStatus::Pending),
            "edited" => Ok(ContractStatus::Edited),
            "signed" => Ok(ContractStatus::Signed),
            "denied" => Ok(ContractStatus::Denied),
            "approved" => Ok(ContractStatus::Approved),
            "complete" => Ok(ContractStatus::Complete),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in ContractStatus::ALL {
            let parsed: ContractStatus = status.as_str().parse().unwrap();
            assert_eq!(status, parsed);
        }
        assert!("archived".parse::<ContractStatus>().is_err());
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        let json = serde_json::to_string(&ContractStatus::Complete).unwrap();
        assert_eq!(json, "\"complete\"");
    }

    #[test]
    fn test_terminal_detection() {
        assert!(!ContractStatus::Pending.is_terminal());
        assert!(!ContractStatus::Edited.is_terminal());
        assert!(!ContractStatus::Approved.is_terminal());
        assert!(ContractStatus::Complete.is_terminal());
        assert!(ContractStatus::Signed.is_terminal());
        assert!(ContractStatus::Denied.is_terminal());

        assert!(!ContractStatus::Complete.is_final());
        assert!(ContractStatus::Signed.is_final());
    }
}
