//! Shared identifier wrappers for Concord.
//!
//! Row identifiers are database-assigned integers wrapped in newtypes so a
//! contract id can never be passed where a user id is expected. Stored blobs
//! are addressed by [`FileRef`], a generated collision-free file name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Error returned when parsing an identifier fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdParseError {}

macro_rules! define_row_id {
    ($name:ident, $label:expr) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }

            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                let parsed = value
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| IdParseError::new(format!("Invalid {}: {}", $label, e)))?;
                if parsed <= 0 {
                    return Err(IdParseError::new(format!(
                        "Invalid {}: must be positive, got {}",
                        $label, parsed
                    )));
                }
                Ok(Self(parsed))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_row_id!(UserId, "user ID");
define_row_id!(ContractId, "contract ID");
define_row_id!(VersionId, "version ID");
define_row_id!(NotificationId, "notification ID");

/// Reference to a stored blob: `<uuid-v4><original extension>`.
///
/// The engine only ever holds this string; bytes live behind a file store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(String);

impl FileRef {
    /// Generate a fresh reference, keeping the extension of `original_name`
    /// when it is plain alphanumeric.
    pub fn generate(original_name: &str) -> Self {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        Self(format!("{}{}", Uuid::new_v4(), extension))
    }

    /// Wrap a reference read back from storage.
    ///
    /// Rejects anything that could escape a blob directory.
    pub fn parse(value: &str) -> Result<Self, IdParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdParseError::new("Invalid file reference: empty"));
        }
        if trimmed.contains('/') || trimmed.contains('\\') || trimmed.starts_with('.') {
            return Err(IdParseError::new(format!(
                "Invalid file reference: {}",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FileRef {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
