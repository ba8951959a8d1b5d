//! Engine configuration.
//!
//! Loaded from the `[engine]` table of `config.toml`; every field has a
//! default so an absent file or table is valid.

use chrono::Duration;
use concord_lifecycle::{LifecyclePolicy, LifecycleRules};
use concord_protocol::defaults::DEFAULT_NOTIFICATION_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Lifecycle policy: `strict` (dual approval) or `legacy`.
    pub policy: LifecyclePolicy,
    /// Seconds after which an edit lock stops excluding the other party.
    /// Unset means locks never expire.
    pub lock_ttl_secs: Option<u64>,
    /// Default page size of the notification inbox.
    pub notification_limit: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: LifecyclePolicy::default(),
            lock_ttl_secs: None,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineConfig,
}

impl EngineConfig {
    /// Parse the `[engine]` table out of a full config document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        file.engine.validate()?;
        Ok(file.engine)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_limit <= 0 {
            return Err(ConfigError::Invalid(format!(
                "notification_limit must be positive, got {}",
                self.notification_limit
            )));
        }
        if self.lock_ttl_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "lock_ttl_secs must be positive when set".to_string(),
            ));
        }
        if let Some(secs) = self.lock_ttl_secs {
            if self.lock_ttl().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "lock_ttl_secs is too large: {}",
                    secs
                )));
            }
        }
        Ok(())
    }

    pub fn lock_ttl(&self) -> Option<Duration> {
        self.lock_ttl_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
    }

    /// Lifecycle rules this configuration selects.
    pub fn rules(&self) -> LifecycleRules {
        LifecycleRules::new(self.policy).with_lock_ttl(self.lock_ttl())
    }
}
