//! Exportable policy state

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{SandboxError, SandboxResult};

/// Plain-data view of the mutable parts of a [`super::SecurityPolicy`]
///
/// Safe to persist and hand back to [`super::SecurityPolicy::import`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub max_timeout: Duration,
    pub allowed_commands: BTreeSet<String>,
    pub blocked_commands: BTreeSet<String>,
}

impl PolicySnapshot {
    /// Check timeouts are usable
    pub fn validate(&self) -> SandboxResult<()> {
        if self.default_timeout.is_zero() {
            return Err(SandboxError::Config(
                "default_timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_timeout < self.default_timeout {
            return Err(SandboxError::Config(format!(
                "max_timeout ({:?}) must not be lower than default_timeout ({:?})",
                self.max_timeout, self.default_timeout
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> SandboxResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SandboxError::Config(e.to_string()))
    }

    pub fn from_json(json: &str) -> SandboxResult<Self> {
        serde_json::from_str(json).map_err(|e| SandboxError::Config(e.to_string()))
    }
}
