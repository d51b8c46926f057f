//! Types for command validation

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request validation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Explicit budget; still clamped to the policy maximum
    pub timeout: Option<Duration>,
}

impl ValidationOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Which check refused a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Empty,
    Malformed,
    Blocked,
    DangerousPattern,
    DangerousArgument,
    NotAllowed,
    ChainedCommand,
}

impl DenialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialKind::Empty => "empty",
            DenialKind::Malformed => "malformed",
            DenialKind::Blocked => "blocked",
            DenialKind::DangerousPattern => "dangerous_pattern",
            DenialKind::DangerousArgument => "dangerous_argument",
            DenialKind::NotAllowed => "not_allowed",
            DenialKind::ChainedCommand => "chained_command",
        }
    }
}

/// Verdict for one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the command may run
    pub allowed: bool,
    /// Why it may not (if not allowed)
    pub reason: Option<String>,
    /// Which check refused it (if not allowed)
    pub denial: Option<DenialKind>,
    /// Normalised command to hand to the supervisor (if allowed)
    pub sanitized_command: Option<String>,
    /// Assigned execution budget
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl ValidationResult {
    /// Create a passing result
    pub fn pass(sanitized_command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            allowed: true,
            reason: None,
            denial: None,
            sanitized_command: Some(sanitized_command.into()),
            timeout,
        }
    }

    /// Create a blocking result
    pub fn deny(kind: DenialKind, reason: impl Into<String>, timeout: Duration) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            denial: Some(kind),
            sanitized_command: None,
            timeout,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}
