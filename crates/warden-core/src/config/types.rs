//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{SandboxError, SandboxResult};
use crate::policy::{
    PolicySnapshot, default_allowed_commands, default_blocked_commands, default_command_timeouts,
    default_dangerous_args,
};
use crate::supervisor::{FrameworkProfile, ResourceLimits, builtin_profiles};

/// Log formats understood by the CLI subscriber
pub const LOG_FORMATS: &[&str] = &["pretty", "compact", "json"];

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub policy: PolicyConfig,
    pub session: SessionConfig,
    pub supervisor: SupervisorConfig,
    pub dev_server: DevServerConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> SandboxResult<()> {
        self.policy.validate()?;

        if self.session.max_concurrent == 0 {
            return Err(SandboxError::Config(
                "session.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.session.base_port == 0 {
            return Err(SandboxError::Config(
                "session.base_port must be greater than zero".to_string(),
            ));
        }
        if self.supervisor.max_output_bytes == 0 {
            return Err(SandboxError::Config(
                "supervisor.max_output_bytes must be greater than zero".to_string(),
            ));
        }
        for (name, profile) in &self.dev_server.frameworks {
            if profile.command.trim().is_empty() {
                return Err(SandboxError::Config(format!(
                    "dev_server.frameworks.{} has an empty command",
                    name
                )));
            }
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(SandboxError::Config(format!(
                "logging.format must be one of {:?}, got '{}'",
                LOG_FORMATS, self.logging.format
            )));
        }
        Ok(())
    }
}

/// A user-supplied dangerous pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub pattern: String,
}

/// Policy section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub max_timeout: Duration,

    /// Budgets per base command, e.g. `npm = "2m"`
    #[serde(with = "duration_map")]
    pub command_timeouts: BTreeMap<String, Duration>,

    /// Longest command accepted, in bytes
    pub max_command_length: usize,

    pub allowed_commands: Vec<String>,
    pub blocked_commands: Vec<String>,
    pub dangerous_args: Vec<String>,

    /// Appended after the built-in dangerous patterns
    pub extra_patterns: Vec<PatternConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            max_timeout: Duration::from_secs(300),
            command_timeouts: default_command_timeouts(),
            max_command_length: 8192,
            allowed_commands: default_allowed_commands(),
            blocked_commands: default_blocked_commands(),
            dangerous_args: default_dangerous_args(),
            extra_patterns: Vec::new(),
        }
    }
}

impl PolicyConfig {
    fn validate(&self) -> SandboxResult<()> {
        PolicySnapshot {
            default_timeout: self.default_timeout,
            max_timeout: self.max_timeout,
            allowed_commands: Default::default(),
            blocked_commands: Default::default(),
        }
        .validate()?;

        if self.max_command_length == 0 {
            return Err(SandboxError::Config(
                "policy.max_command_length must be greater than zero".to_string(),
            ));
        }
        for extra in &self.extra_patterns {
            regex::Regex::new(&extra.pattern).map_err(|e| {
                SandboxError::Config(format!("pattern '{}' does not compile: {}", extra.name, e))
            })?;
        }
        Ok(())
    }
}

/// Session section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Parent directory for generated session directories
    pub root_dir: Option<PathBuf>,

    /// Use this directory as-is instead of generating one
    pub working_dir: Option<PathBuf>,

    /// Delete the working directory during cleanup
    pub remove_on_cleanup: bool,

    /// First port handed out; later allocations count upwards
    pub base_port: u16,

    /// Simultaneous executions per session
    pub max_concurrent: usize,

    /// How long cleanup waits for cancelled executions to settle
    #[serde(with = "humantime_serde")]
    pub cleanup_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            working_dir: None,
            remove_on_cleanup: true,
            base_port: 3000,
            max_concurrent: 8,
            cleanup_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Directory under which generated session directories are created
    pub fn effective_root(&self) -> PathBuf {
        self.root_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("warden"))
    }
}

/// Supervisor section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Time between SIGTERM and SIGKILL
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,

    /// Cap per captured stream
    pub max_output_bytes: usize,

    /// Start children with the host environment
    pub inherit_env: bool,

    pub limits: ResourceLimits,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(2),
            max_output_bytes: 10 * 1024 * 1024,
            inherit_env: true,
            limits: ResourceLimits::default(),
        }
    }
}

/// Dev-server section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevServerConfig {
    /// Outer bound on waiting for a readiness marker
    #[serde(with = "humantime_serde")]
    pub startup_timeout: Duration,

    /// Host used when building the server URL
    pub host: String,

    /// Profiles by framework name; merged over the built-in ones
    pub frameworks: BTreeMap<String, FrameworkProfile>,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(30),
            host: "localhost".to_string(),
            frameworks: builtin_profiles(),
        }
    }
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, compact, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// `BTreeMap<String, Duration>` with human-readable values
mod duration_map {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;
    use std::time::Duration;

    pub fn serialize<S>(map: &BTreeMap<String, Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        map.iter()
            .map(|(name, timeout)| (name.as_str(), humantime_serde::Serde::from(*timeout)))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, humantime_serde::Serde<Duration>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(name, timeout)| (name, timeout.into_inner()))
            .collect())
    }
}
