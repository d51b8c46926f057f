//! Security policy
//!
//! The data side of command validation: which commands may run, which are
//! refused outright, which command shapes and arguments are dangerous, and
//! how execution budgets are assigned. The policy is handed to the gateway
//! explicitly as a [`SharedPolicy`]; there is no process-wide instance.

mod defaults;
mod patterns;
mod snapshot;

#[cfg(test)]
mod tests;

pub use defaults::{
    default_allowed_commands, default_blocked_commands, default_command_timeouts,
    default_dangerous_args,
};
pub use patterns::{DangerousPattern, builtin_patterns};
pub use snapshot::PolicySnapshot;

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::config::PolicyConfig;
use crate::error::{SandboxError, SandboxResult};

/// Policy shared between the gateway, sessions and the host
pub type SharedPolicy = Arc<RwLock<SecurityPolicy>>;

/// Shortest budget ever handed out
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Command security policy
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    allowed_commands: BTreeSet<String>,
    blocked_commands: BTreeSet<String>,
    dangerous_patterns: Vec<DangerousPattern>,
    dangerous_args: BTreeSet<String>,
    default_timeout: Duration,
    max_timeout: Duration,
    command_timeouts: BTreeMap<String, Duration>,
    max_command_length: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            allowed_commands: normalize_all(default_allowed_commands()),
            blocked_commands: normalize_all(default_blocked_commands()),
            dangerous_patterns: builtin_patterns(),
            dangerous_args: default_dangerous_args().into_iter().collect(),
            default_timeout: Duration::from_secs(30),
            max_timeout: Duration::from_secs(300),
            command_timeouts: default_command_timeouts(),
            max_command_length: 8192,
        }
    }
}

impl SecurityPolicy {
    /// Build a policy from configuration
    pub fn from_config(config: &PolicyConfig) -> SandboxResult<Self> {
        let mut dangerous_patterns = builtin_patterns();
        for extra in &config.extra_patterns {
            let pattern = DangerousPattern::new(&extra.name, &extra.pattern).map_err(|e| {
                SandboxError::Config(format!("pattern '{}' does not compile: {}", extra.name, e))
            })?;
            dangerous_patterns.push(pattern);
        }

        let policy = Self {
            allowed_commands: normalize_all(config.allowed_commands.clone()),
            blocked_commands: normalize_all(config.blocked_commands.clone()),
            dangerous_patterns,
            dangerous_args: config.dangerous_args.iter().cloned().collect(),
            default_timeout: config.default_timeout,
            max_timeout: config.max_timeout,
            command_timeouts: config
                .command_timeouts
                .iter()
                .map(|(name, timeout)| (normalize(name), *timeout))
                .collect(),
            max_command_length: config.max_command_length,
        };
        policy.export().validate()?;
        Ok(policy)
    }

    /// Wrap into a [`SharedPolicy`]
    pub fn shared(self) -> SharedPolicy {
        Arc::new(RwLock::new(self))
    }

    /// Exact allowlist membership
    pub fn is_allowed(&self, base_command: &str) -> bool {
        self.allowed_commands.contains(base_command)
    }

    /// Blocklist membership, including path and `.exe` forms of the token
    pub fn is_blocked(&self, base_command: &str) -> bool {
        blocklist_forms(base_command).any(|form| self.blocked_commands.contains(&form))
    }

    /// First dangerous pattern matching the command
    pub fn matching_pattern(&self, command: &str) -> Option<&DangerousPattern> {
        self.dangerous_patterns.iter().find(|p| p.is_match(command))
    }

    /// First token that is a known dangerous argument
    pub fn dangerous_arg<'a, I>(&self, tokens: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tokens
            .into_iter()
            .find(|token| self.dangerous_args.contains(*token))
    }

    /// Execution budget for a base command
    ///
    /// An explicit override wins over the per-command table, which wins over
    /// the default. The result is clamped into `[MIN_TIMEOUT, max_timeout]`.
    pub fn effective_timeout(&self, base_command: &str, requested: Option<Duration>) -> Duration {
        let timeout = requested
            .or_else(|| self.command_timeouts.get(base_command).copied())
            .unwrap_or(self.default_timeout);
        timeout.min(self.max_timeout).max(MIN_TIMEOUT)
    }

    /// Add to the allowlist; false if already present
    pub fn allow_command(&mut self, command: &str) -> bool {
        insert_normalized(&mut self.allowed_commands, command)
    }

    /// Remove from the allowlist; false if absent
    pub fn disallow_command(&mut self, command: &str) -> bool {
        self.allowed_commands.remove(&normalize(command))
    }

    /// Add to the blocklist; false if already present
    pub fn block_command(&mut self, command: &str) -> bool {
        insert_normalized(&mut self.blocked_commands, command)
    }

    /// Remove from the blocklist; false if absent
    pub fn unblock_command(&mut self, command: &str) -> bool {
        self.blocked_commands.remove(&normalize(command))
    }

    /// Set the budget for one base command
    pub fn set_command_timeout(&mut self, command: &str, timeout: Duration) {
        let name = normalize(command);
        if !name.is_empty() {
            self.command_timeouts.insert(name, timeout);
        }
    }

    pub fn allowed_commands(&self) -> &BTreeSet<String> {
        &self.allowed_commands
    }

    pub fn blocked_commands(&self) -> &BTreeSet<String> {
        &self.blocked_commands
    }

    pub fn dangerous_patterns(&self) -> &[DangerousPattern] {
        &self.dangerous_patterns
    }

    pub fn dangerous_args(&self) -> &BTreeSet<String> {
        &self.dangerous_args
    }

    pub fn command_timeouts(&self) -> &BTreeMap<String, Duration> {
        &self.command_timeouts
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn max_timeout(&self) -> Duration {
        self.max_timeout
    }

    pub fn max_command_length(&self) -> usize {
        self.max_command_length
    }

    /// Export the mutable state
    pub fn export(&self) -> PolicySnapshot {
        PolicySnapshot {
            default_timeout: self.default_timeout,
            max_timeout: self.max_timeout,
            allowed_commands: self.allowed_commands.clone(),
            blocked_commands: self.blocked_commands.clone(),
        }
    }

    /// Replace the mutable state with a snapshot
    ///
    /// The snapshot is validated first; on error the policy is untouched.
    pub fn import(&mut self, snapshot: PolicySnapshot) -> SandboxResult<()> {
        snapshot.validate()?;
        self.default_timeout = snapshot.default_timeout;
        self.max_timeout = snapshot.max_timeout;
        self.allowed_commands = normalize_all(snapshot.allowed_commands);
        self.blocked_commands = normalize_all(snapshot.blocked_commands);
        Ok(())
    }
}

/// Case-folded first token of a command
pub fn base_command(command: &str) -> Option<String> {
    command.split_whitespace().next().map(str::to_lowercase)
}

fn normalize(command: &str) -> String {
    command.trim().to_lowercase()
}

fn normalize_all(commands: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    commands
        .into_iter()
        .map(|c| normalize(&c))
        .filter(|c| !c.is_empty())
        .collect()
}

fn insert_normalized(set: &mut BTreeSet<String>, command: &str) -> bool {
    let name = normalize(command);
    !name.is_empty() && set.insert(name)
}

/// The token itself, its file name, and the file name without `.exe`
fn blocklist_forms(token: &str) -> impl Iterator<Item = String> {
    let file_name = token.rsplit(['/', '\\']).next().unwrap_or(token).to_string();
    let stem = file_name
        .strip_suffix(".exe")
        .map(str::to_string)
        .unwrap_or_else(|| file_name.clone());
    [token.to_string(), file_name, stem].into_iter()
}
