//! Policy gateway
//!
//! Decides whether a raw command may run. Checks run in a fixed order and
//! the first failing check names the denial:
//!
//! 1. empty input
//! 2. malformed input (NUL bytes, over-long, unterminated quotes)
//! 3. blocked base command
//! 4. dangerous command shapes, tested against the original text
//! 5. dangerous arguments
//! 6. base command not on the allowlist
//! 7. any segment of a compound command blocked or not allowlisted
//!
//! An allowed command is sanitized and assigned a budget. The only side
//! effect of validation is bumping the executed/blocked counters.

mod sanitize;
mod types;


pub use sanitize::{sanitize, split_segments};
pub use types::{DenialKind, ValidationOptions, ValidationResult};

use crate::error::SandboxResult;
use crate::policy::{PolicySnapshot, SecurityPolicy, SharedPolicy, base_command};
use crate::stats::SharedStats;

/// Front door for every command
#[derive(Debug, Clone)]
pub struct PolicyGateway {
    policy: SharedPolicy,
    stats: SharedStats,
}

impl PolicyGateway {
    pub fn new(policy: SharedPolicy, stats: SharedStats) -> Self {
        Self { policy, stats }
    }

    pub fn policy(&self) -> &SharedPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    /// Validate a raw command
    pub fn validate_command(&self, raw: &str, options: &ValidationOptions) -> ValidationResult {
        let result = {
            let policy = self.policy.read();
            evaluate(&policy, raw, options)
        };

        if result.allowed {
            self.stats.commands_executed.inc();
            tracing::debug!(
                command = result.sanitized_command.as_deref().unwrap_or_default(),
                timeout_ms = result.timeout_ms(),
                "command allowed"
            );
        } else {
            self.stats.commands_blocked.inc();
            tracing::warn!(
                command = %raw.trim(),
                reason = result.reason.as_deref().unwrap_or_default(),
                "command denied"
            );
        }

        result
    }

    pub fn allow_command(&self, command: &str) -> bool {
        self.policy.write().allow_command(command)
    }

    pub fn disallow_command(&self, command: &str) -> bool {
        self.policy.write().disallow_command(command)
    }

    pub fn block_command(&self, command: &str) -> bool {
        self.policy.write().block_command(command)
    }

    pub fn unblock_command(&self, command: &str) -> bool {
        self.policy.write().unblock_command(command)
    }

    pub fn export_config(&self) -> PolicySnapshot {
        self.policy.read().export()
    }

    pub fn import_config(&self, snapshot: PolicySnapshot) -> SandboxResult<()> {
        self.policy.write().import(snapshot)
    }
}

fn evaluate(policy: &SecurityPolicy, raw: &str, options: &ValidationOptions) -> ValidationResult {
    let trimmed = raw.trim();
    let base = base_command(trimmed).unwrap_or_default();
    let timeout = policy.effective_timeout(&base, options.timeout);

    if trimmed.is_empty() {
        return ValidationResult::deny(DenialKind::Empty, "empty command", timeout);
    }

    let args = match check_well_formed(policy, trimmed) {
        Ok(args) => args,
        Err(problem) => {
            return ValidationResult::deny(
                DenialKind::Malformed,
                format!("validation error: {}", problem),
                timeout,
            );
        }
    };

    if policy.is_blocked(&base) {
        return ValidationResult::deny(
            DenialKind::Blocked,
            format!("'{}' is explicitly blocked", base),
            timeout,
        );
    }

    if let Some(pattern) = policy.matching_pattern(trimmed) {
        return ValidationResult::deny(
            DenialKind::DangerousPattern,
            format!("dangerous pattern: {}", pattern.name()),
            timeout,
        );
    }

    if let Some(arg) = policy.dangerous_arg(args.iter().map(String::as_str)) {
        return ValidationResult::deny(
            DenialKind::DangerousArgument,
            format!("dangerous argument: {}", arg),
            timeout,
        );
    }

    if !policy.is_allowed(&base) {
        return ValidationResult::deny(
            DenialKind::NotAllowed,
            format!("'{}' is not in the allowed command list", base),
            timeout,
        );
    }

    if let Some(reason) = check_segments(policy, trimmed) {
        return ValidationResult::deny(DenialKind::ChainedCommand, reason, timeout);
    }

    ValidationResult::pass(sanitize(trimmed), timeout)
}

/// Structural checks; returns the arguments after the base command
fn check_well_formed(policy: &SecurityPolicy, command: &str) -> Result<Vec<String>, String> {
    if command.contains('\0') {
        return Err("command contains a NUL byte".to_string());
    }
    if let Some(c) = command
        .chars()
        .find(|c| c.is_control() && !matches!(*c, '\t' | '\n' | '\r'))
    {
        return Err(format!("command contains control character {:?}", c));
    }
    if command.len() > policy.max_command_length() {
        return Err(format!(
            "command is {} bytes, limit is {}",
            command.len(),
            policy.max_command_length()
        ));
    }
    let words = shell_words::split(command)
        .map_err(|_| "unterminated quote or trailing escape".to_string())?;
    // Raw tokens too, so quoting cannot hide an argument
    let args = words
        .into_iter()
        .skip(1)
        .chain(command.split_whitespace().skip(1).map(str::to_string))
        .collect();
    Ok(args)
}

fn check_segments(policy: &SecurityPolicy, command: &str) -> Option<String> {
    let segments = split_segments(command);
    if segments.len() < 2 {
        return None;
    }

    for segment in &segments {
        let Some(base) = base_command(segment) else {
            continue;
        };
        if policy.is_blocked(&base) {
            return Some(format!("chained command '{}' is explicitly blocked", base));
        }
        if !policy.is_allowed(&base) {
            return Some(format!(
                "chained command '{}' is not in the allowed command list",
                base
            ));
        }
    }
    None
}
