//! Environment variable overrides
//!
//! Overrides are read from an explicit map so callers can pass
//! `std::env::vars()` or a fixture.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::types::EngineConfig;
use crate::error::{SandboxError, SandboxResult};

/// Prefix shared by every recognised variable
pub const ENV_PREFIX: &str = "WARDEN_";

/// Apply `WARDEN_*` overrides onto a configuration
pub fn apply_env_overrides(
    config: &mut EngineConfig,
    vars: &HashMap<String, String>,
) -> SandboxResult<()> {
    if let Some(ms) = parse_var::<u64>(vars, "DEFAULT_TIMEOUT_MS")? {
        config.policy.default_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = parse_var::<u64>(vars, "MAX_TIMEOUT_MS")? {
        config.policy.max_timeout = Duration::from_millis(ms);
    }
    if let Some(max) = parse_var::<usize>(vars, "MAX_CONCURRENT")? {
        config.session.max_concurrent = max;
    }
    if let Some(port) = parse_var::<u16>(vars, "BASE_PORT")? {
        config.session.base_port = port;
    }
    if let Some(dir) = lookup(vars, "ROOT_DIR") {
        config.session.root_dir = Some(PathBuf::from(dir));
    }
    if let Some(ms) = parse_var::<u64>(vars, "GRACE_PERIOD_MS")? {
        config.supervisor.grace_period = Duration::from_millis(ms);
    }
    if let Some(level) = lookup(vars, "LOG_LEVEL") {
        config.logging.level = level.to_string();
    }
    if let Some(format) = lookup(vars, "LOG_FORMAT") {
        config.logging.format = format.to_lowercase();
    }
    Ok(())
}

fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(&format!("{}{}", ENV_PREFIX, key))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, key: &str) -> SandboxResult<Option<T>> {
    match lookup(vars, key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            SandboxError::Config(format!("Invalid {}{} value '{}'", ENV_PREFIX, key, raw))
        }),
    }
}
