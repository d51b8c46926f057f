//! `warden check`

use colored::*;
use std::time::Duration;
use warden_core::{SandboxEngine, ValidationOptions};

use crate::console::CliConsole;

pub fn execute(
    engine: &SandboxEngine,
    console: &CliConsole,
    command: &str,
    timeout: Option<Duration>,
    json: bool,
) -> anyhow::Result<i32> {
    let verdict = engine.validate_command(command, &ValidationOptions { timeout });

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else if verdict.allowed {
        console.success(&format!(
            "allowed: {}",
            verdict.sanitized_command.as_deref().unwrap_or_default()
        ));
        println!("  {} {}ms", "timeout:".dimmed(), verdict.timeout_ms());
    } else {
        console.error(&format!(
            "denied: {}",
            verdict.reason.as_deref().unwrap_or("no reason given")
        ));
    }

    Ok(if verdict.allowed { 0 } else { 1 })
}
