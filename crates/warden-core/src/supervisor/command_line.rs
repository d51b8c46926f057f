//! Turning a sanitized command into a process to spawn

use shell_words::split;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{SandboxError, SandboxResult};

/// How a command will be started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnPlan {
    /// Plain argv, no shell in between
    Direct { program: String, args: Vec<String> },
    /// Needs shell features; run through the platform shell
    Shell { script: String },
}

impl SpawnPlan {
    /// Decide how to spawn a command
    ///
    /// Commands using pipes, chaining, redirection, substitution, globs or
    /// variable expansion go through the shell. Everything else is split
    /// into argv.
    pub fn parse(command: &str) -> SandboxResult<Self> {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return Err(SandboxError::InvalidOptions(
                "command must not be empty".to_string(),
            ));
        }

        if needs_shell(trimmed) {
            return Ok(SpawnPlan::Shell {
                script: trimmed.to_string(),
            });
        }

        let argv = split(trimmed).map_err(|e| {
            SandboxError::InvalidOptions(format!("failed to parse command line: {}", e))
        })?;
        let (program, args) = argv
            .split_first()
            .map(|(p, rest)| (p.clone(), rest.to_vec()))
            .ok_or_else(|| {
                SandboxError::InvalidOptions("command must include a program".to_string())
            })?;

        Ok(SpawnPlan::Direct { program, args })
    }

    pub fn uses_shell(&self) -> bool {
        matches!(self, SpawnPlan::Shell { .. })
    }

    /// Build the command with piped output and no stdin
    pub fn to_command(&self) -> Command {
        let mut cmd = match self {
            #[cfg(unix)]
            SpawnPlan::Direct { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            // Package managers are .cmd shims on Windows and need cmd.exe
            #[cfg(windows)]
            SpawnPlan::Direct { program, args } => {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(program).args(args);
                cmd
            }
            SpawnPlan::Shell { script } => shell_command(script),
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[cfg(unix)]
fn shell_command(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

#[cfg(windows)]
fn shell_command(script: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(script);
    cmd
}

/// Whether any unquoted character needs a shell to interpret it
fn needs_shell(command: &str) -> bool {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for c in command.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            // Expansion still happens inside double quotes
            '$' | '`' if !in_single => return true,
            '|' | '&' | ';' | '<' | '>' | '*' | '?' | '[' | '~' | '(' | ')' | '{' | '}'
                if !in_single && !in_double =>
            {
                return true;
            }
            _ => {}
        }
    }
    false
}
