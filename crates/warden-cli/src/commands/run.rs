//! `warden run`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use warden_core::{ExecutionOptions, OutputChunk, OutputObserver, SandboxEngine, SandboxError};

use crate::console::{CliConsole, print_chunk};
use crate::signal_handler::{INTERRUPTED, wait_for_shutdown};

/// Exit code for a command that ran out of time, as timeout(1) uses
const TIMED_OUT: i32 = 124;
const DENIED: i32 = 126;
const NOT_STARTED: i32 = 127;

pub async fn execute(
    engine: &SandboxEngine,
    console: &CliConsole,
    command: &str,
    timeout: Option<Duration>,
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
) -> anyhow::Result<i32> {
    engine.initialize().await?;

    let options = ExecutionOptions {
        timeout,
        env: env.into_iter().collect::<HashMap<_, _>>(),
        cwd,
    };
    let observer: OutputObserver = Arc::new(|chunk: OutputChunk| print_chunk(&chunk));

    let code = tokio::select! {
        result = engine.execute_in_sandbox(command, options, Some(observer)) => {
            exit_code(console, result)
        }
        signal = wait_for_shutdown() => {
            console.warn(&format!("Interrupted (signal {}), stopping", signal?));
            INTERRUPTED
        }
    };

    let report = engine.cleanup().await;
    console.info(&format!(
        "Session closed ({} cancelled, {} forced)",
        report.cancelled, report.forced
    ));
    Ok(code)
}

fn exit_code(
    console: &CliConsole,
    result: Result<warden_core::ExecutionOutcome, SandboxError>,
) -> i32 {
    match result {
        Ok(outcome) => {
            console.info(&format!(
                "{} finished in {}ms",
                outcome.command_id, outcome.elapsed_ms
            ));
            0
        }
        Err(e) => {
            console.error(&e.to_string());
            match e {
                SandboxError::Execution { exit_code, .. } => exit_code.unwrap_or(1),
                SandboxError::Timeout { .. } => TIMED_OUT,
                SandboxError::Denied { .. } => DENIED,
                SandboxError::Spawn { .. } => NOT_STARTED,
                SandboxError::Cancelled { .. } => INTERRUPTED,
                _ => 1,
            }
        }
    }
}
