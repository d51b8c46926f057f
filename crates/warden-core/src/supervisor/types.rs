//! Supervisor request and result types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Every option an execution request recognises
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Budget override; clamped by the policy during validation
    pub timeout: Option<Duration>,
    /// Variables layered over the base environment and `PORT`
    pub env: HashMap<String, String>,
    /// Relative directory inside the session working directory
    pub cwd: Option<PathBuf>,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Successful run of an adhoc command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub command_id: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub elapsed_ms: u64,
}

/// A dev server that reported ready
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevServerHandle {
    pub url: String,
    pub port: u16,
    pub command_id: String,
}

/// Which pipe a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Piece of live output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub command_id: String,
    pub stream: OutputStream,
    pub text: String,
}

/// Callback receiving live output, in pipe order per stream
pub type OutputObserver = Arc<dyn Fn(OutputChunk) + Send + Sync>;
