//! Tracked executions
//!
//! A [`TrackedExecution`] is the live side of one command: its state,
//! its cancellation token and a token that fires once the execution has
//! been removed from the session. [`ExecutionRecord`] is the plain-data
//! view handed out through status queries.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

/// How an execution is expected to end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// Runs to completion
    Adhoc,
    /// Long-running dev server, ends only when stopped
    Server,
}

/// Lifecycle of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Running)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionState::Running => "RUNNING",
            ExecutionState::Completed => "COMPLETED",
            ExecutionState::Failed => "FAILED",
            ExecutionState::TimedOut => "TIMED_OUT",
            ExecutionState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Snapshot of one tracked execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub command_id: String,
    pub command: String,
    pub kind: ExecutionKind,
    pub state: ExecutionState,
    pub started_at: DateTime<Utc>,
    pub port: u16,
    pub pid: Option<u32>,
}

/// Outcome of a kill request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KillResult {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Live state of one execution
#[derive(Debug)]
pub struct TrackedExecution {
    id: String,
    command: String,
    kind: ExecutionKind,
    port: u16,
    started_at: DateTime<Utc>,
    pid: AtomicU32,
    state: Mutex<ExecutionState>,
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl TrackedExecution {
    pub(crate) fn new(id: String, command: String, kind: ExecutionKind, port: u16) -> Self {
        Self {
            id,
            command,
            kind,
            port,
            started_at: Utc::now(),
            pid: AtomicU32::new(0),
            state: Mutex::new(ExecutionState::Running),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn kind(&self) -> ExecutionKind {
        self.kind
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> ExecutionState {
        *self.state.lock()
    }

    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub(crate) fn set_pid(&self, pid: Option<u32>) {
        self.pid.store(pid.unwrap_or(0), Ordering::SeqCst);
    }

    /// Move from `Running` to a terminal state
    ///
    /// Returns false if another path already settled the execution.
    pub fn finish(&self, terminal: ExecutionState) -> bool {
        debug_assert!(terminal.is_terminal());
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = terminal;
        true
    }

    /// Settle as cancelled and signal the owning task
    pub fn request_cancel(&self) -> bool {
        let settled = self.finish(ExecutionState::Cancelled);
        if settled {
            self.cancel.cancel();
        }
        settled
    }

    /// Token the owning task listens on for cancellation
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves once the execution has left the session
    pub async fn wait_finished(&self) {
        self.finished.cancelled().await
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.cancel();
    }

    pub fn record(&self) -> ExecutionRecord {
        ExecutionRecord {
            command_id: self.id.clone(),
            command: self.command.clone(),
            kind: self.kind,
            state: self.state(),
            started_at: self.started_at,
            port: self.port,
            pid: self.pid(),
        }
    }
}
