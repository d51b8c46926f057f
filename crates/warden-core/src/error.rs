//! Error types for the sandbox engine
//!
//! Validation denials are returned as data by the gateway. Everything that can
//! go wrong once a command is handed to the supervisor is a [`SandboxError`].

use serde::{Deserialize, Serialize};

/// Result type for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors that can occur during sandbox operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SandboxError {
    /// Command rejected by the policy gateway
    #[error("Command denied: {reason}")]
    Denied { reason: String },

    /// The OS failed to start the process
    #[error("Failed to spawn '{command}': {message}")]
    Spawn { command: String, message: String },

    /// The process ran and exited unsuccessfully
    #[error("Command {command_id} exited with {}", describe_exit(.exit_code))]
    Execution {
        command_id: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The process exceeded its execution budget
    #[error("Command {command_id} timed out after {elapsed_ms}ms")]
    Timeout {
        command_id: String,
        elapsed_ms: u64,
        stdout: String,
        stderr: String,
    },

    /// The process was explicitly killed
    #[error("Command {command_id} was cancelled")]
    Cancelled { command_id: String },

    /// The session is not in a state that accepts work
    #[error("Session is not ready (state: {state})")]
    SessionNotReady { state: String },

    /// Session initialization failed
    #[error("Session initialization failed: {0}")]
    Initialization(String),

    /// No tracked execution with this id
    #[error("Unknown execution: {0}")]
    UnknownExecution(String),

    /// No dev-server profile for this framework
    #[error("Unknown framework: {0}")]
    UnknownFramework(String),

    /// Caller supplied options that cannot be honoured
    #[error("Invalid execution options: {0}")]
    InvalidOptions(String),

    /// Invalid configuration or policy snapshot
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The session's port range is used up
    #[error("No ports left to allocate")]
    PortsExhausted,

    /// Filesystem or process IO failure
    #[error("IO error: {0}")]
    Io(String),
}

/// Coarse classification of a [`SandboxError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationDenied,
    Spawn,
    Execution,
    Timeout,
    Cancelled,
    Session,
    Configuration,
    Internal,
}

impl SandboxError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::Denied { .. } => ErrorKind::ValidationDenied,
            SandboxError::Spawn { .. } => ErrorKind::Spawn,
            SandboxError::Execution { .. } => ErrorKind::Execution,
            SandboxError::Timeout { .. } => ErrorKind::Timeout,
            SandboxError::Cancelled { .. } => ErrorKind::Cancelled,
            SandboxError::SessionNotReady { .. }
            | SandboxError::Initialization(_)
            | SandboxError::UnknownExecution(_)
            | SandboxError::PortsExhausted => ErrorKind::Session,
            SandboxError::UnknownFramework(_)
            | SandboxError::InvalidOptions(_)
            | SandboxError::Config(_) => ErrorKind::Configuration,
            SandboxError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Stable code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            SandboxError::Denied { .. } => "validation_denied",
            SandboxError::Spawn { .. } => "spawn_failed",
            SandboxError::Execution { .. } => "execution_failed",
            SandboxError::Timeout { .. } => "timeout",
            SandboxError::Cancelled { .. } => "cancelled",
            SandboxError::SessionNotReady { .. } => "session_not_ready",
            SandboxError::Initialization(_) => "initialization_failed",
            SandboxError::UnknownExecution(_) => "unknown_execution",
            SandboxError::UnknownFramework(_) => "unknown_framework",
            SandboxError::InvalidOptions(_) => "invalid_options",
            SandboxError::Config(_) => "invalid_config",
            SandboxError::PortsExhausted => "ports_exhausted",
            SandboxError::Io(_) => "io_error",
        }
    }

    /// Captured stderr, when the failure carries one
    pub fn stderr(&self) -> Option<&str> {
        match self {
            SandboxError::Execution { stderr, .. } | SandboxError::Timeout { stderr, .. } => {
                Some(stderr)
            }
            _ => None,
        }
    }

    /// Exit code of a process that ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SandboxError::Execution { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

impl From<std::io::Error> for SandboxError {
    fn from(err: std::io::Error) -> Self {
        SandboxError::Io(err.to_string())
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}
