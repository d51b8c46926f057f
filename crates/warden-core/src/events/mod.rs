//! Log events emitted to the host application
//!
//! The engine reports lifecycle activity as [`LogEvent`]s through an
//! [`EventSink`]. Where the events end up (a UI, a file, nowhere) is the
//! host's concern.


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Category of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Command,
    Success,
    Warning,
    Error,
    Security,
    Server,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Info => "info",
            LogKind::Command => "command",
            LogKind::Success => "success",
            LogKind::Warning => "warning",
            LogKind::Error => "error",
            LogKind::Security => "security",
            LogKind::Server => "server",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
}

impl LogEvent {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        }
    }
}

/// Destination for log events
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Shared event sink
pub type SharedEventSink = Arc<dyn EventSink>;

impl<F> EventSink for F
where
    F: Fn(LogEvent) + Send + Sync,
{
    fn emit(&self, event: LogEvent) {
        self(event)
    }
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: LogEvent) {}
}

/// Sink that forwards events into `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        match event.kind {
            LogKind::Error => tracing::error!(kind = %event.kind, "{}", event.message),
            LogKind::Warning | LogKind::Security => {
                tracing::warn!(kind = %event.kind, "{}", event.message)
            }
            _ => tracing::info!(kind = %event.kind, "{}", event.message),
        }
    }
}

/// Sink that pushes events onto an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LogEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving half of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: LogEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}
