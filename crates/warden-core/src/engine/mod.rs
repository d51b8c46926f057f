//! Sandbox engine facade
//!
//! [`SandboxEngine`] wires one gateway, one supervisor and one session
//! together and reports what it does to an
//! [`EventSink`](crate::events::EventSink). Everything it depends on is
//! handed in through [`SandboxEngineBuilder`]; nothing is looked up from
//! global state.

mod builder;


pub use builder::SandboxEngineBuilder;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::events::{LogEvent, LogKind, SharedEventSink};
use crate::gateway::{PolicyGateway, ValidationOptions, ValidationResult};
use crate::policy::PolicySnapshot;
use crate::session::{
    CleanupReport, ExecutionKind, ExecutionRecord, KillResult, SandboxSession, SessionState,
};
use crate::stats::{SharedStats, StatsSnapshot};
use crate::supervisor::{
    DevServerHandle, ExecutionOptions, ExecutionOutcome, ExecutionSupervisor, FrameworkProfile,
    OutputObserver,
};

/// Point-in-time view of an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxStatus {
    pub session_id: String,
    pub state: SessionState,
    pub working_dir: PathBuf,
    pub active_processes: Vec<ExecutionRecord>,
    pub ports: BTreeMap<String, u16>,
    pub stats: StatsSnapshot,
}

/// Policy-gated command execution inside one sandbox session
pub struct SandboxEngine {
    config: EngineConfig,
    gateway: PolicyGateway,
    supervisor: ExecutionSupervisor,
    session: Arc<SandboxSession>,
    frameworks: BTreeMap<String, FrameworkProfile>,
    events: SharedEventSink,
    stats: SharedStats,
}

impl SandboxEngine {
    pub fn builder() -> SandboxEngineBuilder {
        SandboxEngineBuilder::new()
    }

    /// Engine with its own policy, stats and a tracing event sink
    pub fn new(config: EngineConfig) -> SandboxResult<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gateway(&self) -> &PolicyGateway {
        &self.gateway
    }

    pub fn session(&self) -> &Arc<SandboxSession> {
        &self.session
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    /// Known framework profiles by name
    pub fn frameworks(&self) -> &BTreeMap<String, FrameworkProfile> {
        &self.frameworks
    }

    fn emit(&self, kind: LogKind, message: impl Into<String>) {
        self.events.emit(LogEvent::new(kind, message));
    }

    /// Prepare the session working directory
    pub async fn initialize(&self) -> SandboxResult<()> {
        self.session.initialize().await?;
        self.emit(
            LogKind::Info,
            format!(
                "Sandbox session {} ready in {}",
                self.session.id(),
                self.session.working_dir().display()
            ),
        );
        Ok(())
    }

    /// Ask the gateway for a verdict; denials are reported as security events
    pub fn validate_command(&self, raw: &str, options: &ValidationOptions) -> ValidationResult {
        let verdict = self.gateway.validate_command(raw, options);
        if !verdict.allowed {
            self.emit(
                LogKind::Security,
                format!(
                    "Blocked '{}': {}",
                    raw.trim(),
                    verdict.reason.as_deref().unwrap_or("denied")
                ),
            );
        }
        verdict
    }

    /// Validate, then run a command to completion
    ///
    /// A denied command never reaches the supervisor and comes back as
    /// [`SandboxError::Denied`].
    pub async fn execute_in_sandbox(
        &self,
        command: &str,
        options: ExecutionOptions,
        observer: Option<OutputObserver>,
    ) -> SandboxResult<ExecutionOutcome> {
        let verdict = self.validate_command(
            command,
            &ValidationOptions {
                timeout: options.timeout,
            },
        );
        let sanitized = approved(&verdict)?;

        self.emit(LogKind::Command, format!("$ {}", sanitized));
        let result = self
            .supervisor
            .execute(&self.session, sanitized, verdict.timeout, &options, observer)
            .await;

        match &result {
            Ok(outcome) => self.emit(
                LogKind::Success,
                format!("'{}' completed in {}ms", sanitized, outcome.elapsed_ms),
            ),
            Err(e) => self.report_failure(sanitized, e),
        }
        result
    }

    /// Start the dev server of a known framework
    ///
    /// The profile's command goes through the gateway like any other.
    pub async fn start_dev_server(
        &self,
        framework: &str,
        observer: Option<OutputObserver>,
    ) -> SandboxResult<DevServerHandle> {
        let name = framework.trim().to_lowercase();
        let profile = self
            .frameworks
            .get(&name)
            .ok_or_else(|| SandboxError::UnknownFramework(framework.to_string()))?;

        let verdict = self.validate_command(&profile.command, &ValidationOptions::default());
        let sanitized = approved(&verdict)?;

        self.emit(
            LogKind::Server,
            format!("Starting {} dev server: {}", name, sanitized),
        );
        let dev_server = &self.config.dev_server;
        let result = self
            .supervisor
            .start_server(
                &self.session,
                sanitized,
                profile,
                dev_server.startup_timeout,
                &dev_server.host,
                observer,
            )
            .await;

        match &result {
            Ok(handle) => self.emit(
                LogKind::Server,
                format!("{} dev server running at {}", name, handle.url),
            ),
            Err(e) => self.report_failure(sanitized, e),
        }
        result
    }

    /// Stop every running dev server; returns how many were stopped
    pub async fn stop_dev_server(&self) -> SandboxResult<usize> {
        let mut stopped = 0;
        for id in self.session.ids_of_kind(ExecutionKind::Server) {
            match self.supervisor.stop_server(&self.session, &id).await {
                Ok(()) => stopped += 1,
                // Exited on its own in the meantime
                Err(SandboxError::UnknownExecution(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if stopped > 0 {
            self.emit(LogKind::Server, format!("Stopped {} dev server(s)", stopped));
        }
        Ok(stopped)
    }

    /// Cancel a running execution
    pub fn kill_process(&self, command_id: &str) -> KillResult {
        let result = self.supervisor.kill_process(&self.session, command_id);
        if result.success {
            self.emit(LogKind::Warning, format!("Killed process {}", command_id));
        }
        result
    }

    pub fn status(&self) -> SandboxStatus {
        SandboxStatus {
            session_id: self.session.id().to_string(),
            state: self.session.state(),
            working_dir: self.session.working_dir().to_path_buf(),
            active_processes: self.session.records(),
            ports: self.session.ports(),
            stats: self.stats.snapshot(),
        }
    }

    pub fn allow_command(&self, command: &str) -> bool {
        let changed = self.gateway.allow_command(command);
        if changed {
            self.emit(LogKind::Security, format!("'{}' added to allowlist", command));
        }
        changed
    }

    pub fn disallow_command(&self, command: &str) -> bool {
        let changed = self.gateway.disallow_command(command);
        if changed {
            self.emit(
                LogKind::Security,
                format!("'{}' removed from allowlist", command),
            );
        }
        changed
    }

    pub fn block_command(&self, command: &str) -> bool {
        let changed = self.gateway.block_command(command);
        if changed {
            self.emit(LogKind::Security, format!("'{}' added to blocklist", command));
        }
        changed
    }

    pub fn unblock_command(&self, command: &str) -> bool {
        let changed = self.gateway.unblock_command(command);
        if changed {
            self.emit(
                LogKind::Security,
                format!("'{}' removed from blocklist", command),
            );
        }
        changed
    }

    pub fn export_config(&self) -> PolicySnapshot {
        self.gateway.export_config()
    }

    pub fn import_config(&self, snapshot: PolicySnapshot) -> SandboxResult<()> {
        self.gateway.import_config(snapshot)?;
        self.emit(LogKind::Security, "Security policy imported");
        Ok(())
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
        self.emit(LogKind::Info, "Statistics reset");
    }

    /// Stop everything and close the session
    pub async fn cleanup(&self) -> CleanupReport {
        let report = self.session.cleanup().await;
        if report.forced > 0 {
            warn!(
                "{} execution(s) had to be killed during cleanup",
                report.forced
            );
        }
        info!("Sandbox session {} cleaned up", self.session.id());
        self.emit(
            LogKind::Info,
            format!(
                "Sandbox session {} closed ({} process(es) stopped)",
                self.session.id(),
                report.cancelled + report.forced
            ),
        );
        report
    }

    fn report_failure(&self, command: &str, err: &SandboxError) {
        let kind = match err {
            SandboxError::Timeout { .. } | SandboxError::Cancelled { .. } => LogKind::Warning,
            _ => LogKind::Error,
        };
        self.emit(kind, format!("'{}' failed: {}", command, err));
    }
}

/// Turn a verdict into the command to run
fn approved(verdict: &ValidationResult) -> SandboxResult<&str> {
    match verdict.sanitized_command.as_deref() {
        Some(command) if verdict.allowed => Ok(command),
        _ => Err(SandboxError::Denied {
            reason: verdict
                .reason
                .clone()
                .unwrap_or_else(|| "command denied".to_string()),
        }),
    }
}
