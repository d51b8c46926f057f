//! Sandbox sessions
//!
//! A session owns one working directory, one port allocator, the map of
//! in-flight executions and a fixed number of concurrency slots. Its
//! lifecycle is `Uninitialized -> Initializing -> Ready -> Cleaning ->
//! Closed`; work is only accepted while `Ready`.

mod execution;
mod ports;


pub use execution::{ExecutionKind, ExecutionRecord, ExecutionState, KillResult, TrackedExecution};
pub use ports::PortAllocator;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{SandboxError, SandboxResult};

/// Name of the manifest written into fresh working directories
pub const MANIFEST_FILE: &str = "package.json";

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Cleaning,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Cleaning => "cleaning",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What cleanup did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Executions that were still running and got cancelled
    pub cancelled: usize,
    /// Executions that did not settle in time and were killed outright
    pub forced: usize,
    /// Whether the working directory was deleted
    pub directory_removed: bool,
}

/// A sandbox session
#[derive(Debug)]
pub struct SandboxSession {
    id: String,
    working_dir: PathBuf,
    config: SessionConfig,
    state: Mutex<SessionState>,
    executions: DashMap<String, Arc<TrackedExecution>>,
    ports: PortAllocator,
    slots: Arc<Semaphore>,
}

impl SandboxSession {
    /// Create a session; nothing touches the filesystem until [`Self::initialize`]
    pub fn new(config: SessionConfig) -> Arc<Self> {
        let id = Uuid::new_v4().to_string();
        let working_dir = match &config.working_dir {
            Some(dir) => dir.clone(),
            None => config.effective_root().join(format!("session-{}", id)),
        };

        Arc::new(Self {
            ports: PortAllocator::new(config.base_port),
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
            executions: DashMap::new(),
            state: Mutex::new(SessionState::Uninitialized),
            id,
            working_dir,
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Create the working directory and a minimal manifest
    ///
    /// Calling it on a ready session is a no-op. On failure the session
    /// goes back to `Uninitialized`.
    pub async fn initialize(&self) -> SandboxResult<()> {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Uninitialized => *state = SessionState::Initializing,
                SessionState::Ready => return Ok(()),
                other => {
                    return Err(SandboxError::SessionNotReady {
                        state: other.to_string(),
                    });
                }
            }
        }

        let prepared = self.prepare_directory().await;

        // Cleanup may have claimed the session while the directory was prepared
        let superseded = {
            let mut state = self.state.lock();
            match *state {
                SessionState::Initializing => {
                    *state = if prepared.is_ok() {
                        SessionState::Ready
                    } else {
                        SessionState::Uninitialized
                    };
                    None
                }
                other => Some(other),
            }
        };
        if let Some(state) = superseded {
            if prepared.is_ok() && self.config.remove_on_cleanup {
                self.remove_directory().await;
            }
            return Err(SandboxError::SessionNotReady {
                state: state.to_string(),
            });
        }

        match prepared {
            Ok(()) => {
                info!(
                    "Session {} ready in {}",
                    self.id,
                    self.working_dir.display()
                );
                Ok(())
            }
            Err(e) => Err(SandboxError::Initialization(format!(
                "cannot prepare '{}': {}",
                self.working_dir.display(),
                e
            ))),
        }
    }

    /// Delete the working directory; returns whether anything was removed
    async fn remove_directory(&self) -> bool {
        match tokio::fs::remove_dir_all(&self.working_dir).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(
                    "Failed to remove working directory {}: {}",
                    self.working_dir.display(),
                    e
                );
                false
            }
        }
    }

    async fn prepare_directory(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.working_dir).await?;

        let manifest = self.working_dir.join(MANIFEST_FILE);
        if !tokio::fs::try_exists(&manifest).await? {
            let short_id: String = self.id.chars().take(8).collect();
            let body = serde_json::json!({
                "name": format!("warden-session-{}", short_id),
                "version": "0.1.0",
                "private": true,
            });
            let text = serde_json::to_string_pretty(&body).map_err(std::io::Error::other)?;
            tokio::fs::write(&manifest, text).await?;
        }
        Ok(())
    }

    /// Resolve an optional working-directory override inside the session
    pub fn resolve_cwd(&self, cwd: Option<&Path>) -> SandboxResult<PathBuf> {
        let Some(cwd) = cwd else {
            return Ok(self.working_dir.clone());
        };
        let confined = !cwd.as_os_str().is_empty()
            && cwd
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined {
            return Err(SandboxError::InvalidOptions(format!(
                "working directory '{}' must be a relative path inside the session",
                cwd.display()
            )));
        }
        Ok(self.working_dir.join(cwd))
    }

    /// Take a concurrency slot and track a new execution
    ///
    /// Waits while all slots are busy. The returned guard removes the
    /// execution from the session when dropped.
    pub async fn register(
        self: &Arc<Self>,
        command: &str,
        kind: ExecutionKind,
    ) -> SandboxResult<Registration> {
        self.ensure_ready()?;

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| self.not_ready())?;

        let id = Uuid::new_v4().to_string();
        let port = self.ports.allocate(&id)?;
        let execution = Arc::new(TrackedExecution::new(
            id.clone(),
            command.to_string(),
            kind,
            port,
        ));
        self.executions.insert(id.clone(), Arc::clone(&execution));

        let registration = Registration {
            session: Arc::clone(self),
            execution,
            _permit: permit,
        };

        // Cleanup may have started while we waited for a slot
        self.ensure_ready()?;

        debug!("Registered execution {} on port {}", id, port);
        Ok(registration)
    }

    fn ensure_ready(&self) -> SandboxResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(self.not_ready())
        }
    }

    fn not_ready(&self) -> SandboxError {
        SandboxError::SessionNotReady {
            state: self.state().to_string(),
        }
    }

    fn unregister(&self, id: &str) {
        if let Some((_, execution)) = self.executions.remove(id) {
            execution.mark_finished();
        }
        self.ports.release(id);
    }

    pub fn get(&self, id: &str) -> Option<Arc<TrackedExecution>> {
        self.executions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Records of everything currently tracked
    pub fn records(&self) -> Vec<ExecutionRecord> {
        let mut records: Vec<ExecutionRecord> = self
            .executions
            .iter()
            .map(|entry| entry.value().record())
            .collect();
        records.sort_by_key(|r| r.started_at);
        records
    }

    pub fn active_count(&self) -> usize {
        self.executions.len()
    }

    /// Port assignments of tracked executions
    pub fn ports(&self) -> BTreeMap<String, u16> {
        self.ports.assignments()
    }

    /// Ids of tracked executions of one kind
    pub fn ids_of_kind(&self, kind: ExecutionKind) -> Vec<String> {
        self.executions
            .iter()
            .filter(|entry| entry.value().kind() == kind)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Cancel one execution
    ///
    /// Unknown and already-settled ids report failure.
    pub fn kill_process(&self, id: &str) -> KillResult {
        let Some(execution) = self.get(id) else {
            return KillResult::failure(format!("no tracked execution with id {}", id));
        };
        if execution.request_cancel() {
            info!("Cancelling execution {}", id);
            KillResult::success()
        } else {
            KillResult::failure(format!(
                "execution {} already {}",
                id,
                execution.state()
            ))
        }
    }

    /// Tear the session down
    ///
    /// Cancels everything still running, waits up to `cleanup_timeout` for
    /// the executions to settle, kills what is left, then removes the
    /// working directory if configured to. Failures are logged, never
    /// returned. A second call is a no-op.
    pub async fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Cleaning | SessionState::Closed => return report,
                SessionState::Uninitialized => {
                    *state = SessionState::Closed;
                    return report;
                }
                SessionState::Initializing | SessionState::Ready => {
                    *state = SessionState::Cleaning;
                }
            }
        }
        self.slots.close();

        let pending: Vec<Arc<TrackedExecution>> = self
            .executions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for execution in &pending {
            if execution.request_cancel() {
                report.cancelled += 1;
            } else {
                // Already settling (e.g. timed out); make sure it hears about it
                execution.cancel_token().cancel();
            }
        }

        let settle = async {
            for execution in &pending {
                execution.wait_finished().await;
            }
        };
        if tokio::time::timeout(self.config.cleanup_timeout, settle)
            .await
            .is_err()
        {
            warn!(
                "Session {}: executions did not settle within {:?}",
                self.id, self.config.cleanup_timeout
            );
        }

        let stragglers: Vec<Arc<TrackedExecution>> = self
            .executions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for execution in stragglers {
            if let Some(pid) = execution.pid() {
                if let Err(e) = crate::supervisor::force_kill(pid) {
                    warn!("Failed to kill execution {}: {}", execution.id(), e);
                }
            }
            self.unregister(execution.id());
            report.forced += 1;
        }
        self.ports.clear();

        if self.config.remove_on_cleanup {
            report.directory_removed = self.remove_directory().await;
        }

        *self.state.lock() = SessionState::Closed;
        info!(
            "Session {} closed ({} cancelled, {} forced)",
            self.id, report.cancelled, report.forced
        );
        report
    }
}

/// Guard for one tracked execution
///
/// Holds a concurrency slot. Dropping it removes the execution from the
/// session, releases its port and wakes anyone waiting on it.
#[derive(Debug)]
pub struct Registration {
    session: Arc<SandboxSession>,
    execution: Arc<TrackedExecution>,
    _permit: OwnedSemaphorePermit,
}

impl Registration {
    pub fn execution(&self) -> &Arc<TrackedExecution> {
        &self.execution
    }

    pub fn session(&self) -> &Arc<SandboxSession> {
        &self.session
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.session.unregister(self.execution.id());
    }
}
