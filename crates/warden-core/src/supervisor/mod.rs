//! Execution supervisor
//!
//! Runs already-validated commands as child processes inside a session and
//! resolves each one exactly once: completed, failed, timed out or
//! cancelled. Every path drops the execution's timer guard and its session
//! registration, so neither can leak.

mod command_line;
mod dev_server;
mod limits;
mod output;
mod process_group;
mod types;

#[cfg(test)]
mod tests;

pub use command_line::SpawnPlan;
pub use dev_server::{FrameworkProfile, builtin_profiles};
pub use limits::ResourceLimits;
pub use output::{OutputBuffer, ReadinessProbe, TRUNCATION_MARKER, Utf8Decoder};
pub use process_group::{GroupGuard, force_kill, terminate};
pub use types::{
    DevServerHandle, ExecutionOptions, ExecutionOutcome, OutputChunk, OutputObserver,
    OutputStream,
};

use std::collections::HashMap;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SupervisorConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::session::{ExecutionKind, ExecutionState, KillResult, Registration, SandboxSession};
use crate::stats::SharedStats;
use output::{SharedBuffer, drain, spawn_pump};

/// Longest wait for output pipes to close after the child is gone
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Slack on top of the grace period when stopping a dev server
const STOP_MARGIN: Duration = Duration::from_secs(1);

enum Settled {
    Exited(std::io::Result<ExitStatus>),
    Ready,
    TimedOut,
    Cancelled,
}

/// A spawned child with its capture machinery
struct Running {
    child: Child,
    group: GroupGuard,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    pumps: Vec<JoinHandle<()>>,
}

impl Running {
    fn output(&self) -> (String, String) {
        (
            self.stdout.lock().as_str().to_string(),
            self.stderr.lock().as_str().to_string(),
        )
    }

    /// Wait for the pumps; kill lingering grandchildren holding the pipes
    async fn finish_output(&mut self, pid: Option<u32>) {
        let pumps = std::mem::take(&mut self.pumps);
        if !drain(pumps, OUTPUT_DRAIN_TIMEOUT).await {
            if let Some(pid) = pid {
                debug!("Output of process group {} still open, killing it", pid);
                let _ = force_kill(pid);
            }
        }
    }
}

/// Spawns and supervises child processes
#[derive(Debug, Clone)]
pub struct ExecutionSupervisor {
    config: SupervisorConfig,
    stats: SharedStats,
}

impl ExecutionSupervisor {
    pub fn new(config: SupervisorConfig, stats: SharedStats) -> Self {
        Self { config, stats }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run a command to completion
    ///
    /// The command must already have been allowed by the gateway; it is not
    /// validated again here.
    #[instrument(skip(self, session, options, observer), fields(session = %session.id()))]
    pub async fn execute(
        &self,
        session: &Arc<SandboxSession>,
        command: &str,
        timeout: Duration,
        options: &ExecutionOptions,
        observer: Option<OutputObserver>,
    ) -> SandboxResult<ExecutionOutcome> {
        let plan = SpawnPlan::parse(command)?;
        let cwd = session.resolve_cwd(options.cwd.as_deref())?;

        let registration = session.register(command, ExecutionKind::Adhoc).await?;
        let execution = Arc::clone(registration.execution());
        let command_id = execution.id().to_string();
        let _timer = self.stats.arm_timer();
        let started = Instant::now();

        let mut running =
            self.spawn(&plan, &cwd, &registration, &options.env, command, observer, None)?;
        let pid = running.child.id();
        debug!(
            "Started {} (pid {:?}, shell: {}, timeout {:?})",
            command_id,
            pid,
            plan.uses_shell(),
            timeout
        );

        let settled = tokio::select! {
            status = running.child.wait() => Settled::Exited(status),
            _ = tokio::time::sleep(timeout) => Settled::TimedOut,
            _ = execution.cancel_token().cancelled() => Settled::Cancelled,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match settled {
            Settled::Exited(Ok(status)) => {
                running.group.disarm();
                running.finish_output(pid).await;
                let (stdout, stderr) = running.output();
                let terminal = if status.success() {
                    ExecutionState::Completed
                } else {
                    ExecutionState::Failed
                };
                if !execution.finish(terminal) {
                    return Err(SandboxError::Cancelled { command_id });
                }

                if status.success() {
                    debug!("{} completed in {}ms", command_id, elapsed_ms);
                    Ok(ExecutionOutcome {
                        command_id,
                        stdout,
                        stderr,
                        exit_code: 0,
                        elapsed_ms,
                    })
                } else {
                    debug!("{} failed with {:?}", command_id, status.code());
                    Err(SandboxError::Execution {
                        command_id,
                        exit_code: status.code(),
                        stdout,
                        stderr,
                    })
                }
            }
            Settled::Exited(Err(e)) => {
                execution.finish(ExecutionState::Failed);
                Err(SandboxError::Io(format!("waiting for {} failed: {}", command_id, e)))
            }
            Settled::TimedOut => {
                let timed_out = execution.finish(ExecutionState::TimedOut);
                self.stop_child(&mut running, pid).await;
                if !timed_out {
                    return Err(SandboxError::Cancelled { command_id });
                }
                self.stats.timeouts.inc();
                warn!("{} timed out after {:?}", command_id, timeout);
                let (stdout, stderr) = running.output();
                Err(SandboxError::Timeout {
                    command_id,
                    elapsed_ms,
                    stdout,
                    stderr,
                })
            }
            Settled::Cancelled | Settled::Ready => {
                self.stop_child(&mut running, pid).await;
                info!("{} cancelled", command_id);
                Err(SandboxError::Cancelled { command_id })
            }
        }
    }

    /// Start a long-running server and resolve once it reports ready
    ///
    /// Readiness means one of the profile's markers showed up on stdout
    /// within `startup_timeout`. The server stays tracked until
    /// [`Self::stop_server`] or session cleanup.
    #[instrument(skip(self, session, profile, observer), fields(session = %session.id()))]
    pub async fn start_server(
        &self,
        session: &Arc<SandboxSession>,
        command: &str,
        profile: &FrameworkProfile,
        startup_timeout: Duration,
        host: &str,
        observer: Option<OutputObserver>,
    ) -> SandboxResult<DevServerHandle> {
        let plan = SpawnPlan::parse(command)?;
        let cwd = session.resolve_cwd(None)?;

        let registration = session.register(command, ExecutionKind::Server).await?;
        let execution = Arc::clone(registration.execution());
        let command_id = execution.id().to_string();
        let timer = self.stats.arm_timer();

        let ready = CancellationToken::new();
        if profile.ready_markers.iter().all(|m| m.is_empty()) {
            ready.cancel();
        }
        let probe = ReadinessProbe::new(&profile.ready_markers, ready.clone());

        let mut running = self.spawn(
            &plan,
            &cwd,
            &registration,
            &HashMap::new(),
            command,
            observer,
            Some(probe),
        )?;
        let pid = running.child.id();
        info!(
            "Starting dev server {} on port {} (pid {:?})",
            command_id,
            execution.port(),
            pid
        );

        let settled = tokio::select! {
            _ = ready.cancelled() => Settled::Ready,
            status = running.child.wait() => Settled::Exited(status),
            _ = tokio::time::sleep(startup_timeout) => Settled::TimedOut,
            _ = execution.cancel_token().cancelled() => Settled::Cancelled,
        };

        match settled {
            Settled::Ready => {
                drop(timer);
                let port = execution.port();
                let handle = DevServerHandle {
                    url: format!("http://{}:{}", host, port),
                    port,
                    command_id,
                };
                info!("Dev server {} ready at {}", handle.command_id, handle.url);
                tokio::spawn(monitor_server(
                    running,
                    registration,
                    self.config.grace_period,
                ));
                Ok(handle)
            }
            Settled::Exited(status) => {
                running.group.disarm();
                running.finish_output(pid).await;
                let status = match status {
                    Ok(status) => status,
                    Err(e) => {
                        execution.finish(ExecutionState::Failed);
                        return Err(e.into());
                    }
                };
                if !execution.finish(ExecutionState::Failed) {
                    return Err(SandboxError::Cancelled { command_id });
                }
                let (stdout, stderr) = running.output();
                warn!(
                    "Dev server {} exited before it was ready ({:?})",
                    command_id,
                    status.code()
                );
                Err(SandboxError::Execution {
                    command_id,
                    exit_code: status.code(),
                    stdout,
                    stderr,
                })
            }
            Settled::TimedOut => {
                let timed_out = execution.finish(ExecutionState::TimedOut);
                self.stop_child(&mut running, pid).await;
                if !timed_out {
                    return Err(SandboxError::Cancelled { command_id });
                }
                self.stats.timeouts.inc();
                warn!(
                    "Dev server {} not ready within {:?}",
                    command_id, startup_timeout
                );
                let (stdout, stderr) = running.output();
                Err(SandboxError::Timeout {
                    command_id,
                    elapsed_ms: startup_timeout.as_millis() as u64,
                    stdout,
                    stderr,
                })
            }
            Settled::Cancelled => {
                self.stop_child(&mut running, pid).await;
                Err(SandboxError::Cancelled { command_id })
            }
        }
    }

    /// Stop a dev server and wait until it has left the session
    pub async fn stop_server(&self, session: &SandboxSession, command_id: &str) -> SandboxResult<()> {
        let execution = session
            .get(command_id)
            .ok_or_else(|| SandboxError::UnknownExecution(command_id.to_string()))?;
        if execution.kind() != ExecutionKind::Server {
            return Err(SandboxError::InvalidOptions(format!(
                "{} is not a dev server",
                command_id
            )));
        }

        if !execution.request_cancel() {
            execution.cancel_token().cancel();
        }

        let bound = self.config.grace_period + STOP_MARGIN;
        if tokio::time::timeout(bound, execution.wait_finished())
            .await
            .is_err()
        {
            warn!("Dev server {} did not stop within {:?}", command_id, bound);
            if let Some(pid) = execution.pid() {
                force_kill(pid)?;
            }
        }
        Ok(())
    }

    /// Cancel an execution by id
    pub fn kill_process(&self, session: &SandboxSession, command_id: &str) -> KillResult {
        session.kill_process(command_id)
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn(
        &self,
        plan: &SpawnPlan,
        cwd: &Path,
        registration: &Registration,
        env: &HashMap<String, String>,
        command: &str,
        observer: Option<OutputObserver>,
        probe: Option<ReadinessProbe>,
    ) -> SandboxResult<Running> {
        let execution = registration.execution();

        let mut cmd = plan.to_command();
        cmd.current_dir(cwd).kill_on_drop(true);
        if !self.config.inherit_env {
            cmd.env_clear();
        }
        cmd.env("PORT", execution.port().to_string());
        cmd.envs(env);
        #[cfg(unix)]
        cmd.process_group(0);
        limits::apply_limits(&mut cmd, &self.config.limits);

        let mut child = cmd.spawn().map_err(|e| {
            execution.finish(ExecutionState::Failed);
            warn!("Failed to spawn '{}': {}", command, e);
            SandboxError::Spawn {
                command: command.to_string(),
                message: e.to_string(),
            }
        })?;
        execution.set_pid(child.id());

        let stdout = OutputBuffer::shared(self.config.max_output_bytes);
        let stderr = OutputBuffer::shared(self.config.max_output_bytes);
        let mut pumps = Vec::with_capacity(2);
        if let Some(pipe) = child.stdout.take() {
            pumps.push(spawn_pump(
                pipe,
                execution.id().to_string(),
                OutputStream::Stdout,
                Arc::clone(&stdout),
                observer.clone(),
                probe,
            ));
        }
        if let Some(pipe) = child.stderr.take() {
            pumps.push(spawn_pump(
                pipe,
                execution.id().to_string(),
                OutputStream::Stderr,
                Arc::clone(&stderr),
                observer,
                None,
            ));
        }

        Ok(Running {
            group: GroupGuard::new(child.id()),
            child,
            stdout,
            stderr,
            pumps,
        })
    }

    async fn stop_child(&self, running: &mut Running, pid: Option<u32>) {
        terminate(&mut running.child, self.config.grace_period).await;
        running.group.disarm();
        running.finish_output(pid).await;
    }
}

/// Owns a ready dev server until it is stopped or exits
async fn monitor_server(mut running: Running, registration: Registration, grace: Duration) {
    let execution = Arc::clone(registration.execution());
    let pid = running.child.id();

    tokio::select! {
        _ = execution.cancel_token().cancelled() => {
            let forced = terminate(&mut running.child, grace).await;
            info!("Dev server {} stopped (forced: {})", execution.id(), forced);
        }
        status = running.child.wait() => {
            match status {
                Ok(status) => {
                    let terminal = if status.success() {
                        ExecutionState::Completed
                    } else {
                        ExecutionState::Failed
                    };
                    execution.finish(terminal);
                    warn!("Dev server {} exited with {:?}", execution.id(), status.code());
                }
                Err(e) => {
                    execution.finish(ExecutionState::Failed);
                    warn!("Waiting for dev server {} failed: {}", execution.id(), e);
                }
            }
        }
    }

    running.group.disarm();
    running.finish_output(pid).await;
    drop(registration);
}
