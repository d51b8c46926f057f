//! Process-group signalling
//!
//! Children start in their own process group (pgid == pid), so signals
//! sent here reach anything the command forked as well.

use std::io;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::Signal;

/// Send a signal to the group led by `pid`; a vanished group is not an error
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: Signal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

/// SIGKILL the group led by `pid`
#[cfg(unix)]
pub fn force_kill(pid: u32) -> io::Result<()> {
    signal_group(pid, Signal::SIGKILL)
}

/// No process groups here; children die through `kill_on_drop`
#[cfg(not(unix))]
pub fn force_kill(_pid: u32) -> io::Result<()> {
    Ok(())
}

/// Graceful-then-forceful termination
///
/// Sends SIGTERM to the group, waits up to `grace` for the child to exit,
/// then SIGKILLs the group. Returns true if the forceful step was needed.
pub async fn terminate(child: &mut Child, grace: Duration) -> bool {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        if let Err(e) = signal_group(pid, Signal::SIGTERM) {
            warn!("Failed to SIGTERM process group {}: {}", pid, e);
        }
        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            debug!("Process group {} exited after SIGTERM: {:?}", pid, status);
            // Sweep anything left behind in the group
            let _ = force_kill(pid);
            return false;
        }
        if let Err(e) = force_kill(pid) {
            warn!("Failed to SIGKILL process group {}: {}", pid, e);
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.kill().await {
        debug!("Kill after escalation failed: {}", e);
    }
    true
}

/// Kills the group on drop unless disarmed
///
/// Covers the case where the future owning a child is dropped mid-flight.
#[derive(Debug)]
pub struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    pub fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    pub fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            if let Err(e) = force_kill(pid) {
                warn!("Failed to kill process group {} on drop: {}", pid, e);
            }
        }
    }
}
