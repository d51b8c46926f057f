//! Per-process resource limits

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Kernel limits applied to each child before exec
///
/// Unset fields leave the inherited limit alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Address space in bytes (RLIMIT_AS)
    pub max_memory_bytes: Option<u64>,
    /// CPU time in seconds (RLIMIT_CPU)
    pub max_cpu_seconds: Option<u64>,
    /// Open file descriptors (RLIMIT_NOFILE)
    pub max_open_files: Option<u64>,
}

impl ResourceLimits {
    pub fn is_unlimited(&self) -> bool {
        self.max_memory_bytes.is_none()
            && self.max_cpu_seconds.is_none()
            && self.max_open_files.is_none()
    }
}

/// Install the limits into the command's pre-exec hook
#[cfg(unix)]
pub(super) fn apply_limits(cmd: &mut Command, limits: &ResourceLimits) {
    if limits.is_unlimited() {
        return;
    }

    let max_memory = limits.max_memory_bytes;
    let max_cpu = limits.max_cpu_seconds;
    let max_files = limits.max_open_files;

    // SAFETY: pre_exec runs between fork() and exec() in the child. The
    // closure only calls setrlimit, which is async-signal-safe, on Copy
    // values moved into it.
    unsafe {
        cmd.pre_exec(move || {
            for (resource, value) in [
                (libc::RLIMIT_AS, max_memory),
                (libc::RLIMIT_CPU, max_cpu),
                (libc::RLIMIT_NOFILE, max_files),
            ] {
                if let Some(value) = value {
                    let limit = libc::rlimit {
                        rlim_cur: value as libc::rlim_t,
                        rlim_max: value as libc::rlim_t,
                    };
                    if libc::setrlimit(resource, &limit) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(super) fn apply_limits(_cmd: &mut Command, _limits: &ResourceLimits) {}
