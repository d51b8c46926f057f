//! Default command lists and timeout table.

use std::collections::BTreeMap;
use std::time::Duration;

/// Commands a fresh policy allows
pub fn default_allowed_commands() -> Vec<String> {
    [
        // Package managers and runtimes
        "npm", "npx", "node", "yarn", "pnpm", "python", "python3", "pip", "pip3", "cargo",
        "rustc", "go",
        // Version control
        "git",
        // Frontend tooling
        "tsc", "eslint", "prettier", "jest", "vite", "next",
        // File inspection
        "ls", "dir", "cat", "type", "head", "tail", "grep", "find", "wc", "which",
        // Directory and file management
        "pwd", "mkdir", "touch", "cp", "mv",
        // Utilities
        "echo", "true", "false", "date", "sleep",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Commands that are always refused
pub fn default_blocked_commands() -> Vec<String> {
    [
        // Privilege escalation
        "sudo", "su", "doas", "pkexec",
        // Host power state
        "shutdown", "reboot", "halt", "poweroff", "init",
        // Disks and volumes
        "mkfs", "fdisk", "dd", "format", "diskpart",
        // Accounts and ownership
        "chown", "passwd", "useradd", "userdel", "crontab", "systemctl",
        // Process control outside the supervisor
        "kill", "killall", "pkill",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Arguments that switch off package-manager safety nets
pub fn default_dangerous_args() -> Vec<String> {
    [
        "--unsafe-perm",
        "--allow-root",
        "--no-sandbox",
        "--disable-web-security",
        "--privileged",
        "-g",
        "--global",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Per-command execution budgets
pub fn default_command_timeouts() -> BTreeMap<String, Duration> {
    let two_minutes = Duration::from_secs(120);
    let five_minutes = Duration::from_secs(300);
    let one_minute = Duration::from_secs(60);

    [
        ("npm", two_minutes),
        ("yarn", two_minutes),
        ("pnpm", two_minutes),
        ("pip", two_minutes),
        ("pip3", two_minutes),
        ("npx", one_minute),
        ("git", one_minute),
        ("cargo", five_minutes),
        ("go", five_minutes),
        ("mvn", five_minutes),
        ("gradle", five_minutes),
    ]
    .into_iter()
    .map(|(name, timeout)| (name.to_string(), timeout))
    .collect()
}
