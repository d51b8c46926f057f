//! Tests for configuration loading

use super::*;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_defaults_validate() {
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.policy.default_timeout, Duration::from_secs(30));
    assert_eq!(config.policy.max_timeout, Duration::from_secs(300));
    assert_eq!(config.session.base_port, 3000);
    assert_eq!(config.session.max_concurrent, 8);
    assert_eq!(config.supervisor.grace_period, Duration::from_secs(2));
    assert_eq!(config.dev_server.startup_timeout, Duration::from_secs(30));
    assert!(config.dev_server.frameworks.contains_key("vite"));
}

#[test]
fn test_load_toml_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("warden.toml");
    fs::write(
        &path,
        r#"
[policy]
default_timeout = "10s"
max_timeout = "1m"
allowed_commands = ["ls", "echo"]

[policy.command_timeouts]
npm = "45s"

[session]
max_concurrent = 2
"#,
    )
    .unwrap();

    let config = load_from_file(&path).unwrap();
    assert_eq!(config.policy.default_timeout, Duration::from_secs(10));
    assert_eq!(config.policy.max_timeout, Duration::from_secs(60));
    assert_eq!(config.policy.allowed_commands, vec!["ls", "echo"]);
    assert_eq!(
        config.policy.command_timeouts.get("npm"),
        Some(&Duration::from_secs(45))
    );
    assert_eq!(config.session.max_concurrent, 2);
    // Untouched sections keep their defaults
    assert_eq!(config.session.base_port, 3000);
    assert_eq!(config.logging.format, "pretty");
}

#[test]
fn test_load_yaml_and_json_files() {
    let temp_dir = TempDir::new().unwrap();

    let yaml = temp_dir.path().join("warden.yaml");
    fs::write(&yaml, "session:\n  base_port: 4000\nlogging:\n  level: debug\n").unwrap();
    let config = load_from_file(&yaml).unwrap();
    assert_eq!(config.session.base_port, 4000);
    assert_eq!(config.logging.level, "debug");

    let json = temp_dir.path().join("warden.json");
    fs::write(&json, r#"{"supervisor": {"grace_period": "500ms"}}"#).unwrap();
    let config = load_from_file(&json).unwrap();
    assert_eq!(config.supervisor.grace_period, Duration::from_millis(500));
}

#[test]
fn test_missing_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_from_file(&temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let err = load_from_file(&path).unwrap_err();
    assert_eq!(err.error_code(), "invalid_config");
}

#[test]
fn test_env_overrides() {
    let mut config = EngineConfig::default();
    let vars = env(&[
        ("WARDEN_DEFAULT_TIMEOUT_MS", "1500"),
        ("WARDEN_MAX_CONCURRENT", "3"),
        ("WARDEN_BASE_PORT", "5173"),
        ("WARDEN_ROOT_DIR", "/tmp/warden-test"),
        ("WARDEN_LOG_FORMAT", "JSON"),
        ("UNRELATED", "ignored"),
    ]);

    apply_env_overrides(&mut config, &vars).unwrap();
    assert_eq!(config.policy.default_timeout, Duration::from_millis(1500));
    assert_eq!(config.session.max_concurrent, 3);
    assert_eq!(config.session.base_port, 5173);
    assert_eq!(
        config.session.root_dir.as_deref(),
        Some(std::path::Path::new("/tmp/warden-test"))
    );
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_env_override_rejects_garbage() {
    let mut config = EngineConfig::default();
    let err = apply_env_overrides(&mut config, &env(&[("WARDEN_BASE_PORT", "70000")])).unwrap_err();
    assert!(err.to_string().contains("WARDEN_BASE_PORT"));
}

#[test]
fn test_loader_layers_env_over_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("warden.toml");
    fs::write(&path, "[session]\nbase_port = 4000\nmax_concurrent = 2\n").unwrap();

    let config = ConfigLoader::new()
        .with_defaults()
        .with_file(&path)
        .with_env_map(env(&[("WARDEN_MAX_CONCURRENT", "6")]))
        .load()
        .unwrap();

    assert_eq!(config.session.base_port, 4000);
    assert_eq!(config.session.max_concurrent, 6);
}

#[test]
fn test_loader_validates() {
    let err = ConfigLoader::new()
        .with_defaults()
        .with_env_map(env(&[
            ("WARDEN_DEFAULT_TIMEOUT_MS", "60000"),
            ("WARDEN_MAX_TIMEOUT_MS", "1000"),
        ]))
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("max_timeout"));

    let err = ConfigLoader::new()
        .with_env_map(env(&[("WARDEN_MAX_CONCURRENT", "0")]))
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("max_concurrent"));
}

#[test]
fn test_validate_rejects_bad_pattern_and_format() {
    let mut config = EngineConfig::default();
    config.policy.extra_patterns.push(PatternConfig {
        name: "broken".to_string(),
        pattern: "[".to_string(),
    });
    assert!(config.validate().is_err());

    let mut config = EngineConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_round_trips_through_json() {
    let config = EngineConfig::default();
    let text = serde_json::to_string(&config).unwrap();
    assert!(text.contains("\"default_timeout\":\"30s\""));
    assert!(text.contains("\"npm\":\"2m\""));

    let parsed: EngineConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
