//! File-based configuration loading

use std::fs;
use std::path::Path;

use super::types::EngineConfig;
use crate::error::{SandboxError, SandboxResult};

/// Load configuration from a file
///
/// Supports JSON, TOML, and YAML formats based on file extension.
/// Returns default config if the file doesn't exist.
pub fn load_from_file(path: &Path) -> SandboxResult<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        SandboxError::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content, path)
}

fn parse_config(content: &str, path: &Path) -> SandboxResult<EngineConfig> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(content).map_err(|e| {
            SandboxError::Config(format!(
                "Failed to parse TOML config '{}': {}",
                path.display(),
                e
            ))
        })?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(content).map_err(|e| {
            SandboxError::Config(format!(
                "Failed to parse YAML config '{}': {}",
                path.display(),
                e
            ))
        })?,
        _ => serde_json::from_str(content).map_err(|e| {
            SandboxError::Config(format!(
                "Failed to parse JSON config '{}': {}",
                path.display(),
                e
            ))
        })?,
    };

    Ok(config)
}
