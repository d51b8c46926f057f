//! Configuration loading from layered sources

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::env_loader::apply_env_overrides;
use super::file_loader::load_from_file;
use super::types::EngineConfig;
use crate::error::SandboxResult;

/// Source of configuration data
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Built-in defaults
    Default,
    /// Configuration file; replaces everything loaded before it
    File(PathBuf),
    /// `WARDEN_*` variables from the process environment
    Environment,
    /// `WARDEN_*` variables from an explicit map
    EnvironmentMap(HashMap<String, String>),
}

/// Configuration loader with support for multiple sources
///
/// Sources apply in the order they were added; the result is validated.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration source
    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_defaults(self) -> Self {
        self.add_source(ConfigSource::Default)
    }

    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::File(path.as_ref().to_path_buf()))
    }

    pub fn with_env(self) -> Self {
        self.add_source(ConfigSource::Environment)
    }

    pub fn with_env_map(self, vars: HashMap<String, String>) -> Self {
        self.add_source(ConfigSource::EnvironmentMap(vars))
    }

    /// Load configuration from all sources
    pub fn load(self) -> SandboxResult<EngineConfig> {
        let mut config = EngineConfig::default();

        for source in &self.sources {
            match source {
                ConfigSource::Default => {
                    tracing::debug!("Loading default config");
                    config = EngineConfig::default();
                }
                ConfigSource::File(path) => {
                    if path.exists() {
                        tracing::debug!("Loading config from file: {}", path.display());
                        config = load_from_file(path)?;
                    } else {
                        tracing::debug!("Config file {} not found, skipping", path.display());
                    }
                }
                ConfigSource::Environment => {
                    tracing::debug!("Loading config overrides from environment");
                    let vars: HashMap<String, String> = std::env::vars().collect();
                    apply_env_overrides(&mut config, &vars)?;
                }
                ConfigSource::EnvironmentMap(vars) => {
                    apply_env_overrides(&mut config, vars)?;
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

/// Defaults, then the optional file, then the process environment
pub fn load_config(path: Option<&Path>) -> SandboxResult<EngineConfig> {
    let mut loader = ConfigLoader::new().with_defaults();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    loader.with_env().load()
}
