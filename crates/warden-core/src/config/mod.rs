//! Engine configuration
//!
//! Layered loading: defaults, then an optional JSON/TOML/YAML file, then
//! `WARDEN_*` environment overrides, then validation.

mod env_loader;
mod file_loader;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use env_loader::{ENV_PREFIX, apply_env_overrides};
pub use file_loader::load_from_file;
pub use loader::{ConfigLoader, ConfigSource, load_config};
pub use types::{
    DevServerConfig, EngineConfig, LOG_FORMATS, LoggingConfig, PatternConfig, PolicyConfig,
    SessionConfig, SupervisorConfig,
};
