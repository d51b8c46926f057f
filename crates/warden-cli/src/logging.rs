//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;
use warden_core::config::LoggingConfig;

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level; `--verbose` raises the
/// configured level to debug. Diagnostics go to stderr so command output on
/// stdout stays clean.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed (tests); keep that one
    let _ = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        _ => builder.pretty().try_init(),
    };
}
