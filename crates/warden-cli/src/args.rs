//! CLI argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden - policy-gated sandbox for shell commands")]
#[command(version)]
pub struct Cli {
    /// Configuration file (.json, .toml, .yaml)
    #[arg(long, global = true, env = "WARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Policy snapshot (JSON) imported before the command runs
    #[arg(long, global = true)]
    pub policy: Option<PathBuf>,

    /// Run in this directory instead of a throwaway session directory.
    /// The directory is kept after the run.
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a command without running it
    Check {
        /// Command line to validate
        command: String,

        /// Requested time budget, e.g. "90s"
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate and run a command, streaming its output
    Run {
        /// Command line to run
        command: String,

        /// Requested time budget, e.g. "5s" or "2m"
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        /// Extra environment variable (KEY=VALUE), repeatable
        #[arg(long = "env", short = 'e', value_parser = parse_env_pair)]
        env: Vec<(String, String)>,

        /// Relative directory inside the working directory
        #[arg(long)]
        cwd: Option<PathBuf>,
    },

    /// Start a framework dev server and keep it running until interrupted
    Serve {
        /// Framework name (react, vite, vue, next, angular, svelte, express, static)
        framework: String,
    },

    /// List known dev-server frameworks
    Frameworks,

    /// Inspect the security policy
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum PolicyAction {
    /// Write the current policy snapshot as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

fn parse_env_pair(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", value)),
    }
}
