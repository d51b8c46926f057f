//! Warden CLI
//!
//! Runs shell commands through the warden policy gateway and supervisor.
//!
//! ```bash
//! warden check "npm install react"        # print the verdict
//! warden run "npm test" --timeout 2m      # validate, run, stream output
//! warden serve vite                        # start a dev server until Ctrl+C
//! warden policy export --output policy.json
//! ```

mod args;
mod commands;
mod console;
mod logging;
mod signal_handler;

use clap::Parser;

use args::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            console::CliConsole::new(false).error(&format!("{:#}", e));
            2
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = warden_core::load_config(cli.config.as_deref())?;
    logging::init(&config.logging, cli.verbose);
    tracing::debug!(
        "Configuration loaded (default timeout {:?}, max {:?})",
        config.policy.default_timeout,
        config.policy.max_timeout
    );
    commands::dispatch(cli, config).await
}
