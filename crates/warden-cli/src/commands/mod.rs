//! Command implementations

mod check;
mod policy;
mod run;
mod serve;

use anyhow::Context;
use std::sync::Arc;
use warden_core::{EngineConfig, PolicySnapshot, SandboxEngine};

use crate::args::{Cli, Commands};
use crate::console::CliConsole;

/// Route a parsed command line; returns the process exit code
pub async fn dispatch(cli: Cli, mut config: EngineConfig) -> anyhow::Result<i32> {
    if let Some(dir) = &cli.workdir {
        config.session.working_dir = Some(dir.clone());
        config.session.remove_on_cleanup = false;
    }

    let console = Arc::new(CliConsole::new(cli.verbose));
    let engine = build_engine(config, Arc::clone(&console))?;
    if let Some(path) = &cli.policy {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read policy file {}", path.display()))?;
        engine.import_config(PolicySnapshot::from_json(&text)?)?;
        console.info(&format!("Imported policy from {}", path.display()));
    }

    match cli.command {
        Commands::Check {
            command,
            timeout,
            json,
        } => check::execute(&engine, &console, &command, timeout, json),
        Commands::Run {
            command,
            timeout,
            env,
            cwd,
        } => run::execute(&engine, &console, &command, timeout, env, cwd).await,
        Commands::Serve { framework } => serve::execute(&engine, &console, &framework).await,
        Commands::Frameworks => {
            console.print_header("Dev-server frameworks");
            for (name, profile) in engine.frameworks() {
                println!("  {:<10} {}", name, profile.command);
            }
            Ok(0)
        }
        Commands::Policy { action } => policy::execute(&engine, action),
    }
}

fn build_engine(config: EngineConfig, console: Arc<CliConsole>) -> anyhow::Result<SandboxEngine> {
    let engine = SandboxEngine::builder()
        .config(config)
        .event_sink(move |event: warden_core::LogEvent| console.event(&event))
        .build()?;
    Ok(engine)
}
