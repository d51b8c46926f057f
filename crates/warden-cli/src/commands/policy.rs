//! `warden policy`

use anyhow::Context;
use warden_core::SandboxEngine;

use crate::args::PolicyAction;

pub fn execute(engine: &SandboxEngine, action: PolicyAction) -> anyhow::Result<i32> {
    match action {
        PolicyAction::Export { output } => {
            let json = engine.export_config().to_json()?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => println!("{}", json),
            }
        }
    }
    Ok(0)
}
