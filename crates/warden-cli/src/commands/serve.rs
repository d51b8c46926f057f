//! `warden serve`

use std::sync::Arc;
use std::time::Duration;
use warden_core::{ExecutionKind, OutputChunk, OutputObserver, SandboxEngine};

use crate::console::{CliConsole, print_chunk};
use crate::signal_handler::{INTERRUPTED, wait_for_shutdown};

const LIVENESS_POLL: Duration = Duration::from_millis(500);

pub async fn execute(
    engine: &SandboxEngine,
    console: &CliConsole,
    framework: &str,
) -> anyhow::Result<i32> {
    engine.initialize().await?;

    let observer: OutputObserver = Arc::new(|chunk: OutputChunk| print_chunk(&chunk));
    let handle = match engine.start_dev_server(framework, Some(observer)).await {
        Ok(handle) => handle,
        Err(e) => {
            engine.cleanup().await;
            return Err(e.into());
        }
    };
    console.success(&format!("{} running at {}", framework, handle.url));
    console.info("Press Ctrl+C to stop");

    let exited = async {
        while !engine
            .session()
            .ids_of_kind(ExecutionKind::Server)
            .is_empty()
        {
            tokio::time::sleep(LIVENESS_POLL).await;
        }
    };

    let code = tokio::select! {
        signal = wait_for_shutdown() => {
            console.info(&format!("Received signal {}, stopping", signal?));
            engine.stop_dev_server().await?;
            INTERRUPTED
        }
        _ = exited => {
            console.warn("Dev server exited");
            1
        }
    };

    engine.cleanup().await;
    Ok(code)
}
