//! Shutdown signal handling

use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;

/// Exit status conventionally used after SIGINT
pub const INTERRUPTED: i32 = 130;

/// Resolve on the first SIGINT or SIGTERM, returning the signal number
pub async fn wait_for_shutdown() -> anyhow::Result<i32> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();
    let signal = signals.next().await.unwrap_or(SIGINT);
    handle.close();
    Ok(signal)
}
