//! Output capture
//!
//! One pump task per pipe reads raw chunks, reassembles UTF-8 sequences
//! split across reads, appends to a bounded buffer and forwards each chunk
//! to the observer. The stdout pump of a dev server also feeds a
//! readiness probe.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::types::{OutputChunk, OutputObserver, OutputStream};

/// Appended once a buffer hits its cap
pub const TRUNCATION_MARKER: &str = "\n... (output truncated due to size limit)";

const READ_CHUNK_BYTES: usize = 8192;

/// Captured output of one stream
#[derive(Debug)]
pub struct OutputBuffer {
    text: String,
    limit: usize,
    truncated: bool,
}

pub type SharedBuffer = Arc<Mutex<OutputBuffer>>;

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            truncated: false,
        }
    }

    pub fn shared(limit: usize) -> SharedBuffer {
        Arc::new(Mutex::new(Self::new(limit)))
    }

    pub fn push(&mut self, chunk: &str) {
        if self.truncated {
            return;
        }
        let remaining = self.limit.saturating_sub(self.text.len());
        if chunk.len() <= remaining {
            self.text.push_str(chunk);
            return;
        }

        let mut cut = remaining;
        while !chunk.is_char_boundary(cut) {
            cut -= 1;
        }
        self.text.push_str(&chunk[..cut]);
        self.text.push_str(TRUNCATION_MARKER);
        self.truncated = true;
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Incremental UTF-8 decoding across read boundaries
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode what is complete so far; invalid bytes become U+FFFD
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        // Incomplete sequence at the end; wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is left at end of stream
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Watches stdout for a readiness marker
#[derive(Debug)]
pub struct ReadinessProbe {
    markers: Vec<String>,
    window: String,
    keep: usize,
    ready: CancellationToken,
}

impl ReadinessProbe {
    pub fn new(markers: &[String], ready: CancellationToken) -> Self {
        let markers: Vec<String> = markers
            .iter()
            .map(|m| m.to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        let keep = markers.iter().map(String::len).max().unwrap_or(0);
        Self {
            markers,
            window: String::new(),
            keep,
            ready,
        }
    }

    /// Returns true once any marker has been seen
    pub fn feed(&mut self, chunk: &str) -> bool {
        if self.ready.is_cancelled() {
            return true;
        }
        self.window.push_str(&chunk.to_lowercase());
        if self.markers.iter().any(|m| self.window.contains(m.as_str())) {
            self.window.clear();
            self.ready.cancel();
            return true;
        }

        // A marker split across chunks must still be found next time
        if self.window.len() > self.keep {
            let mut start = self.window.len() - self.keep;
            while !self.window.is_char_boundary(start) {
                start += 1;
            }
            self.window.drain(..start);
        }
        false
    }
}

struct Pump {
    command_id: String,
    stream: OutputStream,
    buffer: SharedBuffer,
    observer: Option<OutputObserver>,
    probe: Option<ReadinessProbe>,
}

impl Pump {
    fn deliver(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        self.buffer.lock().push(&text);
        if let Some(probe) = self.probe.as_mut() {
            probe.feed(&text);
        }
        if let Some(observer) = &self.observer {
            observer(OutputChunk {
                command_id: self.command_id.clone(),
                stream: self.stream,
                text,
            });
        }
    }
}

/// Spawn a task copying one pipe into a buffer
pub fn spawn_pump<R>(
    mut reader: R,
    command_id: String,
    stream: OutputStream,
    buffer: SharedBuffer,
    observer: Option<OutputObserver>,
    probe: Option<ReadinessProbe>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut pump = Pump {
        command_id,
        stream,
        buffer,
        observer,
        probe,
    };

    tokio::spawn(async move {
        let mut decoder = Utf8Decoder::default();
        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => pump.deliver(decoder.decode(&chunk[..n])),
                Err(e) => {
                    debug!("Reading {:?} of {} failed: {}", pump.stream, pump.command_id, e);
                    break;
                }
            }
        }
        pump.deliver(decoder.finish());
    })
}

/// Wait for pumps to hit EOF, aborting them after `bound`
///
/// Returns false if the bound was hit, which means something outside the
/// child still holds the pipe open.
pub async fn drain(mut pumps: Vec<JoinHandle<()>>, bound: Duration) -> bool {
    let all = async {
        for pump in pumps.iter_mut() {
            let _ = pump.await;
        }
    };
    if tokio::time::timeout(bound, all).await.is_ok() {
        return true;
    }
    for pump in &pumps {
        pump.abort();
    }
    false
}
