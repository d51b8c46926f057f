//! Warden core library
//!
//! Policy-gated execution of shell commands. A [`PolicyGateway`] decides
//! whether a command may run, sanitizes it and assigns a time budget; an
//! [`ExecutionSupervisor`] runs approved commands as child processes inside
//! a [`SandboxSession`] and settles each one exactly once. [`SandboxEngine`]
//! ties the pieces together for host applications.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod policy;
pub mod session;
pub mod stats;
pub mod supervisor;

// Re-export commonly used types
pub use config::{ConfigLoader, EngineConfig, load_config};
pub use engine::{SandboxEngine, SandboxEngineBuilder, SandboxStatus};
pub use error::{ErrorKind, SandboxError, SandboxResult};
pub use events::{ChannelSink, EventSink, LogEvent, LogKind, NullSink, SharedEventSink, TracingSink};
pub use gateway::{DenialKind, PolicyGateway, ValidationOptions, ValidationResult};
pub use policy::{PolicySnapshot, SecurityPolicy, SharedPolicy};
pub use session::{
    CleanupReport, ExecutionKind, ExecutionRecord, ExecutionState, KillResult, SandboxSession,
    SessionState,
};
pub use stats::{SharedStats, StatsCollector, StatsSnapshot};
pub use supervisor::{
    DevServerHandle, ExecutionOptions, ExecutionOutcome, ExecutionSupervisor, FrameworkProfile,
    OutputChunk, OutputObserver, OutputStream,
};
