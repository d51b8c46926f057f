//! Builder for [`SandboxEngine`]

use std::path::PathBuf;
use std::sync::Arc;

use super::SandboxEngine;
use crate::config::EngineConfig;
use crate::error::SandboxResult;
use crate::events::{EventSink, SharedEventSink, TracingSink};
use crate::gateway::PolicyGateway;
use crate::policy::{SecurityPolicy, SharedPolicy};
use crate::session::SandboxSession;
use crate::stats::{SharedStats, StatsCollector};
use crate::supervisor::{ExecutionSupervisor, builtin_profiles};

/// Assembles an engine from explicit dependencies
///
/// Anything not supplied is created fresh from the configuration. Passing
/// the same [`SharedPolicy`] to several builders makes the engines share
/// one policy.
#[derive(Default)]
pub struct SandboxEngineBuilder {
    config: EngineConfig,
    policy: Option<SharedPolicy>,
    events: Option<SharedEventSink>,
    stats: Option<SharedStats>,
}

impl SandboxEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing policy instead of building one from the config
    pub fn policy(mut self, policy: SharedPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Send log events here
    pub fn event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Some(Arc::new(sink));
        self
    }

    /// Send log events to an already shared sink
    pub fn shared_event_sink(mut self, sink: SharedEventSink) -> Self {
        self.events = Some(sink);
        self
    }

    /// Count into an existing collector
    pub fn stats(mut self, stats: SharedStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Run in this directory instead of a fresh one under the root
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.session.working_dir = Some(path.into());
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> SandboxResult<SandboxEngine> {
        let config = self.config;
        config.validate()?;

        let policy = match self.policy {
            Some(policy) => policy,
            None => SecurityPolicy::from_config(&config.policy)?.shared(),
        };
        let stats = self.stats.unwrap_or_else(StatsCollector::shared);
        let events = self.events.unwrap_or_else(|| Arc::new(TracingSink));

        let mut frameworks = builtin_profiles();
        frameworks.extend(
            config
                .dev_server
                .frameworks
                .iter()
                .map(|(name, profile)| (name.to_lowercase(), profile.clone())),
        );

        Ok(SandboxEngine {
            gateway: PolicyGateway::new(policy, Arc::clone(&stats)),
            supervisor: ExecutionSupervisor::new(config.supervisor.clone(), Arc::clone(&stats)),
            session: SandboxSession::new(config.session.clone()),
            frameworks,
            events,
            stats,
            config,
        })
    }
}
