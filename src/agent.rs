//! Activation-scoped agent context.
//!
//! Everything the pipeline needs is constructed here and torn down on
//! deactivation. Activation provisions the reporter first and arms the
//! dispatch scheduler only once it is installed.

use crate::config::{shared_settings, Config, SharedSettings};
use crate::credentials::SharedCredentials;
use crate::dispatch::{CommandBuilder, DispatchCycle, DispatchScheduler};
use crate::editor::{HeartbeatProducer, HostInfo};
use crate::heartbeat::HeartbeatBuffer;
use crate::install::{
    resolve_install_dir, Installation, Platform, ProvisionError, Provisioner, ReleaseConfig,
};
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("could not start dispatch scheduler: {0}")]
    Scheduler(#[source] std::io::Error),
}

/// Inputs for one activation.
#[derive(Clone)]
pub struct AgentOptions {
    pub host: HostInfo,
    pub plugin_version: String,
    pub settings: SharedSettings,
    pub credentials: SharedCredentials,
    pub release: ReleaseConfig,
    pub platform: Platform,
    pub install_dir: PathBuf,
    pub dispatch_interval: Duration,
    pub log: SharedTransparencyLog,
}

impl AgentOptions {
    /// Options for the current machine, taking proxy and interval from `config`.
    pub fn from_config(config: &Config, host: HostInfo, credentials: SharedCredentials) -> Self {
        let release = ReleaseConfig {
            proxy: config.proxy.clone(),
            ..ReleaseConfig::default()
        };

        Self {
            host,
            plugin_version: crate::VERSION.to_string(),
            settings: shared_settings(config.settings()),
            credentials,
            release,
            platform: Platform::current(),
            install_dir: resolve_install_dir(),
            dispatch_interval: config.dispatch_interval,
            log: create_shared_log(),
        }
    }

    pub fn with_log(mut self, log: SharedTransparencyLog) -> Self {
        self.log = log;
        self
    }
}

/// A running agent: provisioned reporter plus an armed scheduler.
pub struct Agent {
    buffer: Arc<HeartbeatBuffer>,
    installation: Installation,
    settings: SharedSettings,
    log: SharedTransparencyLog,
    scheduler: DispatchScheduler,
}

impl Agent {
    /// Provision the reporter, then start dispatching.
    ///
    /// Blocks until provisioning finishes. A provisioning failure disables
    /// the agent for the session; nothing is captured or scheduled.
    pub fn activate(options: AgentOptions) -> Result<Self, AgentError> {
        let AgentOptions {
            host,
            plugin_version,
            settings,
            credentials,
            release,
            platform,
            install_dir,
            dispatch_interval,
            log,
        } = options;

        let mut provisioner = Provisioner::new(release, install_dir, platform);
        let installation = provisioner.provision_blocking().map_err(|e| {
            error!(error = %e, "telemetry disabled for this session");
            e
        })?;

        let buffer = Arc::new(HeartbeatBuffer::new());
        let commands = CommandBuilder::new(
            installation.binary_path.clone(),
            host.plugin_identity(&plugin_version),
        );
        let cycle = DispatchCycle::new(
            buffer.clone(),
            commands,
            credentials,
            settings.clone(),
            log.clone(),
        );
        let scheduler =
            DispatchScheduler::start(cycle, dispatch_interval).map_err(AgentError::Scheduler)?;

        info!(
            reporter = %installation.binary_path.display(),
            editor = %host.name,
            "agent activated"
        );

        Ok(Self {
            buffer,
            installation,
            settings,
            log,
            scheduler,
        })
    }

    /// A producer handle for editor callbacks.
    pub fn producer(&self) -> HeartbeatProducer {
        HeartbeatProducer::new(self.buffer.sender(), self.log.clone())
    }

    pub fn installation(&self) -> &Installation {
        &self.installation
    }

    /// Live settings; changes apply from the next dispatch cycle.
    pub fn settings(&self) -> SharedSettings {
        self.settings.clone()
    }

    pub fn log(&self) -> SharedTransparencyLog {
        self.log.clone()
    }

    /// Stop dispatching. Heartbeats still queued are dropped.
    pub fn deactivate(mut self) {
        self.scheduler.stop();
        let pending = self.buffer.len();
        if pending > 0 {
            info!(pending, "dropping undispatched heartbeats");
        }
        if let Err(e) = self.log.save() {
            warn!(error = %e, "could not save activity log");
        }
        info!("agent deactivated");
    }
}
