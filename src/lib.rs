//! WakaTime Agent - editor activity telemetry for the wakatime reporter.
//!
//! This library turns editor events into heartbeats, batches them, and hands
//! each batch to the external `wakatime-cli` reporter, which it downloads and
//! installs on first activation.
//!
//! # Guarantees
//!
//! - **Never blocks the editor**: queuing a heartbeat is a non-blocking push
//! - **Ordered batches**: heartbeats reach the reporter in capture order
//! - **Safe installs**: archive entries cannot escape the install directory
//! - **Transparency**: captured, dispatched and discarded heartbeats are counted
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WakaTime Agent                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────────┐     │
//! │  │   Editor    │──▶│  Heartbeat  │──▶│    Scheduler    │     │
//! │  │   events    │   │   Buffer    │   │ (every 30 secs) │     │
//! │  └─────────────┘   └─────────────┘   └─────────────────┘     │
//! │                                               │               │
//! │                                               ▼               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────────┐     │
//! │  │ Provisioner │──▶│ wakatime-cli│◀──│ Command Builder │     │
//! │  │ (once)      │   │  (process)  │   │  + Dispatcher   │     │
//! │  └─────────────┘   └─────────────┘   └─────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wakatime_agent::{Agent, AgentOptions, Config, EnvCredentialStore, HostInfo};
//!
//! let config = Config::load().unwrap_or_default();
//! let options = AgentOptions::from_config(
//!     &config,
//!     HostInfo::new("vim", "9.1"),
//!     Arc::new(EnvCredentialStore),
//! );
//!
//! // Downloads the reporter, then starts dispatching
//! let agent = Agent::activate(options).expect("activation failed");
//! let producer = agent.producer();
//! // producer.on_event(&event) from editor callbacks
//! agent.deactivate();
//! ```

pub mod agent;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod editor;
pub mod heartbeat;
pub mod install;
pub mod logging;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use agent::{Agent, AgentError, AgentOptions};
pub use config::{Config, Settings, SharedSettings};
pub use credentials::{
    CredentialStore, EnvCredentialStore, MemoryCredentialStore, SharedCredentials, API_KEY_TOKEN,
};
pub use dispatch::{CommandBuilder, DispatchCycle, DispatchScheduler};
pub use editor::{Document, EditorEvent, HeartbeatProducer, HostInfo};
pub use heartbeat::{Heartbeat, HeartbeatBuffer, HeartbeatError, Timestamp};
pub use install::{
    BlockingReleaseClient, Installation, Platform, ProvisionError, ProvisionFailure,
    ProvisionState, Provisioner, ReleaseClient, ReleaseConfig,
};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
