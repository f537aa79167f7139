//! Transparency module: what the agent captured and what it passed on.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, read_persisted, PersistedStats,
    SharedTransparencyLog, TransparencyLog, TransparencyStats,
};
