//! Activity log of what the agent captured and handed to the reporter.
//!
//! Only counters are kept. Heartbeats themselves are never written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Activity counters for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Heartbeats produced from editor events
    heartbeats_captured: AtomicU64,
    /// Dispatch cycles that found work
    dispatch_cycles: AtomicU64,
    /// Heartbeats handed to a running reporter
    heartbeats_dispatched: AtomicU64,
    /// Heartbeats dropped by failed cycles
    heartbeats_discarded: AtomicU64,
    /// Cycles that failed to spawn or feed the reporter
    dispatch_failures: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            heartbeats_captured: AtomicU64::new(0),
            dispatch_cycles: AtomicU64::new(0),
            heartbeats_dispatched: AtomicU64::new(0),
            heartbeats_discarded: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that accumulates onto counters saved at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            debug!(error = %e, "could not load previous activity stats");
        }

        log
    }

    pub fn record_heartbeat_captured(&self) {
        self.heartbeats_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cycle that launched the reporter with `count` heartbeats.
    pub fn record_dispatched(&self, count: u64) {
        self.dispatch_cycles.fetch_add(1, Ordering::Relaxed);
        self.heartbeats_dispatched.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a cycle that failed and dropped `discarded` heartbeats.
    pub fn record_failure(&self, discarded: u64) {
        self.dispatch_cycles.fetch_add(1, Ordering::Relaxed);
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
        self.heartbeats_discarded.fetch_add(discarded, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            heartbeats_captured: self.heartbeats_captured.load(Ordering::Relaxed),
            dispatch_cycles: self.dispatch_cycles.load(Ordering::Relaxed),
            heartbeats_dispatched: self.heartbeats_dispatched.load(Ordering::Relaxed),
            heartbeats_discarded: self.heartbeats_discarded.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Heartbeats captured: {}\n\
             - Dispatch cycles: {}\n\
             - Heartbeats sent to reporter: {}\n\
             - Heartbeats discarded: {}\n\
             - Failed cycles: {}\n\
             - Session duration: {} seconds",
            stats.heartbeats_captured,
            stats.dispatch_cycles,
            stats.heartbeats_dispatched,
            stats.heartbeats_discarded,
            stats.dispatch_failures,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                heartbeats_captured: stats.heartbeats_captured,
                dispatch_cycles: stats.dispatch_cycles,
                heartbeats_dispatched: stats.heartbeats_dispatched,
                heartbeats_discarded: stats.heartbeats_discarded,
                dispatch_failures: stats.dispatch_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = read_persisted(path)?;

                self.heartbeats_captured
                    .store(persisted.heartbeats_captured, Ordering::Relaxed);
                self.dispatch_cycles
                    .store(persisted.dispatch_cycles, Ordering::Relaxed);
                self.heartbeats_dispatched
                    .store(persisted.heartbeats_dispatched, Ordering::Relaxed);
                self.heartbeats_discarded
                    .store(persisted.heartbeats_discarded, Ordering::Relaxed);
                self.dispatch_failures
                    .store(persisted.dispatch_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the activity counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub heartbeats_captured: u64,
    pub dispatch_cycles: u64,
    pub heartbeats_dispatched: u64,
    pub heartbeats_discarded: u64,
    pub dispatch_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub heartbeats_captured: u64,
    pub dispatch_cycles: u64,
    pub heartbeats_dispatched: u64,
    pub heartbeats_discarded: u64,
    pub dispatch_failures: u64,
    pub last_updated: DateTime<Utc>,
}

/// Read counters saved by [`TransparencyLog::save`].
pub fn read_persisted(path: &std::path::Path) -> Result<PersistedStats, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(std::io::Error::other)
}

/// Thread-safe shared activity log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
