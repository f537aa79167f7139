//! Periodic drain-and-dispatch loop.
//!
//! A single background thread fires at a fixed rate, starting immediately.
//! A cycle that overruns its period pushes the next firing back; firings never
//! overlap and missed ticks collapse into one.

use crate::config::SharedSettings;
use crate::credentials::{SharedCredentials, API_KEY_TOKEN};
use crate::dispatch::command::CommandBuilder;
use crate::dispatch::dispatcher::{dispatch, DispatchError, ReporterProcess};
use crate::heartbeat::HeartbeatBuffer;
use crate::transparency::SharedTransparencyLog;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Result of one dispatch cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Nothing was queued.
    Idle,
    /// The reporter was launched with `heartbeats` heartbeats.
    Dispatched {
        heartbeats: usize,
        process: ReporterProcess,
    },
    /// The batch of `discarded` heartbeats was dropped.
    Failed {
        discarded: usize,
        error: DispatchError,
    },
}

/// Everything one dispatch cycle needs.
pub struct DispatchCycle {
    buffer: Arc<HeartbeatBuffer>,
    commands: CommandBuilder,
    credentials: SharedCredentials,
    settings: SharedSettings,
    log: SharedTransparencyLog,
}

impl DispatchCycle {
    pub fn new(
        buffer: Arc<HeartbeatBuffer>,
        commands: CommandBuilder,
        credentials: SharedCredentials,
        settings: SharedSettings,
        log: SharedTransparencyLog,
    ) -> Self {
        Self {
            buffer,
            commands,
            credentials,
            settings,
            log,
        }
    }

    /// Drain the buffer and hand the batch to the reporter.
    ///
    /// The first drained heartbeat goes on the command line, the rest on
    /// stdin. A failed batch is not re-queued.
    pub fn run_once(&self) -> CycleOutcome {
        let mut batch = self.buffer.drain_all().into_iter();
        let Some(primary) = batch.next() else {
            debug!("no heartbeats queued");
            return CycleOutcome::Idle;
        };
        let extras: Vec<_> = batch.collect();
        let total = extras.len() + 1;
        debug!(extras = extras.len(), "dispatching heartbeats");

        let api_key = self.credentials.get_token(API_KEY_TOKEN).unwrap_or_default();
        let settings = self
            .settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(proxy) = settings.proxy() {
            debug!(proxy, "reporter will use proxy");
        }

        let argv = self.commands.build(&primary, &api_key, &extras, &settings);
        match dispatch(&argv, &extras) {
            Ok(process) => {
                self.log.record_dispatched(total as u64);
                CycleOutcome::Dispatched {
                    heartbeats: total,
                    process,
                }
            }
            Err(error) => {
                match &error {
                    DispatchError::StdinWrite(_) => {
                        warn!(error = %error, discarded = total, "reporter did not accept heartbeats")
                    }
                    _ => error!(error = %error, discarded = total, "could not run reporter"),
                }
                self.log.record_failure(total as u64);
                CycleOutcome::Failed {
                    discarded: total,
                    error,
                }
            }
        }
    }
}

/// Handle to the running scheduler thread.
pub struct DispatchScheduler {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DispatchScheduler {
    /// Start firing `cycle` every `period`, the first time right away.
    ///
    /// A zero `period` is rejected with `InvalidInput`.
    pub fn start(cycle: DispatchCycle, period: Duration) -> std::io::Result<Self> {
        if period.is_zero() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "dispatch period must be non-zero",
            ));
        }
        let (shutdown, shutdown_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("heartbeat-dispatch".to_string())
            .spawn(move || {
                info!(period_secs = period.as_secs_f64(), "dispatch scheduler started");
                let mut next = Instant::now();
                loop {
                    let wait = next.saturating_duration_since(Instant::now());
                    match shutdown_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            // Reporter processes are reaped by their own threads.
                            let _ = cycle.run_once();
                            next += period;
                            let now = Instant::now();
                            if next < now {
                                next = now;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("dispatch scheduler stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the scheduler and wait for an in-flight cycle to finish.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("dispatch scheduler thread panicked");
            }
        }
    }
}

impl Drop for DispatchScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
