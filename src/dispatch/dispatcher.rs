//! Reporter process launch.
//!
//! The reporter is fire-and-forget: once stdin is written and closed the
//! child is handed to a reaper thread that logs how it exited.

use crate::heartbeat::Heartbeat;
use std::io::{self, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("reporter command is empty")]
    EmptyCommand,

    #[error("could not encode extra heartbeats: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("failed to start reporter {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write heartbeats to reporter stdin: {0}")]
    StdinWrite(#[source] io::Error),
}

/// JSON array of `extras` followed by a single newline.
pub fn encode_extras(extras: &[Heartbeat]) -> Result<Vec<u8>, serde_json::Error> {
    let mut payload = serde_json::to_vec(extras)?;
    payload.push(b'\n');
    Ok(payload)
}

/// A launched reporter whose exit is collected in the background.
#[derive(Debug)]
pub struct ReporterProcess {
    pid: u32,
    reaper: JoinHandle<Option<ExitStatus>>,
}

impl ReporterProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Block until the reporter exits. `None` if its status was unavailable.
    pub fn wait(self) -> Option<ExitStatus> {
        self.reaper.join().ok().flatten()
    }
}

/// Launch the reporter described by `argv` and feed `extras` to its stdin.
///
/// Does not wait for the reporter to finish.
pub fn dispatch(argv: &[String], extras: &[Heartbeat]) -> Result<ReporterProcess, DispatchError> {
    let (binary, args) = argv.split_first().ok_or(DispatchError::EmptyCommand)?;
    let payload = encode_extras(extras)?;

    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DispatchError::Spawn {
            binary: binary.clone(),
            source,
        })?;

    let pid = child.id();
    let stdin = child.stdin.take();
    let reaper = spawn_reaper(child);
    let process = ReporterProcess { pid, reaper };
    debug!(pid, extras = extras.len(), "reporter started");

    let mut stdin = stdin.ok_or_else(|| {
        DispatchError::StdinWrite(io::Error::new(io::ErrorKind::BrokenPipe, "stdin unavailable"))
    })?;
    stdin
        .write_all(&payload)
        .and_then(|_| stdin.flush())
        .map_err(DispatchError::StdinWrite)?;
    drop(stdin);

    Ok(process)
}

fn spawn_reaper(child: Child) -> JoinHandle<Option<ExitStatus>> {
    thread::spawn(move || {
        let pid = child.id();
        match child.wait_with_output() {
            Ok(output) => {
                if output.status.success() {
                    debug!(pid, status = %output.status, "reporter exited");
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    debug!(
                        pid,
                        status = %output.status,
                        stderr = %stderr.trim(),
                        "reporter exited with failure"
                    );
                }
                Some(output.status)
            }
            Err(e) => {
                debug!(pid, error = %e, "could not collect reporter exit status");
                None
            }
        }
    })
}
