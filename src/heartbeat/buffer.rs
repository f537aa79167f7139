//! Heartbeat buffer shared between editor event producers and the dispatch
//! scheduler.
//!
//! Backed by an unbounded crossbeam channel: any number of producers push
//! without blocking, and a single consumer drains whatever is queued.

use crate::heartbeat::types::Heartbeat;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::trace;

/// Push-only handle given to event producers.
#[derive(Debug, Clone)]
pub struct HeartbeatSender {
    sender: Sender<Heartbeat>,
}

impl HeartbeatSender {
    /// Append a heartbeat. Never blocks and never rejects while the buffer is
    /// alive; once the buffer is gone the heartbeat is dropped.
    pub fn push(&self, heartbeat: Heartbeat) {
        if let Err(e) = self.sender.send(heartbeat) {
            trace!(entity = e.0.entity(), "buffer closed, heartbeat dropped");
        }
    }
}

/// Unbounded FIFO of heartbeats with a single draining consumer.
#[derive(Debug)]
pub struct HeartbeatBuffer {
    sender: Sender<Heartbeat>,
    receiver: Receiver<Heartbeat>,
}

impl HeartbeatBuffer {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// A new producer handle feeding this buffer.
    pub fn sender(&self) -> HeartbeatSender {
        HeartbeatSender {
            sender: self.sender.clone(),
        }
    }

    /// Append a heartbeat directly.
    pub fn push(&self, heartbeat: Heartbeat) {
        // The buffer owns a receiver, so sending cannot fail here.
        let _ = self.sender.send(heartbeat);
    }

    /// Remove and return everything queued at the moment of the call, oldest
    /// first.
    ///
    /// Heartbeats pushed while the drain is running are left for the next one.
    pub fn drain_all(&self) -> Vec<Heartbeat> {
        let queued = self.receiver.len();
        let mut drained = Vec::with_capacity(queued);
        for _ in 0..queued {
            match self.receiver.try_recv() {
                Ok(heartbeat) => drained.push(heartbeat),
                Err(_) => break,
            }
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for HeartbeatBuffer {
    fn default() -> Self {
        Self::new()
    }
}
