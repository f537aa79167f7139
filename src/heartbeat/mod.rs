//! Heartbeat values and the buffer they wait in until dispatch.

pub mod buffer;
pub mod types;

pub use buffer::{HeartbeatBuffer, HeartbeatSender};
pub use types::{Heartbeat, HeartbeatError, Timestamp};
