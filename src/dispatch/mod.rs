//! Dispatch pipeline: command construction, reporter launch, and the
//! periodic scheduler that ties them to the heartbeat buffer.

pub mod command;
pub mod dispatcher;
pub mod scheduler;

pub use command::CommandBuilder;
pub use dispatcher::{dispatch, encode_extras, DispatchError, ReporterProcess};
pub use scheduler::{CycleOutcome, DispatchCycle, DispatchScheduler};
