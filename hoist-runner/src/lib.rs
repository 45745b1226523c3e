//! Hoist deploy runner
//!
//! Executes the fetch, transfer and launch stages of a deploy against a
//! target host. Used in-process by the orchestrator's worker and by
//! `hoist deploy`.

pub mod command;
pub mod config;
pub mod credentials;
pub mod error;
pub mod log_buffer;
pub mod readiness;
pub mod sequencer;
pub mod stage;
pub mod transport;

pub use config::RunnerConfig;
pub use error::StageError;
pub use log_buffer::{InMemoryLogBuffer, LogSink};
pub use sequencer::{RunReport, Sequencer};

#[cfg(test)]
pub(crate) mod testing;
