//! Service Module
//!
//! Business logic for the orchestrator: queueing runs, answering queries
//! and the worker that executes queued runs one at a time.

pub mod run;
pub mod worker;
