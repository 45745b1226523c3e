//! Data Transfer Objects
//!
//! Request and response bodies exchanged between the CLI, the client and the
//! orchestrator API.

pub mod run;
pub mod webhook;
