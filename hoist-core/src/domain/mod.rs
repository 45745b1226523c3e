//! Core domain types
//!
//! These types are shared between the orchestrator (which records runs),
//! the runner (which executes stages) and the CLI (which displays them).

pub mod config;
pub mod log;
pub mod plan;
pub mod run;
