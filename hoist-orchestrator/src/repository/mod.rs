//! Repository Module
//!
//! Storage for run records and run logs. Everything is kept in memory and
//! lost on restart.

pub mod log;
pub mod run;
