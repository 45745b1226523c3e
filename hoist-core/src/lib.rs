//! Hoist Core
//!
//! Core types shared by every Hoist component.
//!
//! This crate contains:
//! - Domain types: deploy configuration, deploy plans, runs, stages and logs
//! - DTOs: request/response bodies exchanged with the orchestrator

pub mod domain;
pub mod dto;
