//! Hoist Plan
//!
//! Deploy plans are written as Lua tables and evaluated in a restricted
//! sandbox. This crate provides:
//! - The plan sandbox
//! - Plan parsing and validation
//! - The built-in default plan and a Lua renderer for it

pub mod default;
pub mod error;
pub mod parser;
pub mod sandbox;

pub use default::{default_plan, render_plan};
pub use error::PlanError;
pub use parser::{load_plan, parse_plan};
pub use sandbox::create_plan_sandbox;

pub use hoist_core::domain::plan::{
    DeployPlan, ExistingProcessPolicy, LaunchSpec, PLAN_VERSION, ReadinessSpec,
};
