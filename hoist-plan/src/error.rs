//! Plan error types

use hoist_core::domain::plan::PlanValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    /// Plan source failed to load or evaluate
    #[error("failed to evaluate plan: {0}")]
    Lua(#[from] mlua::Error),

    /// A field is missing or has the wrong shape
    #[error("plan field '{field}': {reason}")]
    Field { field: String, reason: String },

    /// The plan parsed but breaks an invariant
    #[error("invalid plan: {0}")]
    Invalid(#[from] PlanValidationError),

    #[error("failed to read plan file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PlanError {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
