//! Run DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::config::ConfigOverrides;
use crate::domain::run::{DeployRun, RunStatus, Trigger};

/// Request to queue a manual deploy run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerDeploy {
    /// Branch to deploy instead of the configured one
    #[serde(default)]
    pub branch: Option<String>,
}

impl TriggerDeploy {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            branch: self.branch.clone(),
        }
    }
}

/// Lightweight run listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub trigger: Trigger,
    pub status: RunStatus,
    pub branch: String,
    pub requested_at: chrono::DateTime<chrono::Utc>,
}

impl From<&DeployRun> for RunSummary {
    fn from(run: &DeployRun) -> Self {
        Self {
            id: run.id,
            trigger: run.trigger,
            status: run.status,
            branch: run.config.branch.clone(),
            requested_at: run.requested_at,
        }
    }
}
