//! Deploy run domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::config::DeployConfig;

/// One ordered unit of the deploy sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Fetch,
    Transfer,
    Launch,
}

impl StageKind {
    /// Stages in execution order
    pub const ALL: [StageKind; 3] = [StageKind::Fetch, StageKind::Transfer, StageKind::Launch];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Fetch => "fetch",
            StageKind::Transfer => "transfer",
            StageKind::Launch => "launch",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    Manual,
    Webhook,
}

/// Run lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

/// Outcome of a single executed stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: StageKind,
    pub success: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub error: Option<String>,
}

impl StageOutcome {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.signed_duration_since(self.started_at)
    }
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub exit_code: i32,
    pub failed_stage: Option<StageKind>,
    pub error_message: Option<String>,
}

impl RunResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            exit_code: 0,
            failed_stage: None,
            error_message: None,
        }
    }

    pub fn failed(stage: StageKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: 1,
            failed_stage: Some(stage),
            error_message: Some(error.into()),
        }
    }
}

/// Deploy run record
///
/// Kept by the orchestrator for every triggered run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRun {
    pub id: Uuid,
    pub trigger: Trigger,
    pub status: RunStatus,
    /// Frozen configuration the run executes with
    pub config: DeployConfig,
    /// Name of the plan the run executes
    pub plan_name: String,
    pub requested_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub stages: Vec<StageOutcome>,
    pub result: Option<RunResult>,
}

impl DeployRun {
    pub fn queued(trigger: Trigger, config: DeployConfig, plan_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            status: RunStatus::Queued,
            config,
            plan_name: plan_name.into(),
            requested_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            stages: Vec::new(),
            result: None,
        }
    }

    /// Highest stage that completed successfully
    pub fn completed_through(&self) -> Option<StageKind> {
        self.stages
            .iter()
            .take_while(|s| s.success)
            .last()
            .map(|s| s.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(
            StageKind::ALL.map(|s| s.as_str()),
            ["fetch", "transfer", "launch"]
        );
    }

    #[test]
    fn test_stage_serializes_lowercase() {
        let json = serde_json::to_string(&StageKind::Transfer).unwrap();
        assert_eq!(json, "\"transfer\"");
    }

    #[test]
    fn test_run_result_constructors() {
        let ok = RunResult::succeeded();
        assert!(ok.success);
        assert_eq!(ok.exit_code, 0);

        let failed = RunResult::failed(StageKind::Fetch, "branch not found");
        assert!(!failed.success);
        assert_eq!(failed.exit_code, 1);
        assert_eq!(failed.failed_stage, Some(StageKind::Fetch));
    }

    #[test]
    fn test_status_terminal() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
