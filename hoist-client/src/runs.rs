//! Run-related API endpoints

use hoist_core::domain::log::LogEntry;
use hoist_core::domain::run::DeployRun;
use hoist_core::dto::run::{RunSummary, TriggerDeploy};
use uuid::Uuid;

use crate::HoistClient;
use crate::error::{ClientError, Result};

impl HoistClient {
    /// Queue a manual deploy on the orchestrator
    pub async fn trigger_deploy(&self, req: &TriggerDeploy) -> Result<DeployRun> {
        let url = format!("{}/deploy", self.base_url);
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Get a run by ID
    pub async fn get_run(&self, run_id: Uuid) -> Result<DeployRun> {
        let url = format!("{}/run/{}", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List runs, most recent first
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let url = format!("{}/run/list", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get every log entry recorded for a run
    pub async fn get_run_logs(&self, run_id: Uuid) -> Result<Vec<LogEntry>> {
        let url = format!("{}/run/{}/logs", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Check that the orchestrator is up
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::api_error(status.as_u16(), "health check failed"));
        }
        Ok(())
    }
}
