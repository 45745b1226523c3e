//! Run API Handlers
//!
//! Manual triggers and run inspection.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use hoist_core::domain::log::LogEntry;
use hoist_core::domain::run::{DeployRun, Trigger};
use hoist_core::dto::run::{RunSummary, TriggerDeploy};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::service::run::RunService;

/// POST /deploy
/// Queue a manual run, optionally overriding the branch
pub async fn trigger_deploy(
    State(service): State<Arc<RunService>>,
    Json(req): Json<TriggerDeploy>,
) -> ApiResult<(StatusCode, Json<DeployRun>)> {
    tracing::info!("Manual deploy requested (branch override: {:?})", req.branch);

    let run = service.trigger(Trigger::Manual, &req.overrides()).await?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}

/// GET /run/list
pub async fn list_runs(State(service): State<Arc<RunService>>) -> Json<Vec<RunSummary>> {
    tracing::debug!("Listing runs");
    Json(service.list_runs().await)
}

/// GET /run/{id}
pub async fn get_run(
    State(service): State<Arc<RunService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeployRun>> {
    tracing::debug!("Getting run: {}", id);
    Ok(Json(service.get_run(id).await?))
}

/// GET /run/{id}/logs
pub async fn get_run_logs(
    State(service): State<Arc<RunService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    tracing::debug!("Getting logs for run: {}", id);
    Ok(Json(service.get_run_logs(id).await?))
}
