//! Run Worker
//!
//! Single task that executes queued runs in arrival order. Only one run
//! touches the target host at a time.

use async_trait::async_trait;
use hoist_core::domain::config::DeployConfig;
use hoist_core::domain::plan::DeployPlan;
use hoist_core::domain::run::{DeployRun, RunStatus};
use hoist_runner::{LogSink, RunReport, Sequencer};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::repository::log::LogRepository;
use crate::repository::run::RunRepository;

/// Executes one deploy
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, config: &DeployConfig, plan: &DeployPlan, sink: &dyn LogSink) -> RunReport;
}

#[async_trait]
impl Deployer for Sequencer {
    async fn deploy(&self, config: &DeployConfig, plan: &DeployPlan, sink: &dyn LogSink) -> RunReport {
        self.run(config, plan, sink).await
    }
}

pub struct RunWorker {
    runs: Arc<dyn RunRepository>,
    logs: Arc<dyn LogRepository>,
    deployer: Arc<dyn Deployer>,
    plan: Arc<DeployPlan>,
    queue: mpsc::Receiver<Uuid>,
}

impl RunWorker {
    pub fn new(
        runs: Arc<dyn RunRepository>,
        logs: Arc<dyn LogRepository>,
        deployer: Arc<dyn Deployer>,
        plan: Arc<DeployPlan>,
        queue: mpsc::Receiver<Uuid>,
    ) -> Self {
        Self {
            runs,
            logs,
            deployer,
            plan,
            queue,
        }
    }

    /// Processes runs until every sender is dropped
    pub async fn run(mut self) {
        tracing::info!("Run worker started");
        while let Some(id) = self.queue.recv().await {
            self.execute(id).await;
        }
        tracing::info!("Run queue closed, worker stopping");
    }

    async fn execute(&self, id: Uuid) {
        let Some(mut run) = self.runs.find_by_id(id).await else {
            tracing::warn!("Queued run {} no longer exists", id);
            return;
        };

        run.status = RunStatus::Running;
        run.started_at = Some(chrono::Utc::now());
        self.save(&run).await;

        let sink = self.logs.buffer(id).await;
        tracing::info!("Executing run {}", id);

        let report = self.deployer.deploy(&run.config, &self.plan, &sink).await;
        finish(&mut run, report);
        self.save(&run).await;

        match run.status {
            RunStatus::Succeeded => tracing::info!("Run {} succeeded", id),
            _ => tracing::warn!(
                "Run {} failed: {}",
                id,
                run.result
                    .as_ref()
                    .and_then(|r| r.error_message.as_deref())
                    .unwrap_or("unknown error")
            ),
        }
    }

    async fn save(&self, run: &DeployRun) {
        if let Err(e) = self.runs.update(run.clone()).await {
            tracing::error!("Failed to store run {}: {}", run.id, e);
        }
    }
}

/// Copies a sequencer report into the run record
fn finish(run: &mut DeployRun, report: RunReport) {
    run.status = if report.result.success {
        RunStatus::Succeeded
    } else {
        RunStatus::Failed
    };
    run.completed_at = Some(chrono::Utc::now());
    run.stages = report.stages;
    run.result = Some(report.result);
}
