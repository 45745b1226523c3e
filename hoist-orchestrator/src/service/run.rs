//! Run Service
//!
//! Accepts deploy triggers, freezes their configuration and queues them for
//! the worker.

use hoist_core::domain::config::{ConfigOverrides, DeployConfig};
use hoist_core::domain::log::LogEntry;
use hoist_core::domain::run::{DeployRun, Trigger};
use hoist_core::dto::run::RunSummary;
use hoist_core::dto::webhook::{PushEvent, WebhookAck};
use hoist_runner::LogSink;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::repository::log::LogRepository;
use crate::repository::run::RunRepository;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("run {0} not found")]
    NotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    /// Too many runs are already waiting for the worker
    #[error("run queue is full, try again later")]
    QueueFull,

    /// The worker has stopped and no longer accepts runs
    #[error("run queue is closed")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, RunError>;

pub struct RunService {
    runs: Arc<dyn RunRepository>,
    logs: Arc<dyn LogRepository>,
    queue: mpsc::Sender<Uuid>,
    base_config: DeployConfig,
    plan_name: String,
}

impl RunService {
    pub fn new(
        runs: Arc<dyn RunRepository>,
        logs: Arc<dyn LogRepository>,
        queue: mpsc::Sender<Uuid>,
        base_config: DeployConfig,
        plan_name: impl Into<String>,
    ) -> Self {
        Self {
            runs,
            logs,
            queue,
            base_config,
            plan_name: plan_name.into(),
        }
    }

    /// Branch that webhook pushes must target to start a run
    pub fn tracked_branch(&self) -> &str {
        &self.base_config.branch
    }

    /// Records a new run and hands it to the worker
    ///
    /// Rejects the trigger instead of waiting when the queue is full. A run
    /// the worker never received is removed again.
    pub async fn trigger(&self, trigger: Trigger, overrides: &ConfigOverrides) -> Result<DeployRun> {
        let config = self.base_config.clone().with_overrides(overrides);
        config
            .validate()
            .map_err(|e| RunError::Validation(e.to_string()))?;

        let run = DeployRun::queued(trigger, config, self.plan_name.clone());
        let id = run.id;

        self.runs.insert(run.clone()).await;
        self.logs.buffer(id).await.info(
            None,
            format!("Run queued ({:?} trigger, branch {})", trigger, run.config.branch),
        );

        if let Err(e) = self.queue.try_send(id) {
            self.runs.delete(id).await;
            self.logs.delete(id).await;
            return Err(match e {
                TrySendError::Full(_) => {
                    tracing::warn!("Run queue full, rejecting {:?} trigger", trigger);
                    RunError::QueueFull
                }
                TrySendError::Closed(_) => RunError::QueueClosed,
            });
        }

        tracing::info!("Run {} queued for branch {}", id, run.config.branch);
        Ok(run)
    }

    /// Starts a webhook run when the push targets the tracked branch
    pub async fn handle_push(&self, event: &PushEvent) -> Result<WebhookAck> {
        let Some(branch) = event.branch() else {
            return Ok(ignored(format!("{} is not a branch", event.git_ref)));
        };
        if branch != self.tracked_branch() {
            tracing::debug!("Ignoring push to {}", branch);
            return Ok(ignored(format!(
                "push to {branch}, tracking {}",
                self.tracked_branch()
            )));
        }

        let run = self
            .trigger(Trigger::Webhook, &ConfigOverrides::default())
            .await?;
        if let Some(commit) = &event.after {
            self.logs
                .buffer(run.id)
                .await
                .info(None, format!("Triggered by push of {commit}"));
        }

        Ok(WebhookAck {
            run_id: Some(run.id),
            ignored: false,
            reason: None,
        })
    }

    pub async fn get_run(&self, id: Uuid) -> Result<DeployRun> {
        self.runs.find_by_id(id).await.ok_or(RunError::NotFound(id))
    }

    pub async fn list_runs(&self) -> Vec<RunSummary> {
        self.runs.list().await.iter().map(RunSummary::from).collect()
    }

    pub async fn get_run_logs(&self, id: Uuid) -> Result<Vec<LogEntry>> {
        self.get_run(id).await?;
        Ok(self.logs.find_by_run(id).await)
    }
}

fn ignored(reason: String) -> WebhookAck {
    WebhookAck {
        run_id: None,
        ignored: true,
        reason: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::log::InMemoryLogRepository;
    use crate::repository::run::InMemoryRunRepository;
    use crate::test_support::sample_config;
    use hoist_core::domain::run::RunStatus;

    fn service() -> (RunService, mpsc::Receiver<Uuid>) {
        service_with_capacity(8)
    }

    fn service_with_capacity(capacity: usize) -> (RunService, mpsc::Receiver<Uuid>) {
        let (tx, rx) = mpsc::channel(capacity);
        let service = RunService::new(
            Arc::new(InMemoryRunRepository::new()),
            Arc::new(InMemoryLogRepository::new()),
            tx,
            sample_config(),
            "python-app",
        );
        (service, rx)
    }

    fn push(git_ref: &str) -> PushEvent {
        PushEvent {
            git_ref: git_ref.to_string(),
            after: Some("0123abc".to_string()),
        }
    }

    #[tokio::test]
    async fn test_trigger_queues_run() {
        let (service, mut rx) = service();

        let run = service
            .trigger(Trigger::Manual, &ConfigOverrides::default())
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.plan_name, "python-app");
        assert_eq!(rx.recv().await, Some(run.id));
        assert_eq!(service.get_run(run.id).await.unwrap().id, run.id);
        assert_eq!(service.get_run_logs(run.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_applies_branch_override() {
        let (service, _rx) = service();
        let overrides = ConfigOverrides {
            branch: Some("release".to_string()),
        };

        let run = service.trigger(Trigger::Manual, &overrides).await.unwrap();
        assert_eq!(run.config.branch, "release");
    }

    #[tokio::test]
    async fn test_trigger_rejects_invalid_override() {
        let (service, _rx) = service();
        let overrides = ConfigOverrides {
            branch: Some("--upload-pack=evil".to_string()),
        };

        let err = service.trigger(Trigger::Manual, &overrides).await.unwrap_err();
        assert!(matches!(err, RunError::Validation(_)));
        assert!(service.list_runs().await.is_empty());
    }

    #[tokio::test]
    async fn test_push_to_tracked_branch() {
        let (service, mut rx) = service();

        let ack = service.handle_push(&push("refs/heads/main")).await.unwrap();

        assert!(!ack.ignored);
        let id = ack.run_id.unwrap();
        assert_eq!(rx.recv().await, Some(id));
        assert_eq!(service.get_run(id).await.unwrap().trigger, Trigger::Webhook);
        let logs = service.get_run_logs(id).await.unwrap();
        assert!(logs.iter().any(|e| e.message.contains("0123abc")));
    }

    #[tokio::test]
    async fn test_push_to_other_branch_is_ignored() {
        let (service, mut rx) = service();

        let ack = service.handle_push(&push("refs/heads/feature")).await.unwrap();
        assert!(ack.ignored);
        assert!(ack.run_id.is_none());

        let tag = service.handle_push(&push("refs/tags/v1.0")).await.unwrap();
        assert!(tag.ignored);

        assert!(rx.try_recv().is_err());
        assert!(service.list_runs().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let (service, _rx) = service();
        let id = Uuid::new_v4();
        assert!(matches!(service.get_run(id).await, Err(RunError::NotFound(_))));
        assert!(matches!(
            service.get_run_logs(id).await,
            Err(RunError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (service, rx) = service();
        drop(rx);

        let err = service
            .trigger(Trigger::Manual, &ConfigOverrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::QueueClosed));
        assert!(service.list_runs().await.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_waiting() {
        let (service, mut rx) = service_with_capacity(1);
        let first = service
            .trigger(Trigger::Manual, &ConfigOverrides::default())
            .await
            .unwrap();

        let second = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            service.trigger(Trigger::Manual, &ConfigOverrides::default()),
        )
        .await
        .expect("trigger waited on a full queue");
        assert!(matches!(second, Err(RunError::QueueFull)));

        let listed: Vec<Uuid> = service.list_runs().await.iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![first.id]);
        assert_eq!(rx.recv().await, Some(first.id));
    }
}
