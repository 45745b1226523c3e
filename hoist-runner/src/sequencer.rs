//! Deploy sequencer
//!
//! Runs the three stages of a deploy in order: fetch the source, transfer
//! the plan's files, then bootstrap and launch the application. The first
//! failing stage ends the run. Nothing is retried and nothing is rolled
//! back, so a failed transfer can leave a partially updated directory
//! behind.

use chrono::Utc;
use hoist_core::domain::config::DeployConfig;
use hoist_core::domain::plan::DeployPlan;
use hoist_core::domain::run::{RunResult, StageKind, StageOutcome};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::command::{CommandRunner, TokioCommandRunner};
use crate::config::RunnerConfig;
use crate::credentials::{CredentialResolver, DirectoryCredentialResolver, EnvCredentialResolver};
use crate::error::{Result, StageError};
use crate::log_buffer::LogSink;
use crate::readiness::{ProbeTarget, ReadinessProbe, accepts_connections};
use crate::stage::fetch::{FetchedSource, GitFetcher, SourceFetcher};
use crate::stage::launch::{self, ProcessState};
use crate::transport::{LocalTransportProvider, SshTransportProvider, TransportProvider};

/// Outcome of a sequencer run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub result: RunResult,
    /// One entry per stage that was started, in order
    pub stages: Vec<StageOutcome>,
    /// Commit that was deployed, when known
    pub commit: Option<String>,
    /// Process id of the launched application, when known
    pub pid: Option<u32>,
}

impl RunReport {
    fn failed(stage: StageKind, message: String, stages: Vec<StageOutcome>, commit: Option<String>) -> Self {
        Self {
            result: RunResult::failed(stage, message),
            stages,
            commit,
            pid: None,
        }
    }
}

pub struct Sequencer {
    credentials: Arc<dyn CredentialResolver>,
    fetcher: Arc<dyn SourceFetcher>,
    transports: Arc<dyn TransportProvider>,
}

impl Sequencer {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        fetcher: Arc<dyn SourceFetcher>,
        transports: Arc<dyn TransportProvider>,
    ) -> Self {
        Self {
            credentials,
            fetcher,
            transports,
        }
    }

    /// Sequencer that deploys to the configured host over SSH
    pub fn ssh(config: &RunnerConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::new(config.command_timeout));
        Self::new(
            credential_resolver(config),
            Arc::new(GitFetcher::new(Arc::clone(&runner))),
            Arc::new(SshTransportProvider::new(
                runner,
                config.host_key_checking.clone(),
            )),
        )
    }

    /// Sequencer that deploys into a directory on this machine
    pub fn local(config: &RunnerConfig, root: impl Into<PathBuf>) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::new(config.command_timeout));
        Self::new(
            credential_resolver(config),
            Arc::new(GitFetcher::new(Arc::clone(&runner))),
            Arc::new(LocalTransportProvider::new(root, runner)),
        )
    }

    /// Executes fetch, transfer and launch, stopping at the first failure
    pub async fn run(&self, config: &DeployConfig, plan: &DeployPlan, sink: &dyn LogSink) -> RunReport {
        let mut stages = Vec::with_capacity(StageKind::ALL.len());

        info!(
            plan = %plan.name,
            branch = %config.branch,
            destination = %config.destination(),
            "Starting deploy"
        );
        sink.info(
            None,
            format!(
                "Deploying plan '{}' from {} ({}) to {}:{}",
                plan.name,
                config.repo_url,
                config.branch,
                config.destination(),
                config.remote_dir
            ),
        );

        let source = match record(StageKind::Fetch, sink, &mut stages, self.fetch(config, plan, sink)).await {
            Ok(source) => source,
            Err(message) => return RunReport::failed(StageKind::Fetch, message, stages, None),
        };

        if let Err(message) = record(
            StageKind::Transfer,
            sink,
            &mut stages,
            self.transfer(config, plan, &source, sink),
        )
        .await
        {
            return RunReport::failed(StageKind::Transfer, message, stages, source.commit);
        }

        let pid = match record(StageKind::Launch, sink, &mut stages, self.launch(config, plan, sink)).await {
            Ok(pid) => pid,
            Err(message) => {
                return RunReport::failed(StageKind::Launch, message, stages, source.commit);
            }
        };

        sink.info(None, "Deploy succeeded".to_string());
        info!(plan = %plan.name, "Deploy succeeded");

        RunReport {
            result: RunResult::succeeded(),
            stages,
            commit: source.commit,
            pid,
        }
    }

    async fn fetch(&self, config: &DeployConfig, plan: &DeployPlan, sink: &dyn LogSink) -> Result<FetchedSource> {
        let credential = self.credentials.resolve(StageKind::Fetch, &config.credential_id)?;
        let source = self.fetcher.fetch(config, &credential, &plan.files).await?;

        let commit = source.commit.as_deref().unwrap_or("unknown commit");
        sink.info(
            Some(StageKind::Fetch),
            format!("Checked out {} at {}", config.branch, commit),
        );
        Ok(source)
    }

    async fn transfer(
        &self,
        config: &DeployConfig,
        plan: &DeployPlan,
        source: &FetchedSource,
        sink: &dyn LogSink,
    ) -> Result<()> {
        let credential = self.credentials.resolve(StageKind::Transfer, &config.credential_id)?;
        let transport = self.transports.connect(config, StageKind::Transfer, credential)?;
        let dir = transport.resolve_dir(&config.remote_dir);

        transport.ensure_dir(&dir).await?;
        transport.upload(&source.root, &plan.files, &dir).await?;

        sink.info(
            Some(StageKind::Transfer),
            format!("Copied {} entr(ies) to {}", plan.files.len(), transport.describe()),
        );
        Ok(())
    }

    async fn launch(&self, config: &DeployConfig, plan: &DeployPlan, sink: &dyn LogSink) -> Result<Option<u32>> {
        let credential = self.credentials.resolve(StageKind::Launch, &config.credential_id)?;
        let transport = self.transports.connect(config, StageKind::Launch, credential)?;
        let dir = transport.resolve_dir(&config.remote_dir);
        let host = transport.probe_host();
        let port = plan.readiness_port(config.app_port);

        // A port held by a stranger would make the readiness probe pass for
        // an application that failed to bind
        let previous = launch::process_state(transport.as_ref(), plan, &dir).await?;
        if !matches!(previous, ProcessState::Running(_)) && accepts_connections(&host, port).await {
            return Err(StageError::PortInUse {
                target: ProbeTarget::Tcp { host, port }.to_string(),
            });
        }

        let pid = launch::launch(transport.as_ref(), plan, &dir).await?;
        if let Some(pid) = pid {
            sink.info(Some(StageKind::Launch), format!("Started '{}' as pid {pid}", plan.launch.command));
        }

        let probe = ReadinessProbe::for_plan(&plan.readiness, &host, port);
        sink.info(
            Some(StageKind::Launch),
            format!("Waiting for {} to become ready", probe.target()),
        );
        let waited = probe.wait_ready().await?;

        if let Some(pid) = pid {
            let state = launch::process_state(transport.as_ref(), plan, &dir).await?;
            if state != ProcessState::Running(pid) {
                return Err(StageError::ProcessExited {
                    pid,
                    log_file: plan.launch.log_file.clone(),
                });
            }
        }
        sink.info(
            Some(StageKind::Launch),
            format!("Application ready after {:.1}s", waited.as_secs_f64()),
        );

        Ok(pid)
    }
}

fn credential_resolver(config: &RunnerConfig) -> Arc<dyn CredentialResolver> {
    match &config.credentials_dir {
        Some(dir) => Arc::new(DirectoryCredentialResolver::new(dir.clone())),
        None => Arc::new(EnvCredentialResolver::new()),
    }
}

/// Runs one stage, recording its outcome and reporting progress
///
/// On failure the error is rendered to the message stored in the run.
async fn record<T, F>(
    stage: StageKind,
    sink: &dyn LogSink,
    stages: &mut Vec<StageOutcome>,
    work: F,
) -> std::result::Result<T, String>
where
    F: Future<Output = Result<T>>,
{
    info!(%stage, "Stage started");
    sink.info(Some(stage), format!("Stage {stage} started"));

    let started_at = Utc::now();
    let result = work.await;
    let finished_at = Utc::now();

    match result {
        Ok(value) => {
            info!(%stage, "Stage completed");
            sink.info(Some(stage), format!("Stage {stage} completed"));
            stages.push(StageOutcome {
                stage,
                success: true,
                started_at,
                finished_at,
                error: None,
            });
            Ok(value)
        }
        Err(e) => {
            let message = e.to_string();
            error!(%stage, "Stage failed: {}", message);
            sink.error(Some(stage), format!("Stage {stage} failed: {message}"));
            stages.push(StageOutcome {
                stage,
                success: false,
                started_at,
                finished_at,
                error: Some(message.clone()),
            });
            Err(message)
        }
    }
}
