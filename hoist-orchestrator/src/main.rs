//! Hoist Orchestrator
//!
//! HTTP control plane for deploys. Receives GitHub push webhooks and manual
//! triggers, queues a run for each and executes the runs one at a time on a
//! background worker.

use anyhow::{Context, Result};
use hoist_core::domain::config::DeployConfig;
use hoist_runner::{RunnerConfig, Sequencer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod repository;
pub mod service;

#[cfg(test)]
mod test_support;

use crate::config::OrchestratorConfig;
use crate::repository::log::InMemoryLogRepository;
use crate::repository::run::InMemoryRunRepository;
use crate::service::run::RunService;
use crate::service::worker::RunWorker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hoist_orchestrator=info,hoist_runner=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Hoist Orchestrator...");

    let config = OrchestratorConfig::from_env().context("Invalid orchestrator configuration")?;
    let deploy = DeployConfig::from_env().context("Invalid deploy configuration")?;
    deploy.validate().context("Invalid deploy configuration")?;
    let runner = RunnerConfig::from_env().context("Invalid runner configuration")?;

    let plan = match &config.plan_path {
        Some(path) => {
            tracing::info!("Loading plan from {}", path.display());
            hoist_plan::load_plan(path)
                .with_context(|| format!("Failed to load plan {}", path.display()))?
        }
        None => {
            tracing::info!("Using built-in plan");
            hoist_plan::default_plan()
        }
    };

    tracing::info!(
        "Deploying plan '{}' from {} ({}) to {}:{}",
        plan.name,
        deploy.repo_url,
        deploy.branch,
        deploy.destination(),
        deploy.remote_dir
    );

    let runs = Arc::new(InMemoryRunRepository::new());
    let logs = Arc::new(InMemoryLogRepository::new());
    let (tx, rx) = mpsc::channel(config.queue_capacity);

    let worker = RunWorker::new(
        runs.clone(),
        logs.clone(),
        Arc::new(Sequencer::ssh(&runner)),
        Arc::new(plan.clone()),
        rx,
    );
    tokio::spawn(worker.run());

    let service = Arc::new(RunService::new(runs, logs, tx, deploy, plan.name));
    let app = api::create_router(service);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
