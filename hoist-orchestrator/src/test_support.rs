//! Fixtures shared by the orchestrator's unit tests

use hoist_core::domain::config::DeployConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::repository::log::InMemoryLogRepository;
use crate::repository::run::InMemoryRunRepository;
use crate::service::run::RunService;

pub fn sample_config() -> DeployConfig {
    DeployConfig {
        credential_id: "deploy-key".to_string(),
        remote_host: "10.0.0.5".to_string(),
        remote_user: "ubuntu".to_string(),
        remote_dir: "/home/ubuntu/app".to_string(),
        repo_url: "https://github.com/acme/flask-app.git".to_string(),
        branch: "main".to_string(),
        ssh_port: 22,
        app_port: 5000,
        workspace: PathBuf::from("/tmp/hoist-test-workspace"),
    }
}

/// Service over empty in-memory repositories, tracking `main`
pub fn test_service() -> (Arc<RunService>, mpsc::Receiver<Uuid>) {
    let (tx, rx) = mpsc::channel(8);
    let service = RunService::new(
        Arc::new(InMemoryRunRepository::new()),
        Arc::new(InMemoryLogRepository::new()),
        tx,
        sample_config(),
        "python-app",
    );
    (Arc::new(service), rx)
}
