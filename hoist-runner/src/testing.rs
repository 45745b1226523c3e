//! Test doubles shared by the runner's unit tests

use async_trait::async_trait;
use hoist_core::domain::config::DeployConfig;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::Result;

type Responder = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

/// Records every command and answers with a canned output
pub struct FakeRunner {
    respond: Responder,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command exits 0 with no output
    pub fn succeeding() -> Self {
        Self::new(|_| CommandOutput {
            code: Some(0),
            ..Default::default()
        })
    }

    /// Every command exits with `code` and writes `stderr`
    pub fn failing(code: i32, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        Self::new(move |_| CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.clone(),
        })
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok((self.respond)(spec))
    }
}

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
