//! Source fetch stage
//!
//! Clones the configured branch into the local workspace, or updates an
//! existing clone of the same remote in place, then checks that every file
//! the plan transfers is present.

use async_trait::async_trait;
use hoist_core::domain::config::DeployConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec, run_checked};
use crate::credentials::Credential;
use crate::error::{Result, StageError};

/// Working copy produced by a successful fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSource {
    pub root: PathBuf,
    /// Commit checked out, when it could be determined
    pub commit: Option<String>,
}

/// Retrieves a source tree for a run
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(
        &self,
        config: &DeployConfig,
        credential: &Credential,
        files: &[String],
    ) -> Result<FetchedSource>;
}

/// Git-backed fetcher
pub struct GitFetcher {
    runner: Arc<dyn CommandRunner>,
}

impl GitFetcher {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn git(&self, credential: &Credential) -> CommandSpec {
        let spec = CommandSpec::new("git").env("GIT_TERMINAL_PROMPT", "0");
        match credential {
            Credential::SshKey { path } => spec.env(
                "GIT_SSH_COMMAND",
                format!(
                    "ssh -i '{}' -o IdentitiesOnly=yes -o BatchMode=yes",
                    path.display()
                ),
            ),
            Credential::Agent => spec.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes"),
            Credential::None => spec,
        }
    }

    /// True when `workspace` already holds a clone of `repo_url`
    async fn is_clone_of(&self, workspace: &Path, repo_url: &str) -> bool {
        if !workspace.join(".git").exists() {
            return false;
        }
        let spec = CommandSpec::new("git")
            .arg("-C")
            .arg(workspace.to_string_lossy())
            .args(["remote", "get-url", "origin"]);
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => output.stdout.trim() == repo_url,
            _ => false,
        }
    }

    async fn clone(&self, config: &DeployConfig, credential: &Credential) -> Result<()> {
        let workspace = &config.workspace;

        if workspace.exists() {
            debug!("Removing stale workspace {}", workspace.display());
            tokio::fs::remove_dir_all(workspace)
                .await
                .map_err(|e| StageError::io(workspace, e))?;
        }
        if let Some(parent) = workspace.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::io(parent, e))?;
        }

        info!(repo = %config.repo_url, branch = %config.branch, "Cloning repository");

        let spec = self
            .git(credential)
            .args([
                "clone",
                "--branch",
                config.branch.as_str(),
                "--single-branch",
                "--",
            ])
            .arg(&config.repo_url)
            .arg(workspace.to_string_lossy());
        run_checked(self.runner.as_ref(), &spec).await?;
        Ok(())
    }

    async fn update(&self, config: &DeployConfig, credential: &Credential) -> Result<()> {
        let ws = config.workspace.to_string_lossy().to_string();

        info!(repo = %config.repo_url, branch = %config.branch, "Updating existing clone");

        let branch = config.branch.as_str();
        let steps: [Vec<&str>; 4] = [
            vec!["fetch", "origin", "--", branch],
            vec!["checkout", "-B", branch, "FETCH_HEAD"],
            vec!["reset", "--hard", "FETCH_HEAD"],
            vec!["clean", "-fdx"],
        ];

        for step in steps {
            let spec = self.git(credential).args(["-C", ws.as_str()]).args(step);
            run_checked(self.runner.as_ref(), &spec).await?;
        }
        Ok(())
    }

    async fn head_commit(&self, workspace: &Path) -> Option<String> {
        let spec = CommandSpec::new("git")
            .arg("-C")
            .arg(workspace.to_string_lossy())
            .args(["rev-parse", "HEAD"]);
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => Some(output.stdout.trim().to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(
        &self,
        config: &DeployConfig,
        credential: &Credential,
        files: &[String],
    ) -> Result<FetchedSource> {
        if self.is_clone_of(&config.workspace, &config.repo_url).await {
            self.update(config, credential).await?;
        } else {
            self.clone(config, credential).await?;
        }

        verify_artifacts(&config.workspace, files)?;

        let commit = self.head_commit(&config.workspace).await;
        if let Some(sha) = &commit {
            info!(commit = %sha, "Source fetched");
        }

        Ok(FetchedSource {
            root: config.workspace.clone(),
            commit,
        })
    }
}

/// Every plan entry must exist before anything is copied
pub fn verify_artifacts(root: &Path, files: &[String]) -> Result<()> {
    for file in files {
        if !root.join(file).exists() {
            return Err(StageError::MissingArtifact(file.clone()));
        }
    }
    Ok(())
}
