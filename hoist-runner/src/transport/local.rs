//! Local transport
//!
//! Treats a directory on this machine as the target host. Remote paths are
//! re-rooted under that directory and scripts run with the local `sh`. Used
//! by `hoist deploy --local` and by tests.

use async_trait::async_trait;
use hoist_core::domain::config::DeployConfig;
use hoist_core::domain::run::StageKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{Transport, TransportProvider};
use crate::command::{CommandOutput, CommandRunner, CommandSpec, run_checked};
use crate::credentials::Credential;
use crate::error::{Result, StageError};

pub struct LocalTransport {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }

    fn resolve_dir(&self, remote_dir: &str) -> String {
        self.root
            .join(remote_dir.trim_start_matches('/'))
            .to_string_lossy()
            .to_string()
    }

    fn probe_host(&self) -> String {
        "127.0.0.1".to_string()
    }

    async fn ensure_dir(&self, dir: &str) -> Result<()> {
        debug!("Ensuring local directory {}", dir);
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StageError::io(dir, e))
    }

    async fn upload(&self, local_root: &Path, files: &[String], dir: &str) -> Result<()> {
        let source_root = local_root.to_path_buf();
        let target_root = PathBuf::from(dir);
        let files = files.to_vec();

        info!("Copying {} entr(ies) to {}", files.len(), dir);

        tokio::task::spawn_blocking(move || {
            for file in &files {
                let trimmed = file.trim_end_matches('/');
                replace_entry(&source_root.join(trimmed), &target_root.join(trimmed))?;
            }
            Ok::<_, StageError>(())
        })
        .await
        .map_err(|e| StageError::io(dir, std::io::Error::other(e)))?
    }

    async fn exec(&self, script: &str) -> Result<CommandOutput> {
        let spec = CommandSpec::new("sh").arg("-s").stdin(script);
        run_checked(self.runner.as_ref(), &spec).await
    }
}

/// Removes whatever sits at `dst`, then copies `src` there
fn replace_entry(src: &Path, dst: &Path) -> Result<()> {
    if let Ok(meta) = std::fs::symlink_metadata(dst) {
        let removed = if meta.is_dir() {
            std::fs::remove_dir_all(dst)
        } else {
            std::fs::remove_file(dst)
        };
        removed.map_err(|e| StageError::io(dst, e))?;
    }
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StageError::io(parent, e))?;
    }

    if !src.is_dir() {
        std::fs::copy(src, dst).map_err(|e| StageError::io(src, e))?;
        return Ok(());
    }

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            StageError::io(path, std::io::Error::other(e))
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| StageError::io(&target, e))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| StageError::io(entry.path(), e))?;
        }
    }
    Ok(())
}

/// Opens [`LocalTransport`]s rooted at a fixed directory
///
/// Credentials are ignored; the local user already has access.
pub struct LocalTransportProvider {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl LocalTransportProvider {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }
}

impl TransportProvider for LocalTransportProvider {
    fn connect(
        &self,
        _config: &DeployConfig,
        _scope: StageKind,
        _credential: Credential,
    ) -> Result<Box<dyn Transport>> {
        Ok(Box::new(LocalTransport::new(
            self.root.clone(),
            Arc::clone(&self.runner),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::TokioCommandRunner;

    fn transport(root: &Path) -> LocalTransport {
        LocalTransport::new(root, Arc::new(TokioCommandRunner::default()))
    }

    fn source_tree() -> tempfile::TempDir {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("app.py"), "print('v1')").unwrap();
        std::fs::create_dir_all(src.path().join("tests/unit")).unwrap();
        std::fs::write(src.path().join("tests/unit/test_app.py"), "").unwrap();
        src
    }

    #[test]
    fn test_resolve_dir_reroots() {
        let t = transport(Path::new("/tmp/target"));
        assert_eq!(t.resolve_dir("/home/ubuntu/app"), "/tmp/target/home/ubuntu/app");
    }

    #[tokio::test]
    async fn test_upload_copies_files_and_dirs() {
        let src = source_tree();
        let target = tempfile::tempdir().unwrap();
        let t = transport(target.path());

        let dir = t.resolve_dir("/srv/app");
        t.ensure_dir(&dir).await.unwrap();
        t.upload(src.path(), &["app.py".into(), "tests".into()], &dir)
            .await
            .unwrap();

        let dir = PathBuf::from(dir);
        assert_eq!(
            std::fs::read_to_string(dir.join("app.py")).unwrap(),
            "print('v1')"
        );
        assert!(dir.join("tests/unit/test_app.py").is_file());
    }

    #[tokio::test]
    async fn test_repeated_upload_replaces_directories() {
        let src = source_tree();
        let target = tempfile::tempdir().unwrap();
        let t = transport(target.path());
        let dir = t.resolve_dir("/srv/app");
        let files = vec!["app.py".to_string(), "tests".to_string()];

        t.upload(src.path(), &files, &dir).await.unwrap();
        std::fs::write(src.path().join("app.py"), "print('v2')").unwrap();
        std::fs::remove_file(src.path().join("tests/unit/test_app.py")).unwrap();
        t.upload(src.path(), &files, &dir).await.unwrap();

        let dir = PathBuf::from(dir);
        assert_eq!(
            std::fs::read_to_string(dir.join("app.py")).unwrap(),
            "print('v2')"
        );
        assert!(!dir.join("tests/tests").exists());
        assert!(!dir.join("tests/unit/test_app.py").exists());
    }

    #[tokio::test]
    async fn test_exec_runs_script() {
        let target = tempfile::tempdir().unwrap();
        let t = transport(target.path());

        let output = t.exec("echo hello").await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");

        assert!(t.exec("exit 4").await.is_err());
    }
}
