//! Remote transports
//!
//! A transport is an authenticated channel to the target host that can
//! create directories, copy files and run shell scripts. Transports are
//! opened per stage with that stage's credential through a
//! [`TransportProvider`].

mod local;
mod ssh;

pub use local::{LocalTransport, LocalTransportProvider};
pub use ssh::{SshTransport, SshTransportProvider};

use async_trait::async_trait;
use hoist_core::domain::config::DeployConfig;
use hoist_core::domain::run::StageKind;
use std::path::Path;

use crate::command::CommandOutput;
use crate::credentials::Credential;
use crate::error::Result;

/// Authenticated channel to the target host
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human readable destination, for logs
    fn describe(&self) -> String;

    /// Maps the configured remote directory to the path this transport uses
    fn resolve_dir(&self, remote_dir: &str) -> String {
        remote_dir.to_string()
    }

    /// Host the readiness probe should connect to
    fn probe_host(&self) -> String;

    /// Creates `dir` if missing; a no-op when it already exists
    async fn ensure_dir(&self, dir: &str) -> Result<()>;

    /// Copies `files` from `local_root` into `dir`
    ///
    /// Same-named entries are replaced, so repeated uploads leave identical
    /// contents and no stray nested copies.
    async fn upload(&self, local_root: &Path, files: &[String], dir: &str) -> Result<()>;

    /// Runs a POSIX shell script on the host; a non-zero exit is an error
    async fn exec(&self, script: &str) -> Result<CommandOutput>;
}

/// Opens transports for a stage
pub trait TransportProvider: Send + Sync {
    fn connect(
        &self,
        config: &DeployConfig,
        scope: StageKind,
        credential: Credential,
    ) -> Result<Box<dyn Transport>>;
}

/// Parent directories (relative, `/`-separated) that must exist for `files`
fn parent_dirs(files: &[String]) -> Vec<String> {
    let mut parents: Vec<String> = files
        .iter()
        .filter_map(|f| {
            let trimmed = f.trim_end_matches('/');
            trimmed.rsplit_once('/').map(|(parent, _)| parent.to_string())
        })
        .collect();
    parents.sort();
    parents.dedup();
    parents
}
