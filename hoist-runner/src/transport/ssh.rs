//! SSH transport
//!
//! Uses the system `ssh` and `scp` binaries in batch mode, so a missing or
//! rejected credential fails immediately instead of prompting.

use async_trait::async_trait;
use hoist_core::domain::config::DeployConfig;
use hoist_core::domain::run::StageKind;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Transport, TransportProvider, parent_dirs};
use crate::command::{CommandOutput, CommandRunner, CommandSpec, run_checked, shell_quote};
use crate::credentials::Credential;
use crate::error::Result;

/// Seconds ssh waits for the TCP connection before giving up
const CONNECT_TIMEOUT_SECS: u32 = 15;

pub struct SshTransport {
    runner: Arc<dyn CommandRunner>,
    host: String,
    user: String,
    port: u16,
    credential: Credential,
    host_key_checking: String,
}

impl SshTransport {
    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Options shared by ssh and scp
    fn options(&self) -> Vec<String> {
        let mut opts = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("StrictHostKeyChecking={}", self.host_key_checking),
            "-o".to_string(),
            format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"),
        ];
        if let Credential::SshKey { path } = &self.credential {
            opts.push("-i".to_string());
            opts.push(path.to_string_lossy().to_string());
            opts.push("-o".to_string());
            opts.push("IdentitiesOnly=yes".to_string());
        }
        opts
    }

    fn ssh_script(&self, script: &str) -> CommandSpec {
        CommandSpec::new("ssh")
            .args(self.options())
            .args(["-p".to_string(), self.port.to_string()])
            .arg(self.destination())
            .args(["sh", "-s"])
            .stdin(script)
    }

    fn scp(&self, sources: Vec<String>, target: &str) -> CommandSpec {
        CommandSpec::new("scp")
            .args(self.options())
            .args(["-P".to_string(), self.port.to_string(), "-r".to_string()])
            .args(sources)
            .arg(format!("{}:{}/", self.destination(), target))
    }
}

#[async_trait]
impl Transport for SshTransport {
    fn describe(&self) -> String {
        format!("ssh://{}:{}", self.destination(), self.port)
    }

    fn probe_host(&self) -> String {
        self.host.clone()
    }

    async fn ensure_dir(&self, dir: &str) -> Result<()> {
        debug!("Ensuring remote directory {}", dir);
        self.exec(&format!("mkdir -p {}\n", shell_quote(dir)))
            .await
            .map(|_| ())
    }

    async fn upload(&self, local_root: &Path, files: &[String], dir: &str) -> Result<()> {
        let dir = dir.trim_end_matches('/');

        // Replace rather than merge: drop old entries, then recreate parents
        let mut prepare = String::from("set -e\n");
        for file in files {
            let target = format!("{dir}/{}", file.trim_end_matches('/'));
            prepare.push_str(&format!("rm -rf {}\n", shell_quote(&target)));
        }
        for parent in parent_dirs(files) {
            prepare.push_str(&format!(
                "mkdir -p {}\n",
                shell_quote(&format!("{dir}/{parent}"))
            ));
        }
        self.exec(&prepare).await?;

        // One scp per destination directory
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in files {
            let trimmed = file.trim_end_matches('/');
            let target = match trimmed.rsplit_once('/') {
                Some((parent, _)) => format!("{dir}/{parent}"),
                None => dir.to_string(),
            };
            groups
                .entry(target)
                .or_default()
                .push(local_root.join(trimmed).to_string_lossy().to_string());
        }

        for (target, sources) in groups {
            info!("Copying {} entr(ies) to {}:{}", sources.len(), self.host, target);
            run_checked(self.runner.as_ref(), &self.scp(sources, &target)).await?;
        }

        Ok(())
    }

    async fn exec(&self, script: &str) -> Result<CommandOutput> {
        run_checked(self.runner.as_ref(), &self.ssh_script(script)).await
    }
}

/// Opens [`SshTransport`]s; refuses stages without a usable credential
pub struct SshTransportProvider {
    runner: Arc<dyn CommandRunner>,
    host_key_checking: String,
}

impl SshTransportProvider {
    pub fn new(runner: Arc<dyn CommandRunner>, host_key_checking: impl Into<String>) -> Self {
        Self {
            runner,
            host_key_checking: host_key_checking.into(),
        }
    }
}

impl TransportProvider for SshTransportProvider {
    fn connect(
        &self,
        config: &DeployConfig,
        scope: StageKind,
        credential: Credential,
    ) -> Result<Box<dyn Transport>> {
        credential.require_remote(scope, &config.credential_id)?;

        Ok(Box::new(SshTransport {
            runner: Arc::clone(&self.runner),
            host: config.remote_host.clone(),
            user: config.remote_user.clone(),
            port: config.ssh_port,
            credential,
            host_key_checking: self.host_key_checking.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::testing::{FakeRunner, sample_config};
    use std::path::PathBuf;

    fn provider(runner: Arc<FakeRunner>) -> SshTransportProvider {
        SshTransportProvider::new(runner, "accept-new")
    }

    fn key() -> Credential {
        Credential::SshKey {
            path: PathBuf::from("/keys/deploy"),
        }
    }

    #[test]
    fn test_connect_requires_credential() {
        let runner = Arc::new(FakeRunner::succeeding());
        let result = provider(runner).connect(&sample_config(), StageKind::Transfer, Credential::None);
        assert!(matches!(result, Err(StageError::Credential(_))));
    }

    #[tokio::test]
    async fn test_ensure_dir_runs_mkdir_over_ssh() {
        let runner = Arc::new(FakeRunner::succeeding());
        let mut config = sample_config();
        config.ssh_port = 2222;

        let transport = provider(runner.clone())
            .connect(&config, StageKind::Transfer, key())
            .unwrap();
        transport.ensure_dir("/home/ubuntu/app").await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.program, "ssh");
        assert!(call.args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(call.args.windows(2).any(|w| w == ["-i", "/keys/deploy"]));
        assert!(call.args.contains(&"BatchMode=yes".to_string()));
        assert!(call.args.contains(&"ubuntu@10.0.0.5".to_string()));
        assert_eq!(
            String::from_utf8(call.stdin.clone().unwrap()).unwrap(),
            "mkdir -p '/home/ubuntu/app'\n"
        );
    }

    #[tokio::test]
    async fn test_upload_replaces_then_copies() {
        let runner = Arc::new(FakeRunner::succeeding());
        let transport = provider(runner.clone())
            .connect(&sample_config(), StageKind::Transfer, Credential::Agent)
            .unwrap();

        let files = vec![
            "app.py".to_string(),
            "tests".to_string(),
            "config/settings.py".to_string(),
        ];
        transport
            .upload(Path::new("/ws"), &files, "/srv/app/")
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);

        let prepare = String::from_utf8(calls[0].stdin.clone().unwrap()).unwrap();
        assert!(prepare.contains("rm -rf '/srv/app/app.py'"));
        assert!(prepare.contains("rm -rf '/srv/app/tests'"));
        assert!(prepare.contains("mkdir -p '/srv/app/config'"));

        let scp_root = &calls[1];
        assert_eq!(scp_root.program, "scp");
        assert!(scp_root.args.windows(2).any(|w| w == ["-P", "22"]));
        assert!(scp_root.args.contains(&"-r".to_string()));
        assert!(scp_root.args.contains(&"/ws/app.py".to_string()));
        assert!(scp_root.args.contains(&"/ws/tests".to_string()));
        assert_eq!(scp_root.args.last().unwrap(), "ubuntu@10.0.0.5:/srv/app/");

        let scp_nested = &calls[2];
        assert!(scp_nested.args.contains(&"/ws/config/settings.py".to_string()));
        assert_eq!(
            scp_nested.args.last().unwrap(),
            "ubuntu@10.0.0.5:/srv/app/config/"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        let runner = Arc::new(FakeRunner::failing(
            255,
            "ssh: connect to host 10.0.0.5 port 22: Connection refused",
        ));
        let transport = provider(runner)
            .connect(&sample_config(), StageKind::Transfer, key())
            .unwrap();

        let err = transport.ensure_dir("/srv/app").await.unwrap_err();
        match err {
            StageError::CommandFailed { program, code, .. } => {
                assert_eq!(program, "ssh");
                assert_eq!(code, Some(255));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
