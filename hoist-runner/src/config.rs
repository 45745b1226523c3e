//! Runner configuration
//!
//! Settings for how stages execute, independent of what is deployed.

use std::path::PathBuf;
use std::time::Duration;

use crate::command::DEFAULT_COMMAND_TIMEOUT;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound for any single external command
    pub command_timeout: Duration,

    /// Directory holding credential key files, see
    /// [`crate::credentials::DirectoryCredentialResolver`]
    pub credentials_dir: Option<PathBuf>,

    /// `StrictHostKeyChecking` value passed to ssh and scp
    pub host_key_checking: String,
}

impl RunnerConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - HOIST_COMMAND_TIMEOUT (optional, seconds, default: 600)
    /// - HOIST_CREDENTIALS_DIR (optional)
    /// - HOIST_HOST_KEY_CHECKING (optional, default: accept-new)
    pub fn from_env() -> anyhow::Result<Self> {
        let command_timeout = match std::env::var("HOIST_COMMAND_TIMEOUT") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| anyhow::anyhow!("HOIST_COMMAND_TIMEOUT must be seconds, got '{raw}'"))?,
            Err(_) => DEFAULT_COMMAND_TIMEOUT,
        };

        let config = Self {
            command_timeout,
            credentials_dir: std::env::var("HOIST_CREDENTIALS_DIR")
                .ok()
                .map(PathBuf::from),
            host_key_checking: std::env::var("HOIST_HOST_KEY_CHECKING")
                .unwrap_or_else(|_| "accept-new".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command_timeout.is_zero() {
            anyhow::bail!("command_timeout must be greater than 0");
        }

        if !matches!(
            self.host_key_checking.as_str(),
            "yes" | "no" | "accept-new"
        ) {
            anyhow::bail!(
                "host_key_checking must be yes, no or accept-new, got '{}'",
                self.host_key_checking
            );
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            credentials_dir: None,
            host_key_checking: "accept-new".to_string(),
        }
    }
}
