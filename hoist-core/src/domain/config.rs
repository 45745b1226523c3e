//! Deploy configuration
//!
//! The named parameters a deploy run is started with. They are resolved once
//! (environment, CLI flags, trigger overrides) and then held immutable for the
//! whole run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default remote-shell port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default port the deployed application listens on
pub const DEFAULT_APP_PORT: u16 = 5000;

/// Environment variable prefix for every deploy parameter
pub const ENV_PREFIX: &str = "HOIST_";

/// Errors raised while loading or validating a [`DeployConfig`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Pipeline configuration for a single deploy run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Identifier handed to the credential resolver for every stage
    pub credential_id: String,
    /// Target host name or address
    pub remote_host: String,
    /// Login user on the target host
    pub remote_user: String,
    /// Absolute application directory on the target host
    pub remote_dir: String,
    /// Source repository URL
    pub repo_url: String,
    /// Branch to deploy
    pub branch: String,
    /// Remote-shell port on the target host
    pub ssh_port: u16,
    /// Port the deployed application listens on
    pub app_port: u16,
    /// Local working copy location for the fetch stage
    pub workspace: PathBuf,
}

/// Per-trigger overrides applied before a run is frozen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub branch: Option<String>,
}

impl DeployConfig {
    /// Loads configuration from `HOIST_*` environment variables
    ///
    /// Required:
    /// - HOIST_CREDENTIAL_ID
    /// - HOIST_REMOTE_HOST
    /// - HOIST_REMOTE_USER
    /// - HOIST_REMOTE_DIR
    /// - HOIST_REPO_URL
    ///
    /// Optional:
    /// - HOIST_BRANCH (default: main)
    /// - HOIST_SSH_PORT (default: 22)
    /// - HOIST_APP_PORT (default: 5000)
    /// - HOIST_WORKSPACE (default: `<tmp>/hoist-workspace`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup
    ///
    /// Keys are passed with the `HOIST_` prefix already applied.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let required = |name: &str| {
            get(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::Missing(format!("{ENV_PREFIX}{name}")))
        };

        let ssh_port = match get("SSH_PORT") {
            Some(raw) => parse_port("HOIST_SSH_PORT", &raw)?,
            None => DEFAULT_SSH_PORT,
        };
        let app_port = match get("APP_PORT") {
            Some(raw) => parse_port("HOIST_APP_PORT", &raw)?,
            None => DEFAULT_APP_PORT,
        };

        Ok(Self {
            credential_id: required("CREDENTIAL_ID")?,
            remote_host: required("REMOTE_HOST")?,
            remote_user: required("REMOTE_USER")?,
            remote_dir: required("REMOTE_DIR")?,
            repo_url: required("REPO_URL")?,
            branch: get("BRANCH").unwrap_or_else(|| "main".to_string()),
            ssh_port,
            app_port,
            workspace: get("WORKSPACE")
                .map(PathBuf::from)
                .unwrap_or_else(default_workspace),
        })
    }

    /// Applies trigger overrides, returning the frozen configuration
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(branch) = overrides.branch.as_ref().filter(|b| !b.trim().is_empty()) {
            self.branch = branch.trim().to_string();
        }
        self
    }

    /// `user@host` destination used by the remote transport
    pub fn destination(&self) -> String {
        format!("{}@{}", self.remote_user, self.remote_host)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("credential_id", &self.credential_id),
            ("remote_host", &self.remote_host),
            ("remote_user", &self.remote_user),
            ("remote_dir", &self.remote_dir),
            ("repo_url", &self.repo_url),
            ("branch", &self.branch),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(key, "cannot be empty"));
            }
            if value.contains(['\'', '\n', '\0']) {
                return Err(ConfigError::invalid(
                    key,
                    "must not contain quotes, newlines or NUL",
                ));
            }
        }

        if !self.remote_dir.starts_with('/') {
            return Err(ConfigError::invalid(
                "remote_dir",
                "must be an absolute path",
            ));
        }

        if self.remote_dir.trim_end_matches('/').is_empty() {
            return Err(ConfigError::invalid(
                "remote_dir",
                "refusing to deploy into /",
            ));
        }

        if self.branch.starts_with('-') {
            return Err(ConfigError::invalid("branch", "must not start with '-'"));
        }

        if self.remote_host.starts_with('-') || self.remote_user.starts_with('-') {
            return Err(ConfigError::invalid(
                "remote_host",
                "host and user must not start with '-'",
            ));
        }

        if self.ssh_port == 0 {
            return Err(ConfigError::invalid("ssh_port", "must be greater than 0"));
        }

        if self.app_port == 0 {
            return Err(ConfigError::invalid("app_port", "must be greater than 0"));
        }

        Ok(())
    }
}

fn parse_port(key: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::invalid(key, format!("'{raw}' is not a port number")))
}

fn default_workspace() -> PathBuf {
    std::env::temp_dir().join("hoist-workspace")
}
