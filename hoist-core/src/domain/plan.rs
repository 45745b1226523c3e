//! Deploy plan domain types
//!
//! A plan is the versioned description of what a deploy moves and runs:
//! the files copied to the remote directory, the ordered bootstrap commands,
//! how the application is launched and how its readiness is checked.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path};
use std::time::Duration;
use thiserror::Error;

/// The only plan format version currently understood
pub const PLAN_VERSION: u32 = 1;

/// Deploy plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployPlan {
    pub version: u32,
    pub name: String,
    /// Paths relative to the working copy root, files or directories
    pub files: Vec<String>,
    /// Remote commands run in order inside the remote directory
    pub bootstrap: Vec<String>,
    pub launch: LaunchSpec,
    pub readiness: ReadinessSpec,
    #[serde(default)]
    pub on_running: ExistingProcessPolicy,
}

/// How the application process is started on the remote host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Entry point command, run detached
    pub command: String,
    /// Log file (relative to the remote dir) receiving stdout and stderr
    pub log_file: String,
    /// File (relative to the remote dir) recording the launched pid
    pub pid_file: String,
}

/// Readiness check performed after launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessSpec {
    /// Port to probe, falls back to the configured application port
    #[serde(default)]
    pub port: Option<u16>,
    /// HTTP path to GET; `None` probes with a plain TCP connect
    #[serde(default)]
    pub path: Option<String>,
    pub timeout_secs: u64,
    pub interval_ms: u64,
}

impl ReadinessSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ReadinessSpec {
    fn default() -> Self {
        Self {
            port: None,
            path: Some("/".to_string()),
            timeout_secs: 60,
            interval_ms: 500,
        }
    }
}

/// What to do when a previously launched process is still alive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingProcessPolicy {
    /// Kill the recorded process, then launch
    #[default]
    Restart,
    /// Abort the launch stage
    Fail,
}

impl std::str::FromStr for ExistingProcessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart" => Ok(Self::Restart),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "unknown policy '{other}' (expected 'restart' or 'fail')"
            )),
        }
    }
}

impl std::fmt::Display for ExistingProcessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restart => write!(f, "restart"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Structural problems in a plan
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanValidationError {
    #[error("unsupported plan version {0} (expected {PLAN_VERSION})")]
    UnsupportedVersion(u32),

    #[error("plan must list at least one file")]
    NoFiles,

    #[error("invalid file entry '{0}': paths must be relative and stay inside the working copy")]
    InvalidPath(String),

    #[error("file '{0}' is listed more than once")]
    DuplicateFile(String),

    #[error("launch command cannot be empty")]
    EmptyLaunchCommand,

    #[error("invalid {field} '{value}': must be a plain relative file name")]
    InvalidLaunchFile { field: &'static str, value: String },

    #[error("readiness timeout and interval must be greater than 0")]
    InvalidReadiness,
}

impl DeployPlan {
    /// Checks the plan invariants
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        if self.version != PLAN_VERSION {
            return Err(PlanValidationError::UnsupportedVersion(self.version));
        }

        if self.files.is_empty() {
            return Err(PlanValidationError::NoFiles);
        }

        let mut seen = HashSet::new();
        for file in &self.files {
            if !is_contained_relative(file) || file.contains('\'') {
                return Err(PlanValidationError::InvalidPath(file.clone()));
            }
            let normalized = file.trim_end_matches('/');
            if !seen.insert(normalized) {
                return Err(PlanValidationError::DuplicateFile(file.clone()));
            }
        }

        if self.launch.command.trim().is_empty() {
            return Err(PlanValidationError::EmptyLaunchCommand);
        }

        for (field, value) in [
            ("log_file", &self.launch.log_file),
            ("pid_file", &self.launch.pid_file),
        ] {
            if !is_contained_relative(value) || value.contains(['\'', ' ']) {
                return Err(PlanValidationError::InvalidLaunchFile {
                    field,
                    value: value.clone(),
                });
            }
        }

        if self.readiness.timeout_secs == 0 || self.readiness.interval_ms == 0 {
            return Err(PlanValidationError::InvalidReadiness);
        }

        Ok(())
    }

    /// Port probed by the readiness check
    pub fn readiness_port(&self, app_port: u16) -> u16 {
        self.readiness.port.unwrap_or(app_port)
    }
}

/// True when `path` is non-empty, relative and has no `..` components
fn is_contained_relative(path: &str) -> bool {
    if path.trim().is_empty() || path.contains(['\n', '\0']) {
        return false;
    }
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> DeployPlan {
        DeployPlan {
            version: PLAN_VERSION,
            name: "flask".to_string(),
            files: vec!["app.py".to_string(), "tests".to_string()],
            bootstrap: vec!["python3 -m venv venv".to_string()],
            launch: LaunchSpec {
                command: "python3 app.py".to_string(),
                log_file: "app.log".to_string(),
                pid_file: "app.pid".to_string(),
            },
            readiness: ReadinessSpec::default(),
            on_running: ExistingProcessPolicy::Restart,
        }
    }

    #[test]
    fn test_valid_plan() {
        assert!(plan().validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut p = plan();
        p.version = 2;
        assert_eq!(
            p.validate(),
            Err(PlanValidationError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn test_rejects_escaping_paths() {
        for bad in ["/etc/passwd", "../secrets", "src/../../x", ""] {
            let mut p = plan();
            p.files.push(bad.to_string());
            assert!(
                matches!(p.validate(), Err(PlanValidationError::InvalidPath(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut p = plan();
        p.files.push("tests/".to_string());
        assert_eq!(
            p.validate(),
            Err(PlanValidationError::DuplicateFile("tests/".to_string()))
        );
    }

    #[test]
    fn test_rejects_empty_file_list() {
        let mut p = plan();
        p.files.clear();
        assert_eq!(p.validate(), Err(PlanValidationError::NoFiles));
    }

    #[test]
    fn test_rejects_bad_log_file() {
        let mut p = plan();
        p.launch.log_file = "/var/log/app.log".to_string();
        assert!(matches!(
            p.validate(),
            Err(PlanValidationError::InvalidLaunchFile { field: "log_file", .. })
        ));
    }

    #[test]
    fn test_readiness_port_fallback() {
        let mut p = plan();
        assert_eq!(p.readiness_port(5000), 5000);
        p.readiness.port = Some(8000);
        assert_eq!(p.readiness_port(5000), 8000);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "fail".parse::<ExistingProcessPolicy>(),
            Ok(ExistingProcessPolicy::Fail)
        );
        assert!("ignore".parse::<ExistingProcessPolicy>().is_err());
    }
}
