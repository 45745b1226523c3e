//! Stage error types
//!
//! Every failure is fatal to the run. The variants only exist so that the
//! message shown to the user says what went wrong.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StageError>;

#[derive(Debug, Error)]
pub enum StageError {
    /// The external program could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The external program exited with a non-zero status
    #[error("{program} exited with {}: {}", exit_label(.code), .stderr.trim())]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("credential error: {0}")]
    Credential(String),

    /// A file listed in the plan is absent from the working copy
    #[error("'{0}' is listed in the plan but missing from the working copy")]
    MissingArtifact(String),

    #[error("application at {target} did not become ready within {waited_secs}s")]
    NotReady { target: String, waited_secs: u64 },

    /// The application port answers but no process recorded by a deploy is alive
    #[error("{target} is already in use by a process hoist does not track")]
    PortInUse { target: String },

    #[error("application process {pid} exited after launch, see {log_file}")]
    ProcessExited { pid: u32, log_file: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
