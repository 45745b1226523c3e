//! Deploy plan parser
//!
//! Evaluates a Lua plan definition in the plan sandbox and converts the
//! returned table into a validated [`DeployPlan`].
//!
//! ```lua
//! return plan.define {
//!     version = 1,
//!     name = "flask-app",
//!     files = { "app.py", "requirements.txt", "tests" },
//!     bootstrap = {
//!         "python3 -m venv venv",
//!         ". venv/bin/activate",
//!         "pip install -r requirements.txt",
//!     },
//!     launch = { command = "python3 app.py --host=0.0.0.0", log_file = "app.log" },
//!     readiness = { path = "/", timeout_secs = 60 },
//!     on_running = "restart",
//! }
//! ```
//!
//! `readiness` defaults to an HTTP GET on `/` when omitted entirely. When a
//! `readiness` table is given without `path`, the probe is a TCP connect.

use mlua::{Table, Value};
use std::path::Path;

use hoist_core::domain::plan::{DeployPlan, ExistingProcessPolicy, LaunchSpec, ReadinessSpec};

use crate::error::PlanError;
use crate::sandbox::create_plan_sandbox;

const DEFAULT_LOG_FILE: &str = "app.log";
const DEFAULT_PID_FILE: &str = "app.pid";

/// Parse and validate a plan from Lua source
pub fn parse_plan(source: &str) -> Result<DeployPlan, PlanError> {
    let lua = create_plan_sandbox()?;

    let table: Table = match lua.load(source).set_name("plan").eval::<Value>()? {
        Value::Table(table) => table,
        other => {
            return Err(PlanError::field(
                "<root>",
                format!("plan must return a table, got {}", other.type_name()),
            ));
        }
    };

    let plan = DeployPlan {
        version: required_u32(&table, "version")?,
        name: required_string(&table, "name", "name")?,
        files: string_list(&table, "files")?,
        bootstrap: string_list(&table, "bootstrap")?,
        launch: parse_launch(&table)?,
        readiness: parse_readiness(&table)?,
        on_running: parse_policy(&table)?,
    };

    plan.validate()?;

    tracing::debug!(
        "Parsed plan '{}' ({} files, {} bootstrap commands)",
        plan.name,
        plan.files.len(),
        plan.bootstrap.len()
    );

    Ok(plan)
}

/// Read a plan file from disk and parse it
pub fn load_plan(path: &Path) -> Result<DeployPlan, PlanError> {
    let source = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_plan(&source)
}

fn parse_launch(plan: &Table) -> Result<LaunchSpec, PlanError> {
    let launch: Table = match plan.get::<Value>("launch")? {
        Value::Table(t) => t,
        Value::Nil => return Err(PlanError::field("launch", "is required")),
        other => {
            return Err(PlanError::field(
                "launch",
                format!("must be a table, got {}", other.type_name()),
            ));
        }
    };

    Ok(LaunchSpec {
        command: required_string(&launch, "command", "launch.command")?,
        log_file: optional_string(&launch, "log_file", "launch.log_file")?
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
        pid_file: optional_string(&launch, "pid_file", "launch.pid_file")?
            .unwrap_or_else(|| DEFAULT_PID_FILE.to_string()),
    })
}

fn parse_readiness(plan: &Table) -> Result<ReadinessSpec, PlanError> {
    let readiness: Table = match plan.get::<Value>("readiness")? {
        Value::Nil => return Ok(ReadinessSpec::default()),
        Value::Table(t) => t,
        other => {
            return Err(PlanError::field(
                "readiness",
                format!("must be a table, got {}", other.type_name()),
            ));
        }
    };

    let defaults = ReadinessSpec::default();

    let port = match optional_u32(&readiness, "port", "readiness.port")? {
        Some(p) => Some(
            u16::try_from(p)
                .map_err(|_| PlanError::field("readiness.port", format!("{p} is not a port")))?,
        ),
        None => None,
    };

    Ok(ReadinessSpec {
        port,
        path: optional_string(&readiness, "path", "readiness.path")?,
        timeout_secs: optional_u32(&readiness, "timeout_secs", "readiness.timeout_secs")?
            .map(u64::from)
            .unwrap_or(defaults.timeout_secs),
        interval_ms: optional_u32(&readiness, "interval_ms", "readiness.interval_ms")?
            .map(u64::from)
            .unwrap_or(defaults.interval_ms),
    })
}

fn parse_policy(plan: &Table) -> Result<ExistingProcessPolicy, PlanError> {
    match optional_string(plan, "on_running", "on_running")? {
        None => Ok(ExistingProcessPolicy::default()),
        Some(raw) => raw
            .parse()
            .map_err(|reason: String| PlanError::field("on_running", reason)),
    }
}

/// Parse an optional array of strings; `nil` is an empty list
fn string_list(table: &Table, field: &str) -> Result<Vec<String>, PlanError> {
    match table.get::<Value>(field)? {
        Value::Nil => Ok(Vec::new()),
        Value::Table(list) => {
            let mut values = Vec::new();
            for (idx, entry) in list.sequence_values::<Value>().enumerate() {
                match entry? {
                    Value::String(s) => values.push(s.to_str()?.to_string()),
                    other => {
                        return Err(PlanError::field(
                            format!("{field}[{}]", idx + 1),
                            format!("must be a string, got {}", other.type_name()),
                        ));
                    }
                }
            }
            Ok(values)
        }
        other => Err(PlanError::field(
            field,
            format!("must be an array of strings, got {}", other.type_name()),
        )),
    }
}

fn required_string(table: &Table, key: &str, field: &str) -> Result<String, PlanError> {
    optional_string(table, key, field)?.ok_or_else(|| PlanError::field(field, "is required"))
}

fn optional_string(table: &Table, key: &str, field: &str) -> Result<Option<String>, PlanError> {
    match table.get::<Value>(key)? {
        Value::Nil => Ok(None),
        Value::String(s) => Ok(Some(s.to_str()?.to_string())),
        other => Err(PlanError::field(
            field,
            format!("must be a string, got {}", other.type_name()),
        )),
    }
}

fn required_u32(table: &Table, key: &str) -> Result<u32, PlanError> {
    optional_u32(table, key, key)?.ok_or_else(|| PlanError::field(key, "is required"))
}

fn optional_u32(table: &Table, key: &str, field: &str) -> Result<Option<u32>, PlanError> {
    match table.get::<Value>(key)? {
        Value::Nil => Ok(None),
        Value::Integer(i) => u32::try_from(i)
            .map(Some)
            .map_err(|_| PlanError::field(field, format!("{i} is out of range"))),
        other => Err(PlanError::field(
            field,
            format!("must be a non-negative integer, got {}", other.type_name()),
        )),
    }
}
