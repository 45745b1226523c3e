//! Built-in plan and Lua rendering
//!
//! The default plan deploys a Flask-style Python application: the entry
//! point, its dependency manifest, docs, tests and container descriptor are
//! copied over, a virtualenv is materialized and the app is started detached.

use std::fmt::Write as _;

use hoist_core::domain::plan::{
    DeployPlan, ExistingProcessPolicy, LaunchSpec, PLAN_VERSION, ReadinessSpec,
};

/// The built-in python application plan
pub fn default_plan() -> DeployPlan {
    DeployPlan {
        version: PLAN_VERSION,
        name: "python-app".to_string(),
        files: ["app.py", "requirements.txt", "README.md", "tests", "Dockerfile"]
            .map(String::from)
            .to_vec(),
        bootstrap: [
            "sudo apt-get update -y",
            "sudo apt-get install -y python3 python3-venv python3-pip",
            "python3 -m venv venv",
            ". venv/bin/activate",
            "pip install --upgrade pip",
            "pip install -r requirements.txt",
        ]
        .map(String::from)
        .to_vec(),
        launch: LaunchSpec {
            command: "python3 app.py --host=0.0.0.0".to_string(),
            log_file: "app.log".to_string(),
            pid_file: "app.pid".to_string(),
        },
        readiness: ReadinessSpec::default(),
        on_running: ExistingProcessPolicy::Restart,
    }
}

/// Render a plan as Lua source accepted by [`crate::parse_plan`]
pub fn render_plan(plan: &DeployPlan) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "-- Hoist deploy plan");
    let _ = writeln!(out, "return plan.define {{");
    let _ = writeln!(out, "    version = {},", plan.version);
    let _ = writeln!(out, "    name = {},", lua_string(&plan.name));
    write_list(&mut out, "files", &plan.files);
    write_list(&mut out, "bootstrap", &plan.bootstrap);

    let _ = writeln!(out, "    launch = {{");
    let _ = writeln!(out, "        command = {},", lua_string(&plan.launch.command));
    let _ = writeln!(out, "        log_file = {},", lua_string(&plan.launch.log_file));
    let _ = writeln!(out, "        pid_file = {},", lua_string(&plan.launch.pid_file));
    let _ = writeln!(out, "    }},");

    let readiness = &plan.readiness;
    let _ = writeln!(out, "    readiness = {{");
    if let Some(port) = readiness.port {
        let _ = writeln!(out, "        port = {port},");
    }
    if let Some(path) = &readiness.path {
        let _ = writeln!(out, "        path = {},", lua_string(path));
    }
    let _ = writeln!(out, "        timeout_secs = {},", readiness.timeout_secs);
    let _ = writeln!(out, "        interval_ms = {},", readiness.interval_ms);
    let _ = writeln!(out, "    }},");

    let _ = writeln!(out, "    on_running = {},", lua_string(&plan.on_running.to_string()));
    let _ = writeln!(out, "}}");

    out
}

fn write_list(out: &mut String, key: &str, values: &[String]) {
    let _ = writeln!(out, "    {key} = {{");
    for value in values {
        let _ = writeln!(out, "        {},", lua_string(value));
    }
    let _ = writeln!(out, "    }},");
}

/// Quote a string as a Lua double-quoted literal
fn lua_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(quoted, "\\u{{{:x}}}", c as u32);
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
