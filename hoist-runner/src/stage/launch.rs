//! Launch stage
//!
//! Renders the bootstrap-and-start script for a plan and runs it through a
//! transport. The application is started detached with `nohup` so it keeps
//! running once the shell session ends.

use hoist_core::domain::plan::{DeployPlan, ExistingProcessPolicy};
use tracing::{debug, info};

use crate::command::shell_quote;
use crate::error::Result;
use crate::transport::Transport;

/// Exit status of the launch script when [`ExistingProcessPolicy::Fail`]
/// finds a live process
pub const ALREADY_RUNNING_EXIT: i32 = 3;

/// Seconds to wait for a stopped process before sending SIGKILL
const STOP_GRACE_SECS: u32 = 10;

/// Shell function telling whether a pid belongs to a live process.
/// `kill -0` succeeds on zombies, so the state in `/proc` is checked too
/// where it exists.
const IS_RUNNING_FN: &str = r#"is_running() {
  kill -0 "$1" 2>/dev/null || return 1
  [ -r "/proc/$1/stat" ] || return 0
  [ "$(sed 's/.*) //' "/proc/$1/stat" | cut -c1)" != Z ]
}
"#;

/// State of the process recorded in a plan's pid file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No pid has been recorded
    Untracked,
    Running(u32),
    /// The recorded process has exited or is a zombie
    Exited(u32),
}

impl ProcessState {
    fn parse(stdout: &str) -> Self {
        let Some(line) = stdout.lines().rev().find_map(|l| l.strip_prefix("process ")) else {
            return ProcessState::Untracked;
        };
        let mut parts = line.split_whitespace();
        let state = parts.next();
        let pid = parts.next().and_then(|p| p.parse().ok());
        match (state, pid) {
            (Some("running"), Some(pid)) => ProcessState::Running(pid),
            (Some("exited"), Some(pid)) => ProcessState::Exited(pid),
            _ => ProcessState::Untracked,
        }
    }
}

/// Renders the launch script for `plan`, to be run inside `dir`
pub fn build_launch_script(plan: &DeployPlan, dir: &str) -> String {
    let pid_file = shell_quote(&plan.launch.pid_file);
    let log_file = shell_quote(&plan.launch.log_file);

    let mut script = String::new();
    script.push_str("set -e\n");
    script.push_str(IS_RUNNING_FN);
    script.push_str(&format!("cd {}\n", shell_quote(dir)));

    // Refuse before bootstrap touches the environment of a live process
    if plan.on_running == ExistingProcessPolicy::Fail {
        script.push_str(&format!(
            "if [ -f {pid_file} ] && is_running \"$(cat {pid_file})\"; then\n\
             \x20 echo \"application already running (pid $(cat {pid_file}))\" >&2\n\
             \x20 exit {ALREADY_RUNNING_EXIT}\n\
             fi\n"
        ));
    }

    for command in &plan.bootstrap {
        script.push_str(command);
        script.push('\n');
    }

    if plan.on_running == ExistingProcessPolicy::Restart {
        script.push_str(&format!(
            "if [ -f {pid_file} ]; then\n\
             \x20 old=$(cat {pid_file})\n\
             \x20 if [ -n \"$old\" ] && is_running \"$old\"; then\n\
             \x20   echo \"stopping previous instance (pid $old)\"\n\
             \x20   kill \"$old\" 2>/dev/null || true\n\
             \x20   i=0\n\
             \x20   while is_running \"$old\" && [ \"$i\" -lt {STOP_GRACE_SECS} ]; do sleep 1; i=$((i + 1)); done\n\
             \x20   kill -9 \"$old\" 2>/dev/null || true\n\
             \x20 fi\n\
             fi\n"
        ));
    }

    // One shell owns the whole command so env prefixes and compound
    // commands are detached and redirected as a unit
    script.push_str(&format!(
        "nohup sh -c {} >> {log_file} 2>&1 < /dev/null &\n",
        shell_quote(&plan.launch.command)
    ));
    script.push_str(&format!("echo $! > {pid_file}\n"));
    script.push_str("echo \"launched pid $!\"\n");
    script
}

/// Renders a script that reports the state of the pid recorded in `dir`
pub fn build_state_script(plan: &DeployPlan, dir: &str) -> String {
    let pid_file = shell_quote(&plan.launch.pid_file);

    let mut script = String::new();
    script.push_str(IS_RUNNING_FN);
    script.push_str(&format!("cd {} || exit 1\n", shell_quote(dir)));
    script.push_str(&format!(
        "pid=$(cat {pid_file} 2>/dev/null || true)\n\
         if [ -z \"$pid\" ]; then\n\
         \x20 echo \"process none\"\n\
         elif is_running \"$pid\"; then\n\
         \x20 echo \"process running $pid\"\n\
         else\n\
         \x20 echo \"process exited $pid\"\n\
         fi\n"
    ));
    script
}

/// Looks up whether the process recorded for `plan` in `dir` is alive
pub async fn process_state(transport: &dyn Transport, plan: &DeployPlan, dir: &str) -> Result<ProcessState> {
    let output = transport.exec(&build_state_script(plan, dir)).await?;
    let state = ProcessState::parse(&output.stdout);
    debug!(?state, "Process state on {}", transport.describe());
    Ok(state)
}

/// Runs the launch script in `dir` and returns the new process id
pub async fn launch(transport: &dyn Transport, plan: &DeployPlan, dir: &str) -> Result<Option<u32>> {
    let script = build_launch_script(plan, dir);
    let output = transport.exec(&script).await?;

    let pid = output
        .stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix("launched pid "))
        .and_then(|pid| pid.trim().parse().ok());

    match pid {
        Some(pid) => info!(pid, "Application started on {}", transport.describe()),
        None => info!("Application started on {}", transport.describe()),
    }
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::TokioCommandRunner;
    use crate::error::StageError;
    use crate::transport::LocalTransport;
    use hoist_core::domain::plan::{LaunchSpec, PLAN_VERSION, ReadinessSpec};
    use std::path::Path;
    use std::sync::Arc;

    fn sleeper_plan(policy: ExistingProcessPolicy) -> DeployPlan {
        DeployPlan {
            version: PLAN_VERSION,
            name: "sleeper".to_string(),
            files: vec!["app.sh".to_string()],
            bootstrap: vec!["echo bootstrapped > bootstrap.out".to_string()],
            launch: LaunchSpec {
                command: "sleep 30".to_string(),
                log_file: "app.log".to_string(),
                pid_file: "app.pid".to_string(),
            },
            readiness: ReadinessSpec::default(),
            on_running: policy,
        }
    }

    fn read_pid(dir: &Path) -> u32 {
        std::fs::read_to_string(dir.join("app.pid"))
            .unwrap()
            .trim()
            .parse()
            .unwrap()
    }

    /// Whether `pid` is a live, non-zombie process
    fn alive(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(") ")
                .next()
                .is_some_and(|rest| !rest.starts_with('Z')),
            Err(_) => false,
        }
    }

    fn stop(pid: u32) {
        let _ = std::process::Command::new("kill")
            .args(["-9", &pid.to_string()])
            .status();
    }

    #[test]
    fn test_script_order() {
        let script = build_launch_script(
            &sleeper_plan(ExistingProcessPolicy::Restart),
            "/srv/app",
        );

        let cd = script.find("cd '/srv/app'").unwrap();
        let bootstrap = script.find("echo bootstrapped").unwrap();
        let stop = script.find("kill \"$old\"").unwrap();
        let start = script
            .find("nohup sh -c 'sleep 30' >> 'app.log' 2>&1 < /dev/null &")
            .unwrap();

        assert!(script.starts_with("set -e\n"));
        assert!(cd < bootstrap && bootstrap < stop && stop < start);
        assert!(script.contains("echo $! > 'app.pid'"));
        assert!(!script.contains(&format!("exit {ALREADY_RUNNING_EXIT}")));
    }

    #[test]
    fn test_fail_policy_checks_before_bootstrap() {
        let script = build_launch_script(&sleeper_plan(ExistingProcessPolicy::Fail), "/srv/app");

        let check = script.find(&format!("exit {ALREADY_RUNNING_EXIT}")).unwrap();
        let bootstrap = script.find("echo bootstrapped").unwrap();
        assert!(check < bootstrap);
        assert!(!script.contains("kill -9"));
    }

    #[tokio::test]
    async fn test_launch_detaches_and_appends_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.log"), "previous run\n").unwrap();
        let transport = LocalTransport::new(dir.path(), Arc::new(TokioCommandRunner::default()));
        let target = dir.path().to_string_lossy().to_string();

        let pid = launch(&transport, &sleeper_plan(ExistingProcessPolicy::Restart), &target)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(read_pid(dir.path()), pid);
        assert!(dir.path().join("bootstrap.out").is_file());
        let log = std::fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert!(log.starts_with("previous run\n"));

        let alive = std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .unwrap();
        assert!(alive.success());

        stop(pid);
    }

    #[tokio::test]
    async fn test_launch_runs_command_through_shell() {
        let dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new(dir.path(), Arc::new(TokioCommandRunner::default()));
        let target = dir.path().to_string_lossy().to_string();
        let mut plan = sleeper_plan(ExistingProcessPolicy::Restart);
        plan.launch.command = "GREETING=hello sh -c 'echo \"$GREETING\"' && sleep 30".to_string();

        // The compound command keeps running, so launch must not wait on its output
        let pid = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            launch(&transport, &plan, &target),
        )
        .await
        .expect("launch waited on the application")
        .unwrap()
        .unwrap();

        let mut log = String::new();
        for _ in 0..50 {
            log = std::fs::read_to_string(dir.path().join("app.log")).unwrap_or_default();
            if !log.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert_eq!(log, "hello\n");
        assert!(alive(pid));

        stop(pid);
    }

    #[test]
    fn test_parse_process_state() {
        assert_eq!(ProcessState::parse("process running 42\n"), ProcessState::Running(42));
        assert_eq!(
            ProcessState::parse("noise\nprocess exited 7\n"),
            ProcessState::Exited(7)
        );
        assert_eq!(ProcessState::parse("process none\n"), ProcessState::Untracked);
        assert_eq!(ProcessState::parse(""), ProcessState::Untracked);
    }

    #[tokio::test]
    async fn test_process_state_follows_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new(dir.path(), Arc::new(TokioCommandRunner::default()));
        let target = dir.path().to_string_lossy().to_string();
        let mut plan = sleeper_plan(ExistingProcessPolicy::Restart);

        assert_eq!(
            process_state(&transport, &plan, &target).await.unwrap(),
            ProcessState::Untracked
        );

        let pid = launch(&transport, &plan, &target).await.unwrap().unwrap();
        assert_eq!(
            process_state(&transport, &plan, &target).await.unwrap(),
            ProcessState::Running(pid)
        );
        stop(pid);

        plan.launch.command = "exit 1".to_string();
        let crashed = launch(&transport, &plan, &target).await.unwrap().unwrap();
        let mut state = ProcessState::Running(crashed);
        for _ in 0..50 {
            state = process_state(&transport, &plan, &target).await.unwrap();
            if state != ProcessState::Running(crashed) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert_eq!(state, ProcessState::Exited(crashed));
    }

    #[tokio::test]
    async fn test_restart_replaces_process() {
        let dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new(dir.path(), Arc::new(TokioCommandRunner::default()));
        let target = dir.path().to_string_lossy().to_string();
        let plan = sleeper_plan(ExistingProcessPolicy::Restart);

        let first = launch(&transport, &plan, &target).await.unwrap().unwrap();
        let second = launch(&transport, &plan, &target).await.unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(read_pid(dir.path()), second);
        assert!(!alive(first), "previous instance {first} still running");
        assert!(alive(second));

        stop(first);
        stop(second);
    }

    #[tokio::test]
    async fn test_fail_policy_refuses_live_process() {
        let dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new(dir.path(), Arc::new(TokioCommandRunner::default()));
        let target = dir.path().to_string_lossy().to_string();
        let plan = sleeper_plan(ExistingProcessPolicy::Fail);

        let first = launch(&transport, &plan, &target).await.unwrap().unwrap();
        let err = launch(&transport, &plan, &target).await.unwrap_err();

        match err {
            StageError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, Some(ALREADY_RUNNING_EXIT));
                assert!(stderr.contains("already running"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(read_pid(dir.path()), first);

        stop(first);
    }
}
