//! Deploy command handler
//!
//! Runs the full fetch, transfer and launch sequence from this machine.
//! Settings come from flags, falling back to the same `HOIST_*` variables
//! the orchestrator reads.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::*;
use hoist_core::domain::config::DeployConfig;
use hoist_runner::{RunnerConfig, Sequencer};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::commands::plan::load_plan_or_default;
use crate::output::{ConsoleSink, print_result, print_stages};

#[derive(Args)]
pub struct DeployArgs {
    /// Lua plan file (defaults to the built-in python plan)
    #[arg(long, env = "HOIST_PLAN")]
    plan: Option<PathBuf>,

    /// Deploy into this local directory instead of a remote host
    #[arg(long, value_name = "DIR")]
    local: Option<PathBuf>,

    /// Credential used for remote access
    #[arg(long, env = "HOIST_CREDENTIAL_ID")]
    credential_id: Option<String>,

    /// Target host
    #[arg(long, env = "HOIST_REMOTE_HOST")]
    host: Option<String>,

    /// Login user on the target host
    #[arg(long, env = "HOIST_REMOTE_USER")]
    user: Option<String>,

    /// Absolute application directory on the target host
    #[arg(long, env = "HOIST_REMOTE_DIR")]
    remote_dir: Option<String>,

    /// Git repository to deploy from
    #[arg(long, env = "HOIST_REPO_URL")]
    repo_url: Option<String>,

    /// Branch to deploy
    #[arg(short, long, env = "HOIST_BRANCH")]
    branch: Option<String>,

    #[arg(long, env = "HOIST_SSH_PORT")]
    ssh_port: Option<u16>,

    /// Port the application listens on
    #[arg(long, env = "HOIST_APP_PORT")]
    app_port: Option<u16>,

    /// Local directory holding the working copy
    #[arg(long, env = "HOIST_WORKSPACE")]
    workspace: Option<PathBuf>,
}

impl DeployArgs {
    /// Builds the deploy configuration, filling local-mode placeholders
    fn deploy_config(&self) -> Result<DeployConfig> {
        let mut values: HashMap<&'static str, String> = HashMap::new();
        let mut set = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                values.insert(key, value);
            }
        };

        set("HOIST_CREDENTIAL_ID", self.credential_id.clone());
        set("HOIST_REMOTE_HOST", self.host.clone());
        set("HOIST_REMOTE_USER", self.user.clone());
        set("HOIST_REMOTE_DIR", self.remote_dir.clone());
        set("HOIST_REPO_URL", self.repo_url.clone());
        set("HOIST_BRANCH", self.branch.clone());
        set("HOIST_SSH_PORT", self.ssh_port.map(|p| p.to_string()));
        set("HOIST_APP_PORT", self.app_port.map(|p| p.to_string()));
        set(
            "HOIST_WORKSPACE",
            self.workspace
                .as_ref()
                .map(|w| w.to_string_lossy().to_string()),
        );

        if self.local.is_some() {
            // The local transport ignores host identity and credentials
            for (key, placeholder) in [
                ("HOIST_CREDENTIAL_ID", "local"),
                ("HOIST_REMOTE_HOST", "localhost"),
                ("HOIST_REMOTE_USER", "local"),
                ("HOIST_REMOTE_DIR", "/app"),
            ] {
                values
                    .entry(key)
                    .or_insert_with(|| placeholder.to_string());
            }
        }

        let config = DeployConfig::from_lookup(|key| values.get(key).cloned())?;
        config.validate()?;
        Ok(config)
    }
}

pub async fn handle_deploy(args: DeployArgs) -> Result<()> {
    let config = args.deploy_config().context("Invalid deploy configuration")?;
    let plan = load_plan_or_default(args.plan.as_deref())?;
    let runner = RunnerConfig::from_env().context("Invalid runner configuration")?;

    let sequencer = match &args.local {
        Some(root) => {
            std::fs::create_dir_all(root)
                .with_context(|| format!("Failed to create {}", root.display()))?;
            println!(
                "{}",
                format!("Deploying '{}' into {}", plan.name, root.display()).bold()
            );
            Sequencer::local(&runner, root.clone())
        }
        None => {
            println!(
                "{}",
                format!(
                    "Deploying '{}' to {}:{}",
                    plan.name,
                    config.destination(),
                    config.remote_dir
                )
                .bold()
            );
            Sequencer::ssh(&runner)
        }
    };
    println!("{}", "─".repeat(80).dimmed());

    let report = sequencer.run(&config, &plan, &ConsoleSink).await;

    println!("{}", "─".repeat(80).dimmed());
    print_stages(&report.stages);
    if let Some(commit) = &report.commit {
        println!("\n  Commit:     {}", commit.dimmed());
    }
    if let Some(pid) = report.pid {
        println!("  PID:        {}", pid);
    }
    println!();
    print_result(&report.result);

    if !report.result.success {
        let stage = report
            .result
            .failed_stage
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        bail!("Deploy failed during the {} stage", stage);
    }

    println!("\n{}", "✓ Deploy succeeded".green().bold());
    Ok(())
}
