//! Plan command handlers

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use hoist_core::domain::plan::DeployPlan;
use std::path::{Path, PathBuf};

/// Plan subcommands
#[derive(Subcommand)]
pub enum PlanCommands {
    /// Print the effective plan
    Show {
        /// Lua plan file (defaults to the built-in python plan)
        #[arg(long, env = "HOIST_PLAN")]
        plan: Option<PathBuf>,
    },
    /// Write the built-in plan as an editable Lua file
    Init {
        /// Output file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_plan_command(command: PlanCommands) -> Result<()> {
    match command {
        PlanCommands::Show { plan } => {
            let plan = load_plan_or_default(plan.as_deref())?;
            print_plan(&plan);
            Ok(())
        }
        PlanCommands::Init { output, force } => init_plan(output.as_deref(), force),
    }
}

/// Loads a Lua plan, or the built-in plan when no path is given
pub fn load_plan_or_default(path: Option<&Path>) -> Result<DeployPlan> {
    match path {
        Some(path) => hoist_plan::load_plan(path)
            .with_context(|| format!("Failed to load plan {}", path.display())),
        None => Ok(hoist_plan::default_plan()),
    }
}

fn init_plan(output: Option<&Path>, force: bool) -> Result<()> {
    let source = hoist_plan::render_plan(&hoist_plan::default_plan());

    let Some(path) = output else {
        print!("{}", source);
        return Ok(());
    };

    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    std::fs::write(path, source)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} {}",
        "✓ Plan written to".green(),
        path.display().to_string().cyan()
    );
    Ok(())
}

fn print_plan(plan: &DeployPlan) {
    println!("{}", format!("Plan: {}", plan.name).bold());
    println!("  Version:     {}", plan.version);
    println!("  On running:  {}", plan.on_running);

    println!("\n{}", "Files:".bold());
    for file in &plan.files {
        println!("  {} {}", "▸".cyan(), file);
    }

    println!("\n{}", "Bootstrap:".bold());
    for (i, command) in plan.bootstrap.iter().enumerate() {
        println!("  {}. {}", i + 1, command);
    }

    println!("\n{}", "Launch:".bold());
    println!("  Command:     {}", plan.launch.command.cyan());
    println!("  Log file:    {}", plan.launch.log_file);
    println!("  PID file:    {}", plan.launch.pid_file);

    let readiness = &plan.readiness;
    println!("\n{}", "Readiness:".bold());
    match &readiness.path {
        Some(path) => println!("  Probe:       HTTP GET {}", path),
        None => println!("  Probe:       TCP connect"),
    }
    match readiness.port {
        Some(port) => println!("  Port:        {}", port),
        None => println!("  Port:        {}", "application port".dimmed()),
    }
    println!(
        "  Timeout:     {}s (every {}ms)",
        readiness.timeout_secs, readiness.interval_ms
    );
}
