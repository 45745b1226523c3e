//! Run command handlers
//!
//! Lists runs and shows their details and logs.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use hoist_client::HoistClient;
use hoist_core::dto::run::RunSummary;

use crate::config::Config;
use crate::id_resolver::resolve_run_id;
use crate::output::{colorize_status, print_log_entry, print_run_details};
use crate::types::IdOrPrefix;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// List runs, most recent first
    List,
    /// Get run details
    Get {
        /// Run ID or unambiguous prefix
        id: String,
    },
    /// Get run logs
    Logs {
        /// Run ID or unambiguous prefix
        id: String,
    },
}

pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = HoistClient::new(&config.orchestrator_url);

    match command {
        RunCommands::List => list_runs(&client).await,
        RunCommands::Get { id } => get_run(&client, &id).await,
        RunCommands::Logs { id } => get_run_logs(&client, &id).await,
    }
}

async fn list_runs(client: &HoistClient) -> Result<()> {
    let runs = client.list_runs().await?;

    if runs.is_empty() {
        println!("{}", "No runs found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} run(s):", runs.len()).bold());
    println!();
    for run in runs {
        print_run_summary(&run);
    }
    Ok(())
}

async fn get_run(client: &HoistClient, id: &str) -> Result<()> {
    let uuid = resolve_run_id(client, &IdOrPrefix::parse(id)).await?;
    let run = client.get_run(uuid).await?;

    print_run_details(&run);
    Ok(())
}

async fn get_run_logs(client: &HoistClient, id: &str) -> Result<()> {
    let uuid = resolve_run_id(client, &IdOrPrefix::parse(id)).await?;
    let logs = client.get_run_logs(uuid).await?;

    if logs.is_empty() {
        println!("{}", "No logs found for this run.".yellow());
    } else {
        println!("{}", format!("Logs for run {}:", uuid).bold());
        println!("{}", "─".repeat(80).dimmed());
        for log in logs {
            print_log_entry(&log);
        }
        println!("{}", "─".repeat(80).dimmed());
    }
    Ok(())
}

fn print_run_summary(run: &RunSummary) {
    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Status:   {}", colorize_status(&run.status));
    println!("    Trigger:  {:?}", run.trigger);
    println!("    Branch:   {}", run.branch);
    println!(
        "    Created:  {}",
        run.requested_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}
