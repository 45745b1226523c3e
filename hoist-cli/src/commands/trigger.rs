//! Trigger command handler

use anyhow::{Context, Result};
use colored::*;
use hoist_client::HoistClient;
use hoist_core::dto::run::TriggerDeploy;

use crate::config::Config;

pub async fn handle_trigger(branch: Option<String>, config: &Config) -> Result<()> {
    let client = HoistClient::new(&config.orchestrator_url);

    let run = client
        .trigger_deploy(&TriggerDeploy { branch })
        .await
        .context("Failed to trigger deploy")?;

    println!("{}", "✓ Deploy queued".green().bold());
    println!("  Run ID:  {}", run.id.to_string().cyan());
    println!("  Branch:  {}", run.config.branch);
    println!(
        "\n  Follow with: {}",
        format!("hoist run logs {}", &run.id.to_string()[..8]).dimmed()
    );

    Ok(())
}
