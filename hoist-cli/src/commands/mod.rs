//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod deploy;
mod plan;
mod run;
mod trigger;

pub use deploy::DeployArgs;
pub use plan::PlanCommands;
pub use run::RunCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy from this machine, without an orchestrator
    Deploy(DeployArgs),
    /// Ask the orchestrator to queue a deploy
    Trigger {
        /// Deploy this branch instead of the configured one
        #[arg(short, long)]
        branch: Option<String>,
    },
    /// Inspect orchestrator runs
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Show or create deploy plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Deploy(args) => deploy::handle_deploy(args).await,
        Commands::Trigger { branch } => trigger::handle_trigger(branch, config).await,
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Plan { command } => plan::handle_plan_command(command),
    }
}
