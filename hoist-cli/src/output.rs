//! Terminal rendering shared by the commands

use colored::*;
use hoist_core::domain::log::{LogEntry, LogLevel};
use hoist_core::domain::run::{DeployRun, RunResult, RunStatus, StageOutcome};
use hoist_runner::LogSink;

/// Prints run log entries as they are produced
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn add_entry(&self, entry: LogEntry) {
        print_log_entry(&entry);
    }
}

pub fn print_log_entry(log: &LogEntry) {
    let level_str = format!("{:?}", log.level).to_uppercase();
    let level_colored = match log.level {
        LogLevel::Debug => level_str.dimmed(),
        LogLevel::Info => level_str.cyan(),
        LogLevel::Warning => level_str.yellow(),
        LogLevel::Error => level_str.red(),
    };
    let stage = log
        .stage
        .map(|s| format!("{:>8} ", s.as_str()))
        .unwrap_or_else(|| " ".repeat(9));

    println!(
        "{} [{}] {}{}",
        log.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level_colored,
        stage.dimmed(),
        log.message
    );
}

pub fn colorize_status(status: &RunStatus) -> ColoredString {
    let status_str = format!("{:?}", status);
    match status {
        RunStatus::Queued => status_str.yellow(),
        RunStatus::Running => status_str.cyan(),
        RunStatus::Succeeded => status_str.green(),
        RunStatus::Failed => status_str.red(),
    }
}

pub fn print_stages(stages: &[StageOutcome]) {
    for outcome in stages {
        let mark = if outcome.success {
            "✓".green()
        } else {
            "✗".red()
        };
        let millis = outcome.duration().num_milliseconds();
        println!(
            "  {} {:<9} {}",
            mark,
            outcome.stage.to_string(),
            format!("{:.1}s", millis as f64 / 1000.0).dimmed()
        );
        if let Some(error) = &outcome.error {
            println!("      {}", error.red());
        }
    }
}

pub fn print_result(result: &RunResult) {
    println!(
        "  Success:    {}",
        if result.success {
            "✓".green()
        } else {
            "✗".red()
        }
    );
    println!("  Exit Code:  {}", result.exit_code);
    if let Some(stage) = result.failed_stage {
        println!("  Failed At:  {}", stage.to_string().red());
    }
    if let Some(error) = &result.error_message {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

pub fn print_run_details(run: &DeployRun) {
    println!("{}", "Run Details:".bold());
    println!("  ID:          {}", run.id.to_string().cyan());
    println!("  Trigger:     {:?}", run.trigger);
    println!("  Status:      {}", colorize_status(&run.status));
    println!("  Plan:        {}", run.plan_name);
    println!("  Repository:  {} ({})", run.config.repo_url, run.config.branch);
    println!(
        "  Target:      {}:{}",
        run.config.destination(),
        run.config.remote_dir
    );
    println!(
        "  Requested:   {}",
        run.requested_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(started) = run.started_at {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(completed) = run.completed_at {
        println!("  Completed:   {}", completed.format("%Y-%m-%d %H:%M:%S"));
        if let Some(started) = run.started_at {
            let seconds = completed.signed_duration_since(started).num_seconds();
            println!("  Duration:    {}s", seconds);
        }
    }
    if let Some(stage) = run.completed_through() {
        println!("  Reached:     {}", stage);
    }

    if !run.stages.is_empty() {
        println!("\n{}", "Stages:".bold());
        print_stages(&run.stages);
    }

    if let Some(result) = &run.result {
        println!("\n{}", "Result:".bold());
        print_result(result);
    }
}
