//! tq - task plan runner
//!
//! CLI entry point for running YAML task plans through the scheduler.

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use taskqueue::cli::{Cli, Command, OutputFormat, get_log_path};
use taskqueue::config::Config;
use taskqueue::plan::{PlanReport, TaskPlan, run_plan};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level_str = cli_log_level.or(config_log_level);
    let level = match level_str.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(scheduler = %config.scheduler.name, "tq loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            plan,
            format,
            timeout_ms,
        } => cmd_run(&config, &plan, format, timeout_ms).await,
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_run(config: &Config, plan_path: &Path, format: OutputFormat, timeout_ms: Option<u64>) -> Result<()> {
    debug!(plan = %plan_path.display(), %format, ?timeout_ms, "cmd_run: called");
    let plan = TaskPlan::load(plan_path)?;
    let timeout = timeout_ms.map(Duration::from_millis).unwrap_or_else(|| plan.timeout());

    let report = run_plan(&plan, config.scheduler.clone(), timeout).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    if !report.is_complete() {
        return Err(eyre!(
            "Report is incomplete: {} scheduler event(s) were missed",
            report.missed_events
        ));
    }
    if report.stalled {
        return Err(eyre!(
            "Queue stalled with {} task(s) remaining after {}ms",
            report.remaining,
            timeout.as_millis()
        ));
    }
    Ok(())
}

fn print_report(report: &PlanReport) {
    for (i, task) in report.completed.iter().enumerate() {
        println!(
            "{:>3}. {} {} priority={} attempts={}",
            i + 1,
            "✓".green(),
            task.id.to_string().bold(),
            task.priority,
            task.attempts
        );
    }
    for task in &report.rejected {
        println!("     {} {} duplicate dropped", "✗".yellow(), task.id.to_string().bold());
    }
    for failure in &report.failures {
        let action = if failure.retrying { "retrying" } else { "not retried" };
        println!(
            "     {} {} failed: {} ({})",
            "!".red(),
            failure.task.id.to_string().bold(),
            failure.error,
            action
        );
    }

    if !report.is_complete() {
        println!(
            "     {} {} event(s) missed, listing above is incomplete",
            "!".red(),
            report.missed_events
        );
    }

    let stats = &report.stats;
    let status = if report.stalled {
        format!("stalled, {} remaining", report.remaining).red().to_string()
    } else {
        "drained".green().to_string()
    };
    println!(
        "\n{} completed, {} rejected, {} retried, peak length {}: {}",
        stats.total_completed, stats.total_rejected, stats.total_retried, stats.peak_length, status
    );
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}
