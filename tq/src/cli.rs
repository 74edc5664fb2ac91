//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tq - single-consumer priority task scheduler
#[derive(Parser)]
#[command(
    name = "tq",
    about = "Run task plans through a single-consumer priority scheduler",
    version,
    after_help = "Logs are written to: ~/.local/share/taskqueue/logs/taskqueue.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (overrides config file)
    #[arg(long, global = true, help = "Log level: trace, debug, info, warn, error")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit every task in a plan file and report completion order
    Run {
        /// YAML plan file
        #[arg(value_name = "PLAN")]
        plan: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Give up waiting for the queue to drain after this many milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Print the effective configuration
    Config,
}

/// Output format for the run report
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Path of the log file written by the binary
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskqueue")
        .join("logs")
        .join("taskqueue.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["tq", "run", "plan.yml"]);
        match cli.command {
            Command::Run {
                plan,
                format,
                timeout_ms,
            } => {
                assert_eq!(plan, PathBuf::from("plan.yml"));
                assert_eq!(format, OutputFormat::Text);
                assert!(timeout_ms.is_none());
            }
            other => panic!("Expected Run, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_run_with_options() {
        let cli = Cli::parse_from([
            "tq",
            "--log-level",
            "debug",
            "run",
            "plan.yml",
            "--format",
            "json",
            "--timeout-ms",
            "250",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Command::Run {
                format: OutputFormat::Json,
                timeout_ms: Some(250),
                ..
            }
        ));
    }

    #[test]
    fn test_cli_parse_config_with_global_path() {
        let cli = Cli::parse_from(["tq", "config", "--config", "custom.yml"]);
        assert!(matches!(cli.command, Command::Config));
        assert_eq!(cli.config, Some(PathBuf::from("custom.yml")));
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["tq"]).is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_log_path_location() {
        assert!(get_log_path().ends_with("taskqueue/logs/taskqueue.log"));
    }
}
