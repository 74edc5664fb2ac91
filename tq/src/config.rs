//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::SchedulerConfig;

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = ".taskqueue.yml";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Scheduler settings
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `.taskqueue.yml`, then
    /// `~/.config/taskqueue/taskqueue.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidate_paths() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized.
    ///
    /// Errors are swallowed; the full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::candidate_paths(),
        };

        paths
            .into_iter()
            .filter(|p| p.exists())
            .find_map(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("taskqueue").join("taskqueue.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.log_level.is_none());
        assert_eq!(config.scheduler.name, "scheduler");
        assert_eq!(config.scheduler.high_water_mark, 10);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

scheduler:
  name: router-jobs
  debug-all-tasks: true
  high-water-mark: 25
  channel-buffer: 64
  event-capacity: 256
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.scheduler.name, "router-jobs");
        assert!(config.scheduler.debug_all_tasks);
        assert_eq!(config.scheduler.high_water_mark, 25);
        assert_eq!(config.scheduler.channel_buffer, 64);
        assert_eq!(config.scheduler.event_capacity, 256);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
scheduler:
  name: mailer
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.scheduler.name, "mailer");
        assert!(!config.scheduler.debug_all_tasks);
        assert_eq!(config.scheduler.high_water_mark, 10);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "log-level: warn\nscheduler:\n  name: from-file").unwrap();
        let path = file.path().to_path_buf();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.scheduler.name, "from-file");
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_explicit_path_reports_parse_errors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "scheduler: [not, a, map]").unwrap();
        let path = file.path().to_path_buf();

        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }
}
