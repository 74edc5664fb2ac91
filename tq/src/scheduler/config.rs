//! Scheduler configuration

use serde::{Deserialize, Serialize};

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Nickname used in diagnostics
    #[serde(default = "default_name")]
    pub name: String,

    /// Log type and payload of every task before dispatch
    #[serde(default, rename = "debug-all-tasks")]
    pub debug_all_tasks: bool,

    /// Queue length above which a backlog warning is logged
    #[serde(default = "default_high_water_mark", rename = "high-water-mark")]
    pub high_water_mark: usize,

    /// Channel buffer size for scheduler requests
    #[serde(default = "default_channel_buffer", rename = "channel-buffer")]
    pub channel_buffer: usize,

    /// Broadcast capacity for lifecycle events
    #[serde(default = "default_event_capacity", rename = "event-capacity")]
    pub event_capacity: usize,
}

fn default_name() -> String {
    "scheduler".to_string()
}

fn default_high_water_mark() -> usize {
    10
}

fn default_channel_buffer() -> usize {
    1000
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            debug_all_tasks: false,
            high_water_mark: default_high_water_mark(),
            channel_buffer: default_channel_buffer(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Default configuration under a different nickname
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.name, "scheduler");
        assert!(!config.debug_all_tasks);
        assert_eq!(config.high_water_mark, 10);
        assert_eq!(config.channel_buffer, 1000);
        assert_eq!(config.event_capacity, 1024);
    }

    #[test]
    fn test_named() {
        let config = SchedulerConfig::named("mailer");
        assert_eq!(config.name, "mailer");
        assert_eq!(config.high_water_mark, 10);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: SchedulerConfig = serde_yaml::from_str("name: router\ndebug-all-tasks: true\n").unwrap();
        assert_eq!(config.name, "router");
        assert!(config.debug_all_tasks);
        assert_eq!(config.high_water_mark, 10);
    }
}
