//! Error types

use thiserror::Error;

use crate::domain::TaskId;

/// Errors surfaced by scheduler operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Task {id} ({task_type}) has no work function and no default is configured")]
    MissingWorkFunction { id: TaskId, task_type: String },

    #[error("Scheduler channel closed")]
    ChannelClosed,
}

/// Failure reported by a work function
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("Work function panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
