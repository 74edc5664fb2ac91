//! Scheduler lifecycle events

use serde::{Deserialize, Serialize};

use crate::domain::{TaskId, TaskInfo};

/// Lifecycle signals published by a scheduler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SchedulerEvent {
    /// A task finished (or was skipped) and the head advanced past it
    Ready { task: TaskInfo },

    /// The chain drained after holding at least one task
    Complete,

    /// A submission was dropped because its id is already tracked
    Rejected { task: TaskInfo },

    /// A work function reported failure
    Failed {
        task: TaskInfo,
        error: String,
        /// Whether the task was re-queued under the retry protocol
        retrying: bool,
    },

    /// The head could not be dispatched; the chain is stalled until skipped
    DispatchFailed { task: TaskInfo, error: String },
}

impl SchedulerEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "Ready",
            Self::Complete => "Complete",
            Self::Rejected { .. } => "Rejected",
            Self::Failed { .. } => "Failed",
            Self::DispatchFailed { .. } => "DispatchFailed",
        }
    }

    /// Id of the task this event concerns, if any
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::Ready { task }
            | Self::Rejected { task }
            | Self::Failed { task, .. }
            | Self::DispatchFailed { task, .. } => Some(&task.id),
            Self::Complete => None,
        }
    }
}
