//! Requests handled by the scheduler task

use serde_json::Value;
use tokio::sync::oneshot;

use super::queue::{EnqueueResult, QueueEntry, SchedulerStats, SkipResult, TaskKey};
use crate::domain::TaskParams;
use crate::error::{SchedulerError, TaskError};

/// Internal requests to the Scheduler task
#[derive(Debug)]
pub enum SchedRequest {
    /// Submit a task
    Enqueue {
        params: TaskParams,
        allow_duplicate: bool,
        reply_tx: oneshot::Sender<Result<EnqueueResult, SchedulerError>>,
    },

    /// Retire the head without running it
    Skip { reply_tx: oneshot::Sender<SkipResult> },

    /// Number of linked tasks
    Length { reply_tx: oneshot::Sender<usize> },

    /// Ordered snapshot of the chain
    Details { reply_tx: oneshot::Sender<Vec<QueueEntry>> },

    /// Current statistics
    Stats { reply_tx: oneshot::Sender<SchedulerStats> },

    /// A dispatched work function settled
    Settled {
        key: TaskKey,
        result: Result<Value, TaskError>,
    },

    /// Stop the scheduler task
    Shutdown,
}
