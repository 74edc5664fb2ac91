//! SchedulerHandle - client interface to a running scheduler

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use super::messages::SchedRequest;
use super::queue::{EnqueueResult, QueueEntry, SchedulerStats, SkipResult};
use crate::domain::TaskParams;
use crate::error::SchedulerError;
use crate::events::{EventBus, SchedulerEvent};

/// Handle for submitting work to a scheduler and observing its events.
///
/// Cheap to clone; every clone talks to the same scheduler task.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedRequest>,
    events: EventBus,
}

impl SchedulerHandle {
    pub(crate) fn new(tx: mpsc::Sender<SchedRequest>, events: EventBus) -> Self {
        Self { tx, events }
    }

    /// Submit a task, dropping it if its id is already queued
    pub async fn enqueue(&self, params: TaskParams) -> Result<EnqueueResult, SchedulerError> {
        self.submit(params, false).await
    }

    /// Submit a task even if its id is already queued
    pub async fn enqueue_duplicate(&self, params: TaskParams) -> Result<EnqueueResult, SchedulerError> {
        self.submit(params, true).await
    }

    async fn submit(&self, params: TaskParams, allow_duplicate: bool) -> Result<EnqueueResult, SchedulerError> {
        debug!(id = ?params.id, allow_duplicate, "SchedulerHandle::submit: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedRequest::Enqueue {
            params,
            allow_duplicate,
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| SchedulerError::ChannelClosed)?
    }

    /// Retire the head without running its work function
    pub async fn skip(&self) -> Result<SkipResult, SchedulerError> {
        debug!("SchedulerHandle::skip: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedRequest::Skip { reply_tx }).await?;
        reply_rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Number of tasks currently linked, head included
    pub async fn length(&self) -> Result<usize, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedRequest::Length { reply_tx }).await?;
        reply_rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Linked tasks in execution order
    pub async fn queue_details(&self) -> Result<Vec<QueueEntry>, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedRequest::Details { reply_tx }).await?;
        reply_rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    pub async fn stats(&self) -> Result<SchedulerStats, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedRequest::Stats { reply_tx }).await?;
        reply_rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Subscribe to lifecycle events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Request shutdown; in-flight work is aborted
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        debug!("SchedulerHandle::shutdown: called");
        self.send(SchedRequest::Shutdown).await
    }

    async fn send(&self, req: SchedRequest) -> Result<(), SchedulerError> {
        self.tx.send(req).await.map_err(|_| SchedulerError::ChannelClosed)
    }
}
