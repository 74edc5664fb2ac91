//! Scheduler task implementation
//!
//! One tokio task owns the chain and handles every request in arrival order,
//! so submissions, skips and completion advances never interleave. Work
//! functions run on their own spawned tasks and report back through a weak
//! sender, which never keeps the scheduler alive on its own.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::SchedulerConfig;
use super::handle::SchedulerHandle;
use super::messages::SchedRequest;
use super::queue::{
    EnqueueResult, Placement, QueueEntry, QueueEntryStatus, SchedulerStats, SkipResult, TaskChain, TaskKey,
};
use crate::domain::{Task, WorkFn};
use crate::error::{SchedulerError, TaskError};
use crate::events::{EventBus, SchedulerEvent};

/// Work currently dispatched for the head
struct InFlight {
    key: TaskKey,
    handle: JoinHandle<()>,
}

/// State owned by the running scheduler task
struct SchedulerInner {
    config: SchedulerConfig,
    default_work: Option<WorkFn>,
    chain: TaskChain,
    in_flight: Option<InFlight>,
    events: EventBus,
    stats: SchedulerStats,
    settle_tx: mpsc::WeakSender<SchedRequest>,
}

/// Single-consumer priority scheduler.
///
/// Build one with [`Scheduler::new`], hand out [`SchedulerHandle`]s, then
/// drive it with [`Scheduler::run`] (or both at once with [`Scheduler::spawn`]).
pub struct Scheduler {
    config: SchedulerConfig,
    default_work: Option<WorkFn>,
    tx: mpsc::Sender<SchedRequest>,
    rx: mpsc::Receiver<SchedRequest>,
    events: EventBus,
}

impl Scheduler {
    /// Create a new scheduler with the given configuration
    pub fn new(config: SchedulerConfig) -> Self {
        debug!(?config, "Scheduler::new: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        let events = EventBus::new(config.event_capacity);
        Self {
            config,
            default_work: None,
            tx,
            rx,
            events,
        }
    }

    /// Work function for tasks submitted without one
    pub fn with_default_work(mut self, work: WorkFn) -> Self {
        self.default_work = Some(work);
        self
    }

    /// Get a handle for submitting tasks and subscribing to events
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle::new(self.tx.clone(), self.events.clone())
    }

    /// Spawn the scheduler onto the current runtime and return a handle
    pub fn spawn(self) -> SchedulerHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    /// Run the scheduler task
    ///
    /// Consumes the Scheduler and runs until shutdown is requested or every
    /// handle has been dropped.
    pub async fn run(self) {
        let Self {
            config,
            default_work,
            tx,
            mut rx,
            events,
        } = self;

        let settle_tx = tx.downgrade();
        drop(tx);

        let mut inner = SchedulerInner {
            config,
            default_work,
            chain: TaskChain::new(),
            in_flight: None,
            events,
            stats: SchedulerStats::default(),
            settle_tx,
        };

        info!(scheduler = %inner.config.name, "Scheduler started");

        while let Some(req) = rx.recv().await {
            match req {
                SchedRequest::Enqueue {
                    params,
                    allow_duplicate,
                    reply_tx,
                } => {
                    let result = inner.enqueue(Task::from_params(params), allow_duplicate);
                    let _ = reply_tx.send(result);
                }

                SchedRequest::Skip { reply_tx } => {
                    let _ = reply_tx.send(inner.skip());
                }

                SchedRequest::Length { reply_tx } => {
                    let _ = reply_tx.send(inner.chain.len());
                }

                SchedRequest::Details { reply_tx } => {
                    let _ = reply_tx.send(inner.queue_details());
                }

                SchedRequest::Stats { reply_tx } => {
                    let _ = reply_tx.send(inner.stats.clone());
                }

                SchedRequest::Settled { key, result } => {
                    inner.settle(key, result);
                }

                SchedRequest::Shutdown => {
                    debug!(scheduler = %inner.config.name, "Scheduler::run: shutdown requested");
                    break;
                }
            }
        }

        if let Some(in_flight) = inner.in_flight.take() {
            in_flight.handle.abort();
        }
        info!(
            scheduler = %inner.config.name,
            remaining = inner.chain.len(),
            "Scheduler stopped"
        );
    }
}

impl SchedulerInner {
    fn enqueue(&mut self, task: Task, allow_duplicate: bool) -> Result<EnqueueResult, SchedulerError> {
        debug!(scheduler = %self.config.name, id = %task.id, priority = %task.priority, allow_duplicate, "enqueue: called");

        if !allow_duplicate && self.chain.is_tracked(&task.id) {
            warn!(
                scheduler = %self.config.name,
                id = %task.id,
                task_type = %task.task_type,
                "Duplicate task dropped"
            );
            self.stats.total_rejected += 1;
            self.events.emit(SchedulerEvent::Rejected { task: task.info() });
            return Ok(EnqueueResult::Duplicate { id: task.id });
        }

        let (_, placement) = self.chain.link(task);
        self.stats.total_enqueued += 1;
        self.stats.peak_length = self.stats.peak_length.max(self.chain.len());

        if self.chain.len() > self.config.high_water_mark {
            if let Some(head) = self.chain.head_task() {
                warn!(
                    scheduler = %self.config.name,
                    length = self.chain.len(),
                    head_id = %head.id,
                    head_type = %head.task_type,
                    head_attempts = head.attempts,
                    "Queue above high-water mark, consumers are not keeping up"
                );
            }
        }

        match placement {
            Placement::Head => {
                self.dispatch()?;
                Ok(EnqueueResult::Started)
            }
            Placement::Queued { position } => {
                debug!(scheduler = %self.config.name, position, "enqueue: linked behind head");
                Ok(EnqueueResult::Queued { position })
            }
        }
    }

    /// Start the head's work function
    fn dispatch(&mut self) -> Result<(), SchedulerError> {
        let Some(key) = self.chain.head() else {
            return Ok(());
        };
        let debug_all = self.config.debug_all_tasks;
        let Some(task) = self.chain.head_task_mut() else {
            return Ok(());
        };

        let Some(work) = task.resolve_work(self.default_work.as_ref()) else {
            let err = SchedulerError::MissingWorkFunction {
                id: task.id.clone(),
                task_type: task.task_type.clone(),
            };
            error!(scheduler = %self.config.name, %err, "Cannot dispatch task, queue stalled");
            self.events.emit(SchedulerEvent::DispatchFailed {
                task: task.info(),
                error: err.to_string(),
            });
            return Err(err);
        };

        if task.debug || debug_all {
            info!(
                scheduler = %self.config.name,
                task_type = %task.task_type,
                data = %task.data,
                "Running task"
            );
        }

        task.attempts += 1;
        let data = task.data.clone();
        let settle_tx = self.settle_tx.clone();

        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(async move { work(data).await }).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(TaskError::Panicked(panic_message(panic.as_ref()))),
            };
            if let Some(tx) = settle_tx.upgrade() {
                let _ = tx.send(SchedRequest::Settled { key, result }).await;
            }
        });

        self.in_flight = Some(InFlight { key, handle });
        Ok(())
    }

    fn settle(&mut self, key: TaskKey, result: Result<Value, TaskError>) {
        if self.in_flight.as_ref().map(|f| f.key) != Some(key) {
            debug!(scheduler = %self.config.name, ?key, "settle: occurrence no longer in flight, ignoring");
            return;
        }
        self.in_flight = None;

        match result {
            Ok(_) => self.advance(),
            Err(error) => self.fail(error),
        }
    }

    fn fail(&mut self, error: TaskError) {
        let Some(task) = self.chain.head_task() else {
            return;
        };
        self.stats.total_failed += 1;
        error!(
            scheduler = %self.config.name,
            id = %task.id,
            task_type = %task.task_type,
            %error,
            "Task failed"
        );

        if !task.retry_on_failure {
            error!(
                scheduler = %self.config.name,
                id = %task.id,
                "Task does not retry on failure, queue stalled at this head"
            );
            self.events.emit(SchedulerEvent::Failed {
                task: task.info(),
                error: error.to_string(),
                retrying: false,
            });
            return;
        }

        let mut retry = task.clone();
        retry.priority = retry.priority.demoted();
        self.events.emit(SchedulerEvent::Failed {
            task: task.info(),
            error: error.to_string(),
            retrying: true,
        });
        self.stats.total_retried += 1;

        match self.enqueue(retry, true) {
            Ok(result) => debug!(scheduler = %self.config.name, ?result, "fail: retry queued"),
            Err(err) => error!(scheduler = %self.config.name, %err, "fail: could not requeue retry"),
        }
        self.skip();
    }

    /// Retire the head without running its work
    fn skip(&mut self) -> SkipResult {
        let Some(task) = self.chain.head_task() else {
            error!(scheduler = %self.config.name, "Skip requested on an empty queue");
            return SkipResult::Empty;
        };
        let info = task.info();

        if let Some(in_flight) = self.in_flight.take() {
            warn!(scheduler = %self.config.name, id = %info.id, "Aborting in-flight work of skipped task");
            in_flight.handle.abort();
        }

        self.stats.total_skipped += 1;
        self.advance();
        SkipResult::Skipped(info)
    }

    /// Unlink the finished head, announce it, and start the next one
    fn advance(&mut self) {
        let Some(task) = self.chain.unlink_head() else {
            return;
        };
        self.stats.total_completed += 1;
        debug!(scheduler = %self.config.name, id = %task.id, remaining = self.chain.len(), "advance: task ready");
        self.events.emit(SchedulerEvent::Ready { task: task.info() });

        if self.chain.is_empty() {
            self.stats.drain_cycles += 1;
            info!(scheduler = %self.config.name, "Queue drained");
            self.events.emit(SchedulerEvent::Complete);
        } else if let Err(err) = self.dispatch() {
            debug!(scheduler = %self.config.name, %err, "advance: next head could not be dispatched");
        }
    }

    fn queue_details(&self) -> Vec<QueueEntry> {
        let head_status = if self.in_flight.is_some() {
            QueueEntryStatus::Running
        } else {
            QueueEntryStatus::Stalled
        };

        self.chain
            .iter()
            .enumerate()
            .map(|(i, task)| QueueEntry {
                task: task.info(),
                status: if i == 0 { head_status } else { QueueEntryStatus::Queued },
            })
            .collect()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
