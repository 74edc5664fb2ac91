//! taskqueue - single-consumer priority task scheduler
//!
//! Accepts units of deferred work, each with a priority, and runs exactly one
//! at a time: lowest priority value first, first-in-first-out among equals.
//!
//! # Core Concepts
//!
//! - **One at a time**: a new submission never preempts the running head
//! - **Uniform completion**: sync and async work settle through one future type
//! - **Duplicate suppression**: a queued id rejects resubmission unless bypassed
//! - **Opt-in retry**: failed tasks can be demoted and re-queued
//!
//! # Modules
//!
//! - [`domain`] - Task ids, priorities, task records and work functions
//! - [`scheduler`] - The ordered chain and the scheduler task that drives it
//! - [`events`] - `Ready`/`Complete` lifecycle signals
//! - [`plan`] - YAML task plans with simulated work
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod plan;
pub mod scheduler;

// Re-export commonly used types
pub use config::Config;
pub use domain::{Priority, Task, TaskId, TaskInfo, TaskParams, WorkFn, WorkFuture, sync_work_fn, work_fn};
pub use error::{SchedulerError, TaskError};
pub use events::{EventBus, SchedulerEvent};
pub use plan::{PlanReport, PlannedTask, TaskPlan, run_plan};
pub use scheduler::{
    EnqueueResult, QueueEntry, QueueEntryStatus, Scheduler, SchedulerConfig, SchedulerHandle, SchedulerStats,
    SkipResult,
};
