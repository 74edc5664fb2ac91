//! Priority scheduler
//!
//! Runs one task at a time in priority order (lower first, FIFO among equal
//! priorities), suppresses duplicate ids, and re-queues failed tasks that opt
//! into retry.

mod config;
mod core;
mod handle;
mod messages;
mod queue;

pub use config::SchedulerConfig;
pub use core::Scheduler;
pub use handle::SchedulerHandle;
pub use queue::{EnqueueResult, QueueEntry, QueueEntryStatus, SchedulerStats, SkipResult};
