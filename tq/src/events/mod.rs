//! Lifecycle events published by the scheduler

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use types::SchedulerEvent;
