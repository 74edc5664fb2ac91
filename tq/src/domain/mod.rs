//! Domain types for the task scheduler

mod id;
mod priority;
mod task;

pub use id::TaskId;
pub use priority::Priority;
pub use task::{DEFAULT_TASK_TYPE, Task, TaskInfo, TaskParams, WorkFn, WorkFuture, sync_work_fn, work_fn};
