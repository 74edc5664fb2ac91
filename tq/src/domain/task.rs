//! Task records and work functions

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Priority, TaskId};
use crate::error::TaskError;

/// Task type used when a submission does not name one
pub const DEFAULT_TASK_TYPE: &str = "AppTask";

/// Future produced by a work function
pub type WorkFuture = BoxFuture<'static, Result<Value, TaskError>>;

/// Callable invoked with a task's payload
pub type WorkFn = Arc<dyn Fn(Value) -> WorkFuture + Send + Sync>;

/// Wrap an async closure as a work function
pub fn work_fn<F, Fut>(f: F) -> WorkFn
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    Arc::new(move |data| f(data).boxed())
}

/// Wrap a plain closure as a work function.
///
/// The return value is delivered as an already-resolved future, so the
/// scheduler handles it exactly like asynchronous work.
pub fn sync_work_fn<F>(f: F) -> WorkFn
where
    F: Fn(Value) -> Result<Value, TaskError> + Send + Sync + 'static,
{
    Arc::new(move |data| futures::future::ready(f(data)).boxed())
}

/// Parameters for a task submission. Every field is optional.
#[derive(Clone, Default)]
pub struct TaskParams {
    pub task_type: Option<String>,
    pub id: Option<TaskId>,
    pub data: Value,
    pub priority: Option<Priority>,
    pub work: Option<WorkFn>,
    pub debug: bool,
    pub retry_on_failure: bool,
}

impl TaskParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn work(mut self, work: WorkFn) -> Self {
        self.work = Some(work);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn retry_on_failure(mut self, retry: bool) -> Self {
        self.retry_on_failure = retry;
        self
    }
}

impl std::fmt::Debug for TaskParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskParams")
            .field("task_type", &self.task_type)
            .field("id", &self.id)
            .field("data", &self.data)
            .field("priority", &self.priority)
            .field("has_work", &self.work.is_some())
            .field("debug", &self.debug)
            .field("retry_on_failure", &self.retry_on_failure)
            .finish()
    }
}

/// A unit of schedulable work with its defaults filled in
#[derive(Clone)]
pub struct Task {
    pub id: TaskId,
    pub task_type: String,
    pub data: Value,
    pub priority: Priority,
    pub debug: bool,
    pub retry_on_failure: bool,
    /// Number of times the work function has been dispatched
    pub attempts: u32,
    work: Option<WorkFn>,
}

impl Task {
    /// Normalize submission parameters, generating an id if none was given
    pub fn from_params(params: TaskParams) -> Self {
        Self {
            id: params.id.unwrap_or_else(TaskId::generate),
            task_type: params.task_type.unwrap_or_else(|| DEFAULT_TASK_TYPE.to_string()),
            data: params.data,
            priority: params.priority.unwrap_or_default(),
            debug: params.debug,
            retry_on_failure: params.retry_on_failure,
            attempts: 0,
            work: params.work,
        }
    }

    pub fn has_work(&self) -> bool {
        self.work.is_some()
    }

    /// The task's own work function, falling back to `default`
    pub fn resolve_work(&self, default: Option<&WorkFn>) -> Option<WorkFn> {
        self.work.clone().or_else(|| default.cloned())
    }

    /// Serializable snapshot for events and listings
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id.clone(),
            task_type: self.task_type.clone(),
            priority: self.priority,
            data: self.data.clone(),
            attempts: self.attempts,
        }
    }
}

impl From<TaskParams> for Task {
    fn from(params: TaskParams) -> Self {
        Self::from_params(params)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("task_type", &self.task_type)
            .field("priority", &self.priority)
            .field("attempts", &self.attempts)
            .field("retry_on_failure", &self.retry_on_failure)
            .finish_non_exhaustive()
    }
}

/// Snapshot of a task at the moment an event was emitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    #[serde(rename = "task-type")]
    pub task_type: String,
    pub priority: Priority,
    pub data: Value,
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_applied() {
        let task = Task::from_params(TaskParams::new());

        assert_eq!(task.task_type, DEFAULT_TASK_TYPE);
        assert_eq!(task.priority, Priority::NEUTRAL);
        assert_eq!(task.data, Value::Null);
        assert!(matches!(task.id, TaskId::Seq(_)));
        assert!(!task.retry_on_failure);
        assert!(!task.has_work());
    }

    #[test]
    fn test_builder_fields_are_kept() {
        let task: Task = TaskParams::new()
            .id("report")
            .task_type("Report")
            .priority(2)
            .data(json!({"month": 3}))
            .retry_on_failure(true)
            .debug(true)
            .into();

        assert_eq!(task.id, TaskId::from("report"));
        assert_eq!(task.task_type, "Report");
        assert_eq!(task.priority, Priority::new(2));
        assert_eq!(task.data["month"], 3);
        assert!(task.retry_on_failure);
        assert!(task.debug);
    }

    #[test]
    fn test_resolve_work_prefers_own_function() {
        let own = sync_work_fn(|_| Ok(json!("own")));
        let fallback = sync_work_fn(|_| Ok(json!("default")));

        let task = Task::from_params(TaskParams::new().work(own));
        let work = task.resolve_work(Some(&fallback)).unwrap();
        assert_eq!(futures::executor::block_on(work(Value::Null)), Ok(json!("own")));

        let bare = Task::from_params(TaskParams::new());
        let work = bare.resolve_work(Some(&fallback)).unwrap();
        assert_eq!(futures::executor::block_on(work(Value::Null)), Ok(json!("default")));

        assert!(bare.resolve_work(None).is_none());
    }

    #[tokio::test]
    async fn test_async_work_fn_receives_payload() {
        let work = work_fn(|data| async move {
            tokio::task::yield_now().await;
            Ok(json!(data["n"].as_i64().unwrap_or_default() * 2))
        });

        assert_eq!(work(json!({"n": 21})).await, Ok(json!(42)));
    }

    #[test]
    fn test_info_snapshot_serializes() {
        let task = Task::from_params(TaskParams::new().id("snap").priority(1));
        let yaml = serde_yaml::to_string(&task.info()).unwrap();

        assert!(yaml.contains("id: snap"));
        assert!(yaml.contains("task-type: AppTask"));
        assert!(yaml.contains("priority: 1"));
    }
}
