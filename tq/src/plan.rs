//! Task plans: YAML descriptions of simulated work
//!
//! A plan lists tasks to submit, in order, to a fresh scheduler. Each task
//! sleeps for `delay-ms` and fails its first `fail-attempts` attempts, which
//! makes ordering, duplicate suppression and retry observable from the CLI.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, info, warn};

use crate::domain::{Priority, TaskId, TaskInfo, TaskParams, WorkFn, work_fn};
use crate::error::TaskError;
use crate::events::SchedulerEvent;
use crate::scheduler::{EnqueueResult, Scheduler, SchedulerConfig, SchedulerHandle, SchedulerStats};

/// Drain timeout when neither the plan nor the caller names one
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Ordered list of tasks to submit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPlan {
    /// How long to wait for the queue to drain
    #[serde(rename = "timeout-ms", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    pub tasks: Vec<PlannedTask>,
}

/// One simulated task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlannedTask {
    pub id: Option<TaskId>,
    pub task_type: Option<String>,
    pub priority: Option<Priority>,
    pub data: Value,
    pub delay_ms: u64,
    /// Number of leading attempts that fail
    pub fail_attempts: u32,
    pub retry_on_failure: bool,
    pub debug: bool,
    pub allow_duplicate: bool,
}

impl PlannedTask {
    /// Submission parameters with a simulated work function attached
    pub fn to_params(&self) -> TaskParams {
        TaskParams {
            task_type: self.task_type.clone(),
            id: self.id.clone(),
            data: self.data.clone(),
            priority: self.priority,
            work: Some(simulated_work(self.delay_ms, self.fail_attempts)),
            debug: self.debug,
            retry_on_failure: self.retry_on_failure,
        }
    }
}

fn simulated_work(delay_ms: u64, fail_attempts: u32) -> WorkFn {
    let attempts = Arc::new(AtomicU32::new(0));
    work_fn(move |data| {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            if attempt < fail_attempts {
                Err(TaskError::Failed(format!(
                    "simulated failure {} of {}",
                    attempt + 1,
                    fail_attempts
                )))
            } else {
                Ok(data)
            }
        }
    })
}

impl TaskPlan {
    /// Load a plan from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read plan file {}", path.display()))?;
        Self::from_yaml(&content).context(format!("Failed to parse plan file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Timeout from the plan, or the default
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    /// Upper bound on the events a run of this plan can publish.
    ///
    /// Each attempt yields at most a `Failed` and a `Ready`, each submission
    /// at most a `Rejected` and a `Complete`.
    pub fn event_budget(&self) -> usize {
        self.tasks
            .iter()
            .map(|t| (t.fail_attempts as usize).saturating_add(1).saturating_mul(2).saturating_add(2))
            .fold(0usize, usize::saturating_add)
    }
}

/// A failed attempt observed while running a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub task: TaskInfo,
    pub error: String,
    pub retrying: bool,
}

/// Outcome of running a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    /// Tasks in the order they became ready (skipped retry occurrences included)
    pub completed: Vec<TaskInfo>,
    pub rejected: Vec<TaskInfo>,
    pub failures: Vec<FailureRecord>,
    /// Queue did not drain before the timeout
    pub stalled: bool,
    /// Tasks still linked when the run ended
    pub remaining: usize,
    /// Events the report never saw because its receiver fell behind
    pub missed_events: u64,
    pub stats: SchedulerStats,
}

impl PlanReport {
    fn new() -> Self {
        Self {
            completed: Vec::new(),
            rejected: Vec::new(),
            failures: Vec::new(),
            stalled: false,
            remaining: 0,
            missed_events: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// Whether every published event made it into the report
    pub fn is_complete(&self) -> bool {
        self.missed_events == 0
    }

    fn record_lag(&mut self, missed: u64) {
        warn!(missed, "run_plan: event receiver lagged, report is incomplete");
        self.missed_events += missed;
    }

    /// Record whatever is already buffered without waiting
    fn collect_buffered(&mut self, rx: &mut broadcast::Receiver<SchedulerEvent>) {
        loop {
            match rx.try_recv() {
                Ok(event) => self.record(event),
                Err(TryRecvError::Lagged(missed)) => self.record_lag(missed),
                Err(_) => break,
            }
        }
    }

    fn record(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::Ready { task } => self.completed.push(task),
            SchedulerEvent::Rejected { task } => self.rejected.push(task),
            SchedulerEvent::Failed { task, error, retrying } => {
                self.failures.push(FailureRecord { task, error, retrying });
            }
            SchedulerEvent::DispatchFailed { task, error } => {
                self.failures.push(FailureRecord {
                    task,
                    error,
                    retrying: false,
                });
            }
            SchedulerEvent::Complete => {}
        }
    }
}

/// Submit every planned task to a fresh scheduler and wait for it to drain
pub async fn run_plan(plan: &TaskPlan, mut config: SchedulerConfig, timeout: Duration) -> Result<PlanReport> {
    info!(tasks = plan.tasks.len(), ?timeout, "run_plan: starting");

    // events are only read once submission finishes, so the bus must hold them all
    let budget = plan.event_budget();
    if budget > config.event_capacity {
        debug!(budget, capacity = config.event_capacity, "run_plan: growing event bus");
        config.event_capacity = budget;
    }

    let handle = Scheduler::new(config).spawn();
    let mut rx = handle.subscribe();
    let mut report = PlanReport::new();

    let mut accepted = 0usize;
    for planned in &plan.tasks {
        let params = planned.to_params();
        let result = if planned.allow_duplicate {
            handle.enqueue_duplicate(params).await
        } else {
            handle.enqueue(params).await
        };
        match result? {
            EnqueueResult::Duplicate { id } => debug!(%id, "run_plan: duplicate dropped"),
            other => {
                debug!(?other, "run_plan: accepted");
                accepted += 1;
            }
        }
    }

    if accepted > 0 {
        report.stalled = !wait_for_drain(&handle, &mut rx, &mut report, timeout).await?;
    }

    // everything emitted before the final length reply is already buffered
    report.collect_buffered(&mut rx);

    report.remaining = handle.length().await?;
    report.stats = handle.stats().await?;
    handle.shutdown().await?;

    info!(
        completed = report.completed.len(),
        stalled = report.stalled,
        missed_events = report.missed_events,
        remaining = report.remaining,
        "run_plan: finished"
    );
    Ok(report)
}

/// Record events until the chain is empty; false on timeout
async fn wait_for_drain(
    handle: &SchedulerHandle,
    rx: &mut broadcast::Receiver<SchedulerEvent>,
    report: &mut PlanReport,
    timeout: Duration,
) -> Result<bool> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let event = match tokio::time::timeout_at(deadline, rx.recv()).await {
            Err(_) => {
                warn!(?timeout, "run_plan: queue did not drain before timeout");
                return Ok(false);
            }
            Ok(Err(RecvError::Lagged(missed))) => {
                report.record_lag(missed);
                continue;
            }
            Ok(Err(RecvError::Closed)) => return Ok(false),
            Ok(Ok(event)) => event,
        };

        let drained = matches!(event, SchedulerEvent::Complete);
        report.record(event);
        if drained && handle.length().await? == 0 {
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(tasks: &[TaskInfo]) -> Vec<String> {
        tasks.iter().map(|t| t.id.to_string()).collect()
    }

    #[test]
    fn test_parse_plan() {
        let yaml = r#"
timeout-ms: 500
tasks:
  - id: A
    task-type: Fetch
    delay-ms: 20
    data: {url: "https://example.com"}
  - id: 7
    priority: 1
    fail-attempts: 2
    retry-on-failure: true
  - {}
"#;
        let plan = TaskPlan::from_yaml(yaml).unwrap();

        assert_eq!(plan.timeout(), Duration::from_millis(500));
        assert_eq!(plan.tasks.len(), 3);
        assert_eq!(plan.tasks[0].id, Some(TaskId::from("A")));
        assert_eq!(plan.tasks[0].data["url"], "https://example.com");
        assert_eq!(plan.tasks[1].id, Some(TaskId::from(7u64)));
        assert_eq!(plan.tasks[1].priority, Some(Priority::new(1)));
        assert!(plan.tasks[1].retry_on_failure);
        assert_eq!(plan.tasks[2], PlannedTask::default());
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(TaskPlan::default().timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[tokio::test]
    async fn test_simulated_work_fails_leading_attempts() {
        let work = simulated_work(0, 2);
        assert!(work(Value::Null).await.is_err());
        assert!(work(Value::Null).await.is_err());
        assert_eq!(work(Value::from(1)).await, Ok(Value::from(1)));
    }

    #[tokio::test]
    async fn test_run_plan_orders_by_priority() {
        let plan = TaskPlan::from_yaml(
            r#"
tasks:
  - {id: A, priority: 5, delay-ms: 50}
  - {id: B, priority: 1}
  - {id: C, priority: 5}
  - {id: C}
"#,
        )
        .unwrap();

        let report = run_plan(&plan, SchedulerConfig::default(), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!report.stalled);
        assert_eq!(ids(&report.completed), ["A", "B", "C"]);
        assert_eq!(ids(&report.rejected), ["C"]);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.stats.drain_cycles, 1);
    }

    #[tokio::test]
    async fn test_run_plan_reports_stall() {
        let plan = TaskPlan::from_yaml(
            r#"
tasks:
  - {id: broken, fail-attempts: 1}
  - {id: waiting}
"#,
        )
        .unwrap();

        let report = run_plan(&plan, SchedulerConfig::default(), Duration::from_millis(200))
            .await
            .unwrap();

        assert!(report.stalled);
        assert!(report.completed.is_empty());
        assert_eq!(report.remaining, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.failures[0].retrying);
    }

    #[tokio::test]
    async fn test_run_empty_plan() {
        let report = run_plan(&TaskPlan::default(), SchedulerConfig::default(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!report.stalled);
        assert!(report.completed.is_empty());
    }

    #[test]
    fn test_event_budget_covers_failures() {
        let plan = TaskPlan::from_yaml(
            r#"
tasks:
  - {id: a}
  - {id: b, fail-attempts: 2, retry-on-failure: true}
"#,
        )
        .unwrap();
        // one attempt for a, three for b, plus a Rejected and a Complete slot each
        assert_eq!(plan.event_budget(), 4 + 8);
        assert_eq!(TaskPlan::default().event_budget(), 0);
    }

    #[test]
    fn test_lagged_receiver_is_counted() {
        let (tx, mut rx) = broadcast::channel(2);
        for _ in 0..5 {
            tx.send(SchedulerEvent::Complete).unwrap();
        }

        let mut report = PlanReport::new();
        report.collect_buffered(&mut rx);

        assert_eq!(report.missed_events, 3);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_run_plan_larger_than_event_bus() {
        let tasks = (0..2000).map(|i| format!("  - {{id: t{i}}}\n")).collect::<String>();
        let plan = TaskPlan::from_yaml(&format!("tasks:\n{tasks}")).unwrap();

        let config = SchedulerConfig::default();
        assert!(plan.tasks.len() > config.event_capacity);

        let report = run_plan(&plan, config, Duration::from_secs(30)).await.unwrap();

        assert!(!report.stalled);
        assert!(report.is_complete());
        assert_eq!(report.completed.len() as u64, report.stats.total_completed);
        assert_eq!(report.completed.len(), 2000);
        assert_eq!(report.completed[0].id, TaskId::from("t0"));
        assert_eq!(report.completed[1999].id, TaskId::from("t1999"));
    }
}
