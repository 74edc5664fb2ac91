//! Ordered task chain and queue reporting types
//!
//! The chain is an arena of nodes addressed by [`TaskKey`], each owning its
//! task and the key of its successor. The head is the task executing (or
//! about to execute); new tasks are never linked in front of it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{Priority, Task, TaskId, TaskInfo};

/// Arena key for one linked occurrence of a task.
///
/// A retried task is linked again under a new key while its failed
/// occurrence is still the head, so ids alone cannot address nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TaskKey(u64);

/// Where a newly linked task landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Chain was empty; task is the new head
    Head,

    /// Linked behind the head; position 1 is directly after it
    Queued { position: usize },
}

/// Result of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Chain was idle; task was dispatched immediately
    Started,

    /// Waiting behind the head
    Queued { position: usize },

    /// Id already tracked; submission dropped
    Duplicate { id: TaskId },
}

/// Result of a skip request
#[derive(Debug, Clone, PartialEq)]
pub enum SkipResult {
    /// Head was retired without running its work
    Skipped(TaskInfo),

    /// Nothing to skip
    Empty,
}

struct Node {
    task: Task,
    next: Option<TaskKey>,
}

/// Singly linked, priority-ordered chain of tasks
#[derive(Default)]
pub(crate) struct TaskChain {
    nodes: HashMap<TaskKey, Node>,
    head: Option<TaskKey>,
    tail: Option<TaskKey>,
    len: usize,
    /// Ids rejected on plain submission; released when an occurrence retires
    tracked: HashSet<TaskId>,
    next_key: u64,
}

impl TaskChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Whether a plain submission with this id would be a duplicate
    pub fn is_tracked(&self, id: &TaskId) -> bool {
        self.tracked.contains(id)
    }

    pub fn head(&self) -> Option<TaskKey> {
        self.head
    }

    #[cfg(test)]
    pub fn tail(&self) -> Option<TaskKey> {
        self.tail
    }

    pub fn head_task(&self) -> Option<&Task> {
        self.head.and_then(|key| self.nodes.get(&key)).map(|node| &node.task)
    }

    pub fn head_task_mut(&mut self) -> Option<&mut Task> {
        self.head.and_then(|key| self.nodes.get_mut(&key)).map(|node| &mut node.task)
    }

    /// Tasks in chain order, head first
    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            cursor: self.head,
        }
    }

    /// Link a task into sorted position.
    ///
    /// Walks from the head past every successor whose priority is less than
    /// or equal to the new task's, so ties stay FIFO and the head is never
    /// displaced.
    pub fn link(&mut self, task: Task) -> (TaskKey, Placement) {
        let key = TaskKey(self.next_key);
        self.next_key += 1;

        self.tracked.insert(task.id.clone());
        self.len += 1;

        let Some(head) = self.head else {
            self.nodes.insert(key, Node { task, next: None });
            self.head = Some(key);
            self.tail = Some(key);
            return (key, Placement::Head);
        };

        let priority = task.priority;

        // behind the head the chain is sorted, so a tail at or below the new
        // priority means the walk would end there anyway
        if let Some(tail) = self.tail.filter(|t| *t != head) {
            if let Some(last) = self.nodes.get_mut(&tail).filter(|n| n.task.priority <= priority) {
                last.next = Some(key);
                self.nodes.insert(key, Node { task, next: None });
                self.tail = Some(key);
                return (key, Placement::Queued { position: self.len - 1 });
            }
        }

        let mut cursor = head;
        let mut position = 1;
        while let Some(next) = self.successor_at_or_below(cursor, priority) {
            cursor = next;
            position += 1;
        }

        let after = self.nodes.get_mut(&cursor).and_then(|node| node.next.replace(key));
        self.nodes.insert(key, Node { task, next: after });
        if after.is_none() {
            self.tail = Some(key);
        }

        (key, Placement::Queued { position })
    }

    fn successor_at_or_below(&self, key: TaskKey, priority: Priority) -> Option<TaskKey> {
        let next = self.nodes.get(&key)?.next?;
        let successor = self.nodes.get(&next)?;
        (successor.task.priority <= priority).then_some(next)
    }

    /// Remove the head, promoting its successor
    pub fn unlink_head(&mut self) -> Option<Task> {
        let key = self.head?;
        let node = self.nodes.remove(&key)?;

        self.tracked.remove(&node.task.id);

        self.head = node.next;
        self.len -= 1;
        if self.head.is_none() {
            self.tail = None;
        }

        Some(node.task)
    }
}

/// Iterator over a [`TaskChain`] in execution order
pub(crate) struct ChainIter<'a> {
    chain: &'a TaskChain,
    cursor: Option<TaskKey>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a Task;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.chain.nodes.get(&self.cursor?)?;
        self.cursor = node.next;
        Some(&node.task)
    }
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_enqueued: u64,
    pub total_rejected: u64,
    /// Ready completions, skips included
    pub total_completed: u64,
    pub total_skipped: u64,
    pub total_failed: u64,
    pub total_retried: u64,
    pub peak_length: usize,
    pub drain_cycles: u64,
}

/// Queue entry for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub task: TaskInfo,
    pub status: QueueEntryStatus,
}

/// Status of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEntryStatus {
    /// Head with work in flight
    Running,

    /// Head whose work settled without advancing the chain
    Stalled,

    Queued,
}
