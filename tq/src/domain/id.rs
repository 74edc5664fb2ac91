//! Task identity
//!
//! Callers may name a task (`"sync-users"`) or let the scheduler assign a
//! numeric id. Generated ids are microsecond timestamps, bumped past the last
//! one handed out so they stay unique and approximate submission order.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static LAST_GENERATED: AtomicU64 = AtomicU64::new(0);

/// Identity used for duplicate suppression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Seq(u64),
    Name(String),
}

impl TaskId {
    /// Generate a fresh, monotonically increasing id
    pub fn generate() -> Self {
        let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
        let mut last = LAST_GENERATED.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match LAST_GENERATED.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return Self::Seq(next),
                Err(current) => last = current,
            }
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seq(n) => write!(f, "{}", n),
            Self::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self::Name(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::Name(s.to_string())
    }
}

impl From<u64> for TaskId {
    fn from(n: u64) -> Self {
        Self::Seq(n)
    }
}
