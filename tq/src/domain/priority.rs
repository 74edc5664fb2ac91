//! Priority values for task ordering

use serde::{Deserialize, Serialize};

/// Priority of a queued task. Smaller values run sooner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    /// Neutral priority assigned when a submission does not name one
    pub const NEUTRAL: Self = Self(5);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    /// Priority after one failed attempt.
    ///
    /// Values below neutral move one step toward it; neutral and above are
    /// left where they are.
    pub fn demoted(self) -> Self {
        if self < Self::NEUTRAL { Self(self.0 + 1) } else { self }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .map(Self)
            .map_err(|_| format!("Invalid priority: {}", s))
    }
}
