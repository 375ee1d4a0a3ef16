/// Task status definitions for crawl runs
use std::fmt;

/// Represents the lifecycle state of a crawl task
///
/// A task is created `Running` and moves to exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Crawl has been requested and may still be in progress
    Running,

    /// Queue drained without a fatal error
    Success,

    /// Crawl aborted on a fatal error
    Failed,
}

impl TaskStatus {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// Only `Running -> Success` and `Running -> Failed` are allowed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(self, Self::Running) && next.is_terminal()
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(Self::Running),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
