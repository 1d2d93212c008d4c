//! Task specification and runtime state types.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque attribute bag handed to job bodies.
pub type Attributes = HashMap<String, serde_json::Value>;

/// Process-unique handle identifying one task for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskToken(Uuid);

impl TaskToken {
    /// Allocate a fresh token. Tokens are random v4 UUIDs and never reused.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TaskToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// When a task fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TriggerSpec {
    /// Standard five, six or seven field cron expression.
    Cron {
        /// Cron expression text.
        expression: String,
    },
    /// Fixed period, first fire after `initial_delay`.
    Interval {
        /// Delay between registration and the first fire.
        initial_delay: Duration,
        /// Delay between consecutive fires.
        period: Duration,
    },
    /// Fire once, as soon as the task is registered.
    Manual,
}

impl TriggerSpec {
    /// Cron trigger.
    pub fn cron(expression: impl Into<String>) -> Self {
        Self::Cron {
            expression: expression.into(),
        }
    }

    /// Interval trigger.
    #[must_use]
    pub const fn interval(initial_delay: Duration, period: Duration) -> Self {
        Self::Interval {
            initial_delay,
            period,
        }
    }
}

/// Immutable description of a task, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Selects the job body and groups singleton tasks.
    pub job_type: String,
    /// Firing schedule.
    pub trigger: TriggerSpec,
    /// At most one live task of this job type.
    pub singleton: bool,
    /// Data passed to the job body on every firing.
    #[serde(default)]
    pub attributes: Attributes,
    /// Fire exactly once, immediately, outside the dispatcher loop.
    #[serde(default)]
    pub manual: bool,
}

impl TaskSpec {
    /// A manual-trigger, non-singleton spec for `job_type`.
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            trigger: TriggerSpec::Manual,
            singleton: false,
            attributes: Attributes::new(),
            manual: false,
        }
    }

    /// Set the trigger.
    #[must_use]
    pub fn with_trigger(mut self, trigger: TriggerSpec) -> Self {
        self.trigger = trigger;
        self
    }

    /// Mark the job type singleton.
    #[must_use]
    pub const fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Mark the task as a manual run.
    #[must_use]
    pub const fn manual(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    /// Add one attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether the task keeps firing after a successful run.
    #[must_use]
    pub const fn is_repeating(&self) -> bool {
        !self.manual && !matches!(self.trigger, TriggerSpec::Manual)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for its next fire.
    Scheduled,
    /// A firing is executing.
    Running,
    /// Pause requested and observed (at a checkpoint, or while idle).
    Paused,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped or cancelled.
    Cancelled,
}

impl TaskState {
    /// Terminal states never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result of a single firing, or of a task as a whole once terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TaskOutcome {
    /// Body returned normally.
    Completed,
    /// Body returned an error or panicked.
    Failed {
        /// Rendered error chain.
        error: String,
    },
    /// Body unwound after a checkpoint reported a stop request.
    Cancelled,
}

impl TaskOutcome {
    /// Terminal state matching this outcome.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        match self {
            Self::Completed => TaskState::Completed,
            Self::Failed { .. } => TaskState::Failed,
            Self::Cancelled => TaskState::Cancelled,
        }
    }

    /// Error message for failed outcomes.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Point-in-time copy of a task's bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task token.
    pub token: TaskToken,
    /// Job type.
    pub job_type: String,
    /// Current state.
    pub state: TaskState,
    /// Outstanding pause requests.
    pub pause_depth: u32,
    /// Whether a stop has been requested.
    pub stop_requested: bool,
    /// Whether the task is a singleton.
    pub singleton: bool,
    /// Whether the task keeps firing after each run.
    pub repeating: bool,
    /// Firings started so far.
    pub fire_count: u64,
    /// Fires skipped because the previous one was still running or the task was paused.
    pub skipped_fires: u64,
    /// Firings that ended with an error.
    pub failed_fires: u64,
    /// Last error raised by the body.
    pub last_error: Option<String>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Start of the latest firing.
    pub last_fired_at: Option<DateTime<Utc>>,
    /// Next scheduled fire, if known.
    pub next_fire_at: Option<DateTime<Utc>>,
}

/// Result of [`TaskService::start_task`](crate::core::TaskService::start_task).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedTask {
    /// Token of the new task.
    pub token: TaskToken,
    /// Outcome of the single firing, present for waited manual runs.
    pub outcome: Option<TaskOutcome>,
}
