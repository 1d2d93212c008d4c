//! Error types for scheduler operations.

use thiserror::Error;

use super::task::TaskToken;

/// Errors produced by the task service and registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Trigger specification could not be compiled (bad cron, zero period).
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
    /// A singleton task of this job type is already active.
    #[error("a task of type `{0}` is already running")]
    SingletonAlreadyActive(String),
    /// Token is unknown or its task has already reached a terminal state.
    #[error("task not found: {0}")]
    TaskNotFound(TaskToken),
    /// No job body is registered for this job type.
    #[error("unknown job type: {0}")]
    UnknownJobType(String),
    /// Task specification is malformed.
    #[error("invalid task spec: {0}")]
    InvalidSpec(String),
    /// The service has been shut down.
    #[error("task service has been shut down")]
    Shutdown,
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
