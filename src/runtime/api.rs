//! API-facing request/response models.

use serde::{Deserialize, Serialize};

use crate::core::{
    Attributes, SchedulerStats, TaskError, TaskOutcome, TaskService, TaskSnapshot, TaskSpec, TaskState,
    TaskToken, TriggerSpec,
};

/// Task submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Job type to run.
    pub job_type: String,
    /// When to fire; defaults to a single fire.
    #[serde(default = "default_trigger")]
    pub trigger: TriggerSpec,
    /// Reject if another task of the type is live.
    #[serde(default)]
    pub singleton: bool,
    /// Run once, immediately.
    #[serde(default)]
    pub manual: bool,
    /// Block until a single-fire task finishes.
    #[serde(default)]
    pub wait: bool,
    /// Opaque job parameters.
    #[serde(default)]
    pub attributes: Attributes,
}

const fn default_trigger() -> TriggerSpec {
    TriggerSpec::Manual
}

impl From<TaskSubmission> for TaskSpec {
    fn from(req: TaskSubmission) -> Self {
        Self {
            job_type: req.job_type,
            trigger: req.trigger,
            singleton: req.singleton,
            attributes: req.attributes,
            manual: req.manual,
        }
    }
}

/// Task status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// Task token.
    pub token: TaskToken,
    /// Current (or final) state.
    pub state: TaskState,
    /// Failure reason, if any.
    pub reason: Option<String>,
    /// Task bookkeeping; absent when built from a waited outcome.
    pub snapshot: Option<TaskSnapshot>,
}

impl TaskStatusResponse {
    /// Response built from a task snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: TaskSnapshot) -> Self {
        Self {
            token: snapshot.token,
            state: snapshot.state,
            reason: snapshot.last_error.clone(),
            snapshot: Some(snapshot),
        }
    }

    /// Response for a finished task.
    #[must_use]
    pub fn from_outcome(token: TaskToken, outcome: &TaskOutcome) -> Self {
        Self {
            token,
            state: outcome.state(),
            reason: outcome.error().map(str::to_string),
            snapshot: None,
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Live tasks.
    pub live_tasks: usize,
    /// Firing statistics.
    pub stats: SchedulerStats,
}

/// Submit a task described by an API payload.
///
/// # Errors
///
/// Any error from [`TaskService::start_task`].
pub fn submit_task(service: &TaskService, req: TaskSubmission) -> Result<TaskStatusResponse, TaskError> {
    let wait = req.wait;
    let (started, snapshot) = service.start_task_with_snapshot(req.into(), wait)?;
    if let Some(outcome) = &started.outcome {
        return Ok(TaskStatusResponse::from_outcome(started.token, outcome));
    }
    Ok(TaskStatusResponse::from_snapshot(snapshot))
}

/// Status of a live task.
///
/// # Errors
///
/// Returns `TaskError::TaskNotFound` for unknown or finished tokens.
pub fn task_status(service: &TaskService, token: &TaskToken) -> Result<TaskStatusResponse, TaskError> {
    service
        .get_task(token)
        .map(TaskStatusResponse::from_snapshot)
        .ok_or(TaskError::TaskNotFound(*token))
}

/// Return a health payload.
#[must_use]
pub fn health(service: &TaskService) -> Health {
    Health {
        ok: !service.is_shutdown(),
        live_tasks: service.active_tasks().len(),
        stats: service.stats(),
    }
}
