//! Audit sink implementations.
//!
//! Every lifecycle transition of a task is recorded as an [`AuditEvent`]. The
//! in-memory sink keeps a bounded ring and is what the admin layer (and the
//! test suite) read back.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::task::TaskToken;
use crate::util::clock::now_ms;

/// Lifecycle action recorded for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Task registered.
    Register,
    /// A firing started.
    Fire,
    /// A due fire was skipped.
    Skip,
    /// Pause requested.
    PauseRequested,
    /// Pause took effect.
    Paused,
    /// Resume requested.
    ResumeRequested,
    /// Task returned to running after a pause.
    Resumed,
    /// Stop requested.
    StopRequested,
    /// A firing (or the task) completed.
    Complete,
    /// A firing (or the task) failed.
    Fail,
    /// The task was cancelled.
    Cancel,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Register => "register",
            Self::Fire => "fire",
            Self::Skip => "skip",
            Self::PauseRequested => "pause_requested",
            Self::Paused => "paused",
            Self::ResumeRequested => "resume_requested",
            Self::Resumed => "resumed",
            Self::StopRequested => "stop_requested",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related task.
    pub token: TaskToken,
    /// Job type of the task.
    pub job_type: String,
    /// Action taken.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev. Clones share one buffer.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Actions recorded for one task, oldest first.
    #[must_use]
    pub fn actions_for(&self, token: &TaskToken) -> Vec<AuditAction> {
        self.events
            .lock()
            .iter()
            .filter(|e| &e.token == token)
            .map(|e| e.action)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that drops everything; used when no audit trail is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    token: TaskToken,
    job_type: impl Into<String>,
    action: AuditAction,
    detail: Option<String>,
) -> AuditEvent {
    let created_at_ms = now_ms();
    AuditEvent {
        event_id: format!("{token}-{action}-{created_at_ms}"),
        token,
        job_type: job_type.into(),
        action,
        created_at_ms,
        detail,
    }
}
