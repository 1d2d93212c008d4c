//! Cooperative pause/stop primitive handed to job bodies.
//!
//! A job body calls [`Checkpoint::checkpoint`] at safe points (once per batch,
//! file or record). That call is the only place where a pause takes effect and
//! the only place a stop request is observed: a body that never checkpoints
//! can be neither paused nor stopped.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::audit::AuditAction;
use super::registry::TaskEntry;
use super::task::{TaskState, TaskToken};

/// Handle bound to one task, passed to its job body on every firing.
#[derive(Clone)]
pub struct Checkpoint {
    entry: Arc<TaskEntry>,
}

impl Checkpoint {
    pub(crate) const fn new(entry: Arc<TaskEntry>) -> Self {
        Self { entry }
    }

    /// Token of the task this checkpoint belongs to.
    #[must_use]
    pub fn token(&self) -> TaskToken {
        self.entry.token
    }

    /// Observe pause and stop requests.
    ///
    /// Returns `true` when the body must unwind and return now. While pause
    /// requests are outstanding the calling thread blocks here, with the task
    /// reported as `Paused`; it continues once every pause has been resumed,
    /// or returns `true` if a stop arrives while it is parked.
    #[must_use]
    pub fn checkpoint(&self) -> bool {
        let entry = &self.entry;
        let mut ctl = entry.control.lock();
        loop {
            if ctl.stop_requested {
                if !ctl.stop_observed {
                    ctl.stop_observed = true;
                    debug!(token = %entry.token, "checkpoint observed stop request");
                }
                return true;
            }
            if ctl.pause_depth == 0 {
                if ctl.state == TaskState::Paused {
                    ctl.state = TaskState::Running;
                    entry.record(AuditAction::Resumed, Some("checkpoint".into()));
                    entry.signal.notify_all();
                }
                return false;
            }
            if ctl.state != TaskState::Paused {
                ctl.state = TaskState::Paused;
                entry.record(AuditAction::Paused, Some(format!("depth={}", ctl.pause_depth)));
                entry.signal.notify_all();
                debug!(token = %entry.token, depth = ctl.pause_depth, "task paused at checkpoint");
            }
            entry.signal.wait(&mut ctl);
        }
    }

    /// Non-blocking peek at the stop flag.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.entry.control.lock().stop_requested
    }

    /// Whether a checkpoint of the current firing has reported a stop.
    pub(crate) fn stop_observed(&self) -> bool {
        self.entry.control.lock().stop_observed
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint").field("token", &self.entry.token).finish()
    }
}
