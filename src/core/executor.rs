//! Task executor: runs one firing of a job body on a dedicated worker thread.
//!
//! Each firing gets its own OS thread so a body parked at a checkpoint never
//! starves other job types, and the dispatcher never waits on business logic.
//!
//! # Design Principles
//!
//! - **No polling**: bodies park on the task's `Condvar` while paused
//! - **Contained failures**: errors and panics become a `Failed` outcome
//! - **No retries**: the next scheduled fire is the retry

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::checkpoint::Checkpoint;
use super::error::TaskError;
use super::job::JobBody;
use super::registry::{TaskEntry, TaskRegistry};
use super::task::{Attributes, TaskOutcome};

/// Statistics about firings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Firings currently executing (including paused ones).
    pub active_firings: u64,
    /// Firings started.
    pub started_firings: u64,
    /// Firings that completed.
    pub completed_firings: u64,
    /// Firings that failed.
    pub failed_firings: u64,
    /// Firings that unwound after a stop request.
    pub cancelled_firings: u64,
    /// Due fires dropped because the previous firing was still running.
    pub skipped_fires: u64,
}

/// Internal counters for scheduler statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct FiringCounters {
    pub active: AtomicU64,
    pub started: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub skipped: AtomicU64,
}

impl FiringCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            active_firings: self.active.load(Ordering::Relaxed),
            started_firings: self.started.load(Ordering::Relaxed),
            completed_firings: self.completed.load(Ordering::Relaxed),
            failed_firings: self.failed.load(Ordering::Relaxed),
            cancelled_firings: self.cancelled.load(Ordering::Relaxed),
            skipped_fires: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &TaskOutcome) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        let counter = match outcome {
            TaskOutcome::Completed => &self.completed,
            TaskOutcome::Failed { .. } => &self.failed,
            TaskOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Worker thread settings.
#[derive(Debug, Clone)]
pub(crate) struct WorkerSettings {
    pub thread_name_prefix: String,
    pub stack_size: usize,
}

/// Launches firings and reports their outcomes to the registry.
pub(crate) struct TaskExecutor {
    registry: Arc<TaskRegistry>,
    settings: WorkerSettings,
    counters: Arc<FiringCounters>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskExecutor {
    pub fn new(registry: Arc<TaskRegistry>, settings: WorkerSettings, counters: Arc<FiringCounters>) -> Self {
        Self {
            registry,
            settings,
            counters,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Run one firing of `entry` on a new worker thread.
    ///
    /// If the thread cannot be spawned the firing is reported as failed.
    pub fn launch(&self, entry: Arc<TaskEntry>, body: Arc<dyn JobBody>) -> Result<(), TaskError> {
        let token = entry.token;
        let registry = Arc::clone(&self.registry);
        let counters = Arc::clone(&self.counters);
        counters.started.fetch_add(1, Ordering::Relaxed);
        counters.active.fetch_add(1, Ordering::Relaxed);

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.settings.thread_name_prefix, entry.spec.job_type))
            .stack_size(self.settings.stack_size)
            .spawn(move || {
                let checkpoint = Checkpoint::new(Arc::clone(&entry));
                debug!(token = %token, job_type = %entry.spec.job_type, "worker executing firing");
                let outcome = run_firing(body.as_ref(), &entry.spec.attributes, &checkpoint);
                match &outcome {
                    TaskOutcome::Completed => debug!(token = %token, "firing completed"),
                    TaskOutcome::Cancelled => info!(token = %token, "firing cancelled at checkpoint"),
                    TaskOutcome::Failed { error } => warn!(token = %token, error = %error, "firing failed"),
                }
                counters.record(&outcome);
                registry.report_outcome(&token, outcome);
            });

        match spawned {
            Ok(handle) => {
                let mut workers = self.workers.lock();
                workers.retain(|w| !w.is_finished());
                workers.push(handle);
                Ok(())
            }
            Err(e) => {
                error!(token = %token, error = %e, "failed to spawn worker thread");
                let outcome = TaskOutcome::Failed {
                    error: format!("failed to spawn worker: {e}"),
                };
                self.counters.record(&outcome);
                self.registry.report_outcome(&token, outcome);
                Err(TaskError::Spawn(e.to_string()))
            }
        }
    }

    /// Join worker threads, waiting at most `timeout` for each one.
    ///
    /// Workers that don't exit in time are detached; a body that never
    /// checkpoints cannot be interrupted.
    pub fn join_workers(&self, timeout: Duration) {
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        let worker_count = workers.len();
        for (idx, worker) in workers.into_iter().enumerate() {
            let (tx, rx) = std::sync::mpsc::channel();
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });
            match rx.recv_timeout(timeout) {
                Ok(true) => debug!(worker = idx, "worker joined"),
                Ok(false) => warn!(worker = idx, "worker panicked"),
                Err(_) => {
                    warn!(worker = idx, "worker did not exit within timeout - detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }
        debug!(worker_count, "workers joined");
    }
}

/// Invoke the body once and classify the result.
///
/// A pause requested before the firing began takes hold here, before the
/// body runs.
pub(crate) fn run_firing(body: &dyn JobBody, attributes: &Attributes, checkpoint: &Checkpoint) -> TaskOutcome {
    if checkpoint.checkpoint() {
        return TaskOutcome::Cancelled;
    }
    match panic::catch_unwind(AssertUnwindSafe(|| body.run(attributes, checkpoint))) {
        Ok(Ok(())) if checkpoint.stop_observed() => TaskOutcome::Cancelled,
        Ok(Ok(())) => TaskOutcome::Completed,
        Ok(Err(e)) => TaskOutcome::Failed {
            error: format!("{e:#}"),
        },
        Err(payload) => TaskOutcome::Failed {
            error: format!("job panicked: {}", panic_message(payload.as_ref())),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}
