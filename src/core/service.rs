//! `TaskService`: the public facade over registry, dispatcher and executor.
//!
//! The service is a cheap, cloneable handle. Every clone talks to the same
//! registry and dispatcher; the dispatcher thread is told to exit when the
//! last handle is dropped, but only [`TaskService::shutdown`] joins threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::audit::AuditSink;
use super::dispatcher::Dispatcher;
use super::error::TaskError;
use super::executor::{FiringCounters, SchedulerStats, TaskExecutor, WorkerSettings};
use super::job::JobCatalog;
use super::registry::{TaskEntry, TaskRegistry};
use super::status::StatusHolder;
use super::task::{StartedTask, TaskOutcome, TaskSnapshot, TaskSpec, TaskToken};
use super::trigger::CompiledTrigger;
use crate::config::SchedulerConfig;

struct ServiceInner {
    config: SchedulerConfig,
    registry: Arc<TaskRegistry>,
    catalog: Arc<JobCatalog>,
    executor: Arc<TaskExecutor>,
    dispatcher: Dispatcher,
    counters: Arc<FiringCounters>,
    shutdown: AtomicBool,
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        // Signal only; joining here could hang on a body that never checkpoints
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.dispatcher.signal_shutdown();
            debug!("task service dropped without explicit shutdown - workers will be detached");
        }
    }
}

/// In-process task scheduler and lifecycle manager.
#[derive(Clone)]
pub struct TaskService {
    inner: Arc<ServiceInner>,
}

impl TaskService {
    /// Start a service: spawns the dispatcher thread.
    ///
    /// Most callers go through [`crate::builders::TaskServiceBuilder`].
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidSpec` if the configuration is invalid and
    /// `TaskError::Spawn` if the dispatcher thread cannot be started.
    pub fn new(
        config: SchedulerConfig,
        catalog: JobCatalog,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, TaskError> {
        config
            .validate()
            .map_err(|e| TaskError::InvalidSpec(format!("config invalid: {e}")))?;

        let registry = Arc::new(TaskRegistry::new(audit));
        let catalog = Arc::new(catalog);
        let counters = Arc::new(FiringCounters::default());
        let executor = Arc::new(TaskExecutor::new(
            Arc::clone(&registry),
            WorkerSettings {
                thread_name_prefix: config.worker_thread_prefix.clone(),
                stack_size: config.worker_stack_size,
            },
            Arc::clone(&counters),
        ));
        let dispatcher = Dispatcher::spawn(
            &config.dispatcher_thread_name,
            Arc::clone(&registry),
            Arc::clone(&catalog),
            Arc::clone(&executor),
            Arc::clone(&counters),
        )?;
        info!(job_types = ?catalog.job_types(), "task service started");

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                registry,
                catalog,
                executor,
                dispatcher,
                counters,
                shutdown: AtomicBool::new(false),
            }),
        })
    }

    /// Register a task and, depending on its trigger, run or schedule it.
    ///
    /// Manual tasks run at once on a worker thread; with `wait` this call
    /// blocks until the task finishes and the outcome is returned in
    /// [`StartedTask::outcome`]. `wait` also applies to single-fire
    /// scheduled tasks. Repeating tasks are never waited on here.
    ///
    /// # Errors
    ///
    /// - `TaskError::Shutdown` after [`shutdown`](Self::shutdown)
    /// - `TaskError::UnknownJobType` if no body is registered for the job type
    /// - `TaskError::InvalidTrigger` for a malformed or never-firing trigger
    /// - `TaskError::SingletonAlreadyActive` on a singleton collision
    /// - `TaskError::Spawn` if a manual task's worker cannot be started
    pub fn start_task(&self, spec: TaskSpec, wait: bool) -> Result<StartedTask, TaskError> {
        let entry = self.launch(spec)?;
        let outcome = if wait && !entry.spec.is_repeating() {
            entry.wait_terminal()
        } else {
            None
        };
        Ok(StartedTask {
            token: entry.token,
            outcome,
        })
    }

    /// Like [`start_task`](Self::start_task), also returning a snapshot taken
    /// once the call is done.
    ///
    /// The snapshot is read from the task itself, so it is present even when
    /// the task has already finished and left the registry; in that case it
    /// carries the terminal state and any failure in `last_error`.
    ///
    /// # Errors
    ///
    /// Same as `start_task`.
    pub fn start_task_with_snapshot(
        &self,
        spec: TaskSpec,
        wait: bool,
    ) -> Result<(StartedTask, TaskSnapshot), TaskError> {
        let entry = self.launch(spec)?;
        let outcome = if wait && !entry.spec.is_repeating() {
            entry.wait_terminal()
        } else {
            None
        };
        let snapshot = entry.snapshot();
        Ok((
            StartedTask {
                token: entry.token,
                outcome,
            },
            snapshot,
        ))
    }

    /// Validate, register and either launch or schedule a task.
    fn launch(&self, spec: TaskSpec) -> Result<Arc<TaskEntry>, TaskError> {
        let inner = &self.inner;
        if inner.shutdown.load(Ordering::Acquire) {
            return Err(TaskError::Shutdown);
        }
        if spec.job_type.trim().is_empty() {
            return Err(TaskError::InvalidSpec("job type must not be empty".into()));
        }
        let body = inner
            .catalog
            .get(&spec.job_type)
            .ok_or_else(|| TaskError::UnknownJobType(spec.job_type.clone()))?;

        let trigger = if spec.manual {
            CompiledTrigger::Manual
        } else {
            CompiledTrigger::compile(&spec.trigger)?
        };
        let manual = spec.manual;
        let entry = inner.registry.register_entry(spec, trigger)?;
        let token = entry.token;

        if manual {
            inner.executor.launch(Arc::clone(&entry), body)?;
        } else {
            let Some(due) = entry.snapshot().next_fire_at else {
                inner.registry.request_stop(&token, false);
                return Err(TaskError::InvalidTrigger("trigger never fires".into()));
            };
            if let Err(e) = inner.dispatcher.schedule(token, due) {
                inner.registry.request_stop(&token, false);
                return Err(e);
            }
        }
        Ok(entry)
    }

    /// Pre-check whether a manual singleton run of `job_type` could start
    /// right now.
    ///
    /// Returns `false` and records an error in `status` if the job type is
    /// unknown or any task of the type is live, since either would make the
    /// singleton start fail. The answer can be stale by the time `start_task`
    /// runs; `start_task` re-checks atomically.
    pub fn check_can_start_manual_task(&self, job_type: &str, status: &mut StatusHolder) -> bool {
        if !self.inner.catalog.contains(job_type) {
            status.error(format!("unknown job type `{job_type}`"));
            return false;
        }
        let live = self.inner.registry.active_tokens_of_type(job_type);
        if !live.is_empty() {
            status.error(format!("a task of type `{job_type}` is already running"));
            debug!(job_type, live = live.len(), "manual start pre-check refused");
            return false;
        }
        true
    }

    /// Add one pause request to a task.
    ///
    /// With `wait`, blocks until the body has parked at a checkpoint (or the
    /// task is not running a firing, or the pause was resumed meanwhile).
    ///
    /// # Errors
    ///
    /// Returns `TaskError::TaskNotFound` for unknown or finished tokens.
    pub fn pause_task(&self, token: &TaskToken, wait: bool) -> Result<(), TaskError> {
        self.inner.registry.request_pause(token)?;
        if wait {
            match self.inner.registry.wait_for_pause(token) {
                // finished while we were waiting
                Ok(_) | Err(TaskError::TaskNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Remove one pause request. Returns `true` when this call let the task
    /// continue.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::TaskNotFound` for unknown or finished tokens.
    pub fn resume_task(&self, token: &TaskToken) -> Result<bool, TaskError> {
        self.inner.registry.request_resume(token)
    }

    /// Ask a task to stop; with `wait`, block until it is terminal.
    /// Unknown tokens are ignored. Returns whether the token was live.
    pub fn stop_task(&self, token: &TaskToken, wait: bool) -> bool {
        self.inner.registry.request_stop(token, wait)
    }

    /// Stop every live task of `job_type`.
    pub fn cancel_tasks(&self, job_type: &str, wait: bool) {
        info!(job_type, wait, "cancelling tasks of type");
        self.inner.registry.cancel_all_of_type(job_type, wait);
    }

    /// Stop every live task. Idempotent.
    pub fn cancel_all_tasks(&self, wait: bool) {
        info!(wait, "cancelling all tasks");
        self.inner.registry.cancel_all(wait);
    }

    /// Pause every live task of `job_type`. Returns how many were paused.
    pub fn pause_tasks(&self, job_type: &str, wait: bool) -> usize {
        self.inner
            .registry
            .active_tokens_of_type(job_type)
            .iter()
            .filter(|token| self.pause_task(token, wait).is_ok())
            .count()
    }

    /// Resume every live task of `job_type` once. Returns how many continued.
    pub fn resume_tasks(&self, job_type: &str) -> usize {
        self.inner
            .registry
            .active_tokens_of_type(job_type)
            .iter()
            .filter(|token| matches!(self.resume_task(token), Ok(true)))
            .count()
    }

    /// Block until the task is terminal and return its outcome.
    ///
    /// `None` if the token is unknown, including tasks that already finished.
    #[must_use]
    pub fn wait_for_task_completion(&self, token: &TaskToken) -> Option<TaskOutcome> {
        self.inner.registry.wait_for_completion(token)
    }

    /// Snapshot of a live task.
    #[must_use]
    pub fn get_task(&self, token: &TaskToken) -> Option<TaskSnapshot> {
        self.inner.registry.lookup(token)
    }

    /// Snapshots of every live task.
    #[must_use]
    pub fn active_tasks(&self) -> Vec<TaskSnapshot> {
        self.inner.registry.snapshots()
    }

    /// Whether any live task of `job_type` exists.
    #[must_use]
    pub fn has_active_task(&self, job_type: &str) -> bool {
        !self.inner.registry.active_tokens_of_type(job_type).is_empty()
    }

    /// Firing statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.counters.snapshot()
    }

    /// Job types with a registered body, sorted.
    #[must_use]
    pub fn job_types(&self) -> Vec<String> {
        self.inner.catalog.job_types()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Shut the service down.
    ///
    /// Rejects new tasks, cancels live ones when configured to, stops the
    /// dispatcher and joins worker threads, waiting at most the configured
    /// timeout for each. Idempotent.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        if inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(live_tasks = inner.registry.len(), "shutting down task service");
        if inner.config.cancel_tasks_on_shutdown {
            inner.registry.cancel_all(false);
        } else if !inner.registry.is_empty() {
            warn!(live_tasks = inner.registry.len(), "shutting down with live tasks");
        }
        inner.dispatcher.shutdown();
        inner.executor.join_workers(inner.config.shutdown_timeout());
        info!("task service shut down complete");
    }

    /// Async variant of [`start_task`](Self::start_task); a blocking wait runs
    /// on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Same as `start_task`.
    #[cfg(feature = "tokio-runtime")]
    pub async fn start_task_async(&self, spec: TaskSpec, wait: bool) -> Result<StartedTask, TaskError> {
        let entry = self.launch(spec)?;
        let token = entry.token;
        let outcome = if wait && !entry.spec.is_repeating() {
            tokio::task::spawn_blocking(move || entry.wait_terminal())
                .await
                .ok()
                .flatten()
        } else {
            None
        };
        Ok(StartedTask { token, outcome })
    }

    /// Async variant of [`wait_for_task_completion`](Self::wait_for_task_completion).
    #[cfg(feature = "tokio-runtime")]
    pub async fn wait_for_task_completion_async(&self, token: &TaskToken) -> Option<TaskOutcome> {
        let entry = self.inner.registry.entry(token)?;
        tokio::task::spawn_blocking(move || entry.wait_terminal())
            .await
            .ok()
            .flatten()
    }

    /// Async variant of [`stop_task`](Self::stop_task).
    #[cfg(feature = "tokio-runtime")]
    pub async fn stop_task_async(&self, token: &TaskToken, wait: bool) -> bool {
        if !self.stop_task(token, false) {
            return false;
        }
        if wait {
            let _ = self.wait_for_task_completion_async(token).await;
        }
        true
    }
}
