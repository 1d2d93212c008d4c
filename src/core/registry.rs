//! Task registry: the only owner of task bookkeeping.
//!
//! Two lock levels are used:
//! - one `Mutex` over the token and job-type indices (registration, reaping)
//! - one `Mutex` + `Condvar` per task over its control block (state, pause depth,
//!   stop flag); checkpoints and waiters only ever touch this level
//!
//! Lock order is index → task control → audit sink. Nothing takes the index
//! lock while holding a task lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::audit::{build_audit_event, AuditAction, AuditSink};
use super::error::TaskError;
use super::task::{TaskOutcome, TaskSnapshot, TaskSpec, TaskState, TaskToken};
use super::trigger::CompiledTrigger;

/// Mutable per-task bookkeeping, guarded by the task's own mutex.
#[derive(Debug)]
pub(crate) struct TaskControl {
    pub(crate) state: TaskState,
    pub(crate) pause_depth: u32,
    pub(crate) stop_requested: bool,
    /// A checkpoint of the current firing returned "must stop".
    pub(crate) stop_observed: bool,
    /// A firing is executing (possibly parked at a checkpoint).
    pub(crate) in_flight: bool,
    /// The trigger has no further fire times.
    pub(crate) exhausted: bool,
    fire_count: u64,
    skipped_fires: u64,
    failed_fires: u64,
    last_error: Option<String>,
    last_fired_at: Option<DateTime<Utc>>,
    next_fire_at: Option<DateTime<Utc>>,
    outcome: Option<TaskOutcome>,
}

/// A registered task: immutable spec plus its guarded control block.
pub(crate) struct TaskEntry {
    pub(crate) token: TaskToken,
    pub(crate) spec: Arc<TaskSpec>,
    pub(crate) trigger: CompiledTrigger,
    created_at: DateTime<Utc>,
    pub(crate) control: Mutex<TaskControl>,
    /// Broadcast on every state change; completion and pause waiters park here.
    pub(crate) signal: Condvar,
    audit: Arc<dyn AuditSink>,
}

impl TaskEntry {
    pub(crate) fn record(&self, action: AuditAction, detail: Option<String>) {
        self.audit
            .record(build_audit_event(self.token, self.spec.job_type.as_str(), action, detail));
    }

    fn snapshot_locked(&self, ctl: &TaskControl) -> TaskSnapshot {
        TaskSnapshot {
            token: self.token,
            job_type: self.spec.job_type.clone(),
            state: ctl.state,
            pause_depth: ctl.pause_depth,
            stop_requested: ctl.stop_requested,
            singleton: self.spec.singleton,
            repeating: self.spec.is_repeating(),
            fire_count: ctl.fire_count,
            skipped_fires: ctl.skipped_fires,
            failed_fires: ctl.failed_fires,
            last_error: ctl.last_error.clone(),
            created_at: self.created_at,
            last_fired_at: ctl.last_fired_at,
            next_fire_at: ctl.next_fire_at,
        }
    }

    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        let ctl = self.control.lock();
        self.snapshot_locked(&ctl)
    }

    /// Block until the task is terminal and return its final outcome.
    pub(crate) fn wait_terminal(&self) -> Option<TaskOutcome> {
        let mut ctl = self.control.lock();
        while !ctl.state.is_terminal() {
            self.signal.wait(&mut ctl);
        }
        ctl.outcome.clone()
    }

    /// Block while a requested pause has not yet taken hold of a running firing.
    fn wait_paused(&self) -> TaskState {
        let mut ctl = self.control.lock();
        while ctl.state == TaskState::Running && ctl.pause_depth > 0 {
            self.signal.wait(&mut ctl);
        }
        ctl.state
    }
}

/// What the dispatcher should do with a due fire.
pub(crate) enum FireDecision {
    /// Hand the task to an executor.
    Start(Arc<TaskEntry>),
    /// Previous firing still in flight, or the task is paused; this tick is dropped.
    Skip,
    /// Task is terminal or unknown; forget it.
    Gone,
}

#[derive(Default)]
struct RegistryIndex {
    tasks: HashMap<TaskToken, Arc<TaskEntry>>,
    by_type: HashMap<String, HashSet<TaskToken>>,
}

impl RegistryIndex {
    fn has_singleton_conflict(&self, spec: &TaskSpec) -> bool {
        let Some(tokens) = self.by_type.get(&spec.job_type) else {
            return false;
        };
        if tokens.is_empty() {
            return false;
        }
        spec.singleton
            || tokens
                .iter()
                .filter_map(|t| self.tasks.get(t))
                .any(|e| e.spec.singleton)
    }

    fn remove(&mut self, token: &TaskToken, job_type: &str) {
        self.tasks.remove(token);
        if let Some(tokens) = self.by_type.get_mut(job_type) {
            tokens.remove(token);
            if tokens.is_empty() {
                self.by_type.remove(job_type);
            }
        }
    }
}

/// In-memory registry of live tasks.
pub struct TaskRegistry {
    index: Mutex<RegistryIndex>,
    audit: Arc<dyn AuditSink>,
}

impl TaskRegistry {
    /// Create an empty registry reporting lifecycle events to `audit`.
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            index: Mutex::new(RegistryIndex::default()),
            audit,
        }
    }

    /// Register a task and return its token.
    ///
    /// The singleton check and the insert happen under one critical section.
    /// Manual tasks are registered already running; everything else starts
    /// scheduled.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::SingletonAlreadyActive` when the job type already
    /// has a live singleton task (or a singleton is requested while any task of
    /// the type is live).
    pub fn register(&self, spec: TaskSpec, trigger: CompiledTrigger) -> Result<TaskToken, TaskError> {
        self.register_entry(spec, trigger).map(|e| e.token)
    }

    pub(crate) fn register_entry(
        &self,
        spec: TaskSpec,
        trigger: CompiledTrigger,
    ) -> Result<Arc<TaskEntry>, TaskError> {
        let now = Utc::now();
        let manual = spec.manual;
        let mut index = self.index.lock();
        if index.has_singleton_conflict(&spec) {
            debug!(job_type = %spec.job_type, "singleton task already active");
            return Err(TaskError::SingletonAlreadyActive(spec.job_type));
        }

        let token = TaskToken::generate();
        let control = TaskControl {
            state: if manual { TaskState::Running } else { TaskState::Scheduled },
            pause_depth: 0,
            stop_requested: false,
            stop_observed: false,
            in_flight: manual,
            exhausted: manual,
            fire_count: u64::from(manual),
            skipped_fires: 0,
            failed_fires: 0,
            last_error: None,
            last_fired_at: manual.then_some(now),
            next_fire_at: if manual { None } else { trigger.first_fire_time(now) },
            outcome: None,
        };
        let entry = Arc::new(TaskEntry {
            token,
            spec: Arc::new(spec),
            trigger,
            created_at: now,
            control: Mutex::new(control),
            signal: Condvar::new(),
            audit: Arc::clone(&self.audit),
        });
        index
            .by_type
            .entry(entry.spec.job_type.clone())
            .or_default()
            .insert(token);
        index.tasks.insert(token, Arc::clone(&entry));
        drop(index);

        entry.record(AuditAction::Register, None);
        if manual {
            entry.record(AuditAction::Fire, Some("manual".into()));
        }
        info!(
            token = %token,
            job_type = %entry.spec.job_type,
            singleton = entry.spec.singleton,
            manual,
            "task registered"
        );
        Ok(entry)
    }

    pub(crate) fn entry(&self, token: &TaskToken) -> Option<Arc<TaskEntry>> {
        self.index.lock().tasks.get(token).cloned()
    }

    /// Snapshot of a live task.
    pub fn lookup(&self, token: &TaskToken) -> Option<TaskSnapshot> {
        self.entry(token).map(|e| e.snapshot())
    }

    /// Snapshots of every live task.
    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        let entries: Vec<_> = self.index.lock().tasks.values().cloned().collect();
        entries.iter().map(|e| e.snapshot()).collect()
    }

    /// Tokens of live tasks of one job type.
    pub fn active_tokens_of_type(&self, job_type: &str) -> Vec<TaskToken> {
        self.index
            .lock()
            .by_type
            .get(job_type)
            .map(|tokens| tokens.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Tokens of every live task.
    pub fn active_tokens(&self) -> Vec<TaskToken> {
        self.index.lock().tasks.keys().copied().collect()
    }

    /// Whether a live singleton task of `job_type` exists.
    pub fn has_active_singleton(&self, job_type: &str) -> bool {
        let index = self.index.lock();
        index
            .by_type
            .get(job_type)
            .is_some_and(|tokens| tokens.iter().filter_map(|t| index.tasks.get(t)).any(|e| e.spec.singleton))
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.index.lock().tasks.len()
    }

    /// Whether no task is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add one pause request. Never blocks.
    ///
    /// A task that is not executing a firing becomes `Paused` immediately; a
    /// running firing pauses at its next checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::TaskNotFound` for unknown or terminal tokens.
    pub fn request_pause(&self, token: &TaskToken) -> Result<(), TaskError> {
        let entry = self.entry(token).ok_or(TaskError::TaskNotFound(*token))?;
        let mut ctl = entry.control.lock();
        if ctl.state.is_terminal() {
            return Err(TaskError::TaskNotFound(*token));
        }
        ctl.pause_depth = ctl.pause_depth.saturating_add(1);
        entry.record(AuditAction::PauseRequested, Some(format!("depth={}", ctl.pause_depth)));
        if ctl.state == TaskState::Scheduled {
            ctl.state = TaskState::Paused;
            entry.record(AuditAction::Paused, Some("idle".into()));
        }
        entry.signal.notify_all();
        debug!(token = %token, depth = ctl.pause_depth, state = %ctl.state, "pause requested");
        Ok(())
    }

    /// Remove one pause request.
    ///
    /// Returns `true` only when the depth reached zero and the task was
    /// `Paused`, i.e. this call is the one that let it continue. Resuming a
    /// task with no outstanding pause is a no-op returning `false`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::TaskNotFound` for unknown or terminal tokens.
    pub fn request_resume(&self, token: &TaskToken) -> Result<bool, TaskError> {
        let entry = self.entry(token).ok_or(TaskError::TaskNotFound(*token))?;
        let mut ctl = entry.control.lock();
        if ctl.state.is_terminal() {
            return Err(TaskError::TaskNotFound(*token));
        }
        if ctl.pause_depth == 0 {
            debug!(token = %token, "resume without outstanding pause ignored");
            return Ok(false);
        }
        ctl.pause_depth -= 1;
        entry.record(AuditAction::ResumeRequested, Some(format!("depth={}", ctl.pause_depth)));
        if ctl.pause_depth > 0 || ctl.state != TaskState::Paused {
            return Ok(false);
        }
        ctl.state = if ctl.in_flight {
            TaskState::Running
        } else {
            TaskState::Scheduled
        };
        entry.record(AuditAction::Resumed, None);
        entry.signal.notify_all();
        info!(token = %token, state = %ctl.state, "task resumed");
        Ok(true)
    }

    /// Ask a task to stop. Unknown tokens are ignored; returns whether the
    /// token was live.
    ///
    /// A task with no firing in flight is cancelled on the spot. A running or
    /// paused firing is told to stop at its next checkpoint; stop always wins
    /// over pause. With `wait`, blocks until the task is terminal.
    pub fn request_stop(&self, token: &TaskToken, wait: bool) -> bool {
        let Some(entry) = self.entry(token) else {
            return false;
        };
        {
            let mut index = self.index.lock();
            let mut ctl = entry.control.lock();
            if !ctl.state.is_terminal() {
                if !ctl.stop_requested {
                    ctl.stop_requested = true;
                    entry.record(AuditAction::StopRequested, Some(format!("state={}", ctl.state)));
                    info!(token = %token, state = %ctl.state, "stop requested");
                }
                if !ctl.in_flight {
                    Self::finalize(&mut index, &entry, &mut ctl, TaskOutcome::Cancelled);
                }
                entry.signal.notify_all();
            }
        }
        if wait {
            entry.wait_terminal();
        }
        true
    }

    /// Stop every live task of `job_type`, optionally waiting for all of them.
    pub fn cancel_all_of_type(&self, job_type: &str, wait: bool) {
        let tokens = self.active_tokens_of_type(job_type);
        self.stop_many(&tokens, wait);
    }

    /// Stop every live task.
    pub fn cancel_all(&self, wait: bool) {
        let tokens = self.active_tokens();
        self.stop_many(&tokens, wait);
    }

    fn stop_many(&self, tokens: &[TaskToken], wait: bool) {
        let entries: Vec<_> = tokens.iter().filter_map(|t| self.entry(t)).collect();
        for entry in &entries {
            self.request_stop(&entry.token, false);
        }
        if wait {
            for entry in &entries {
                entry.wait_terminal();
            }
        }
    }

    /// Block until a pause requested on `token` has taken hold (or became moot).
    ///
    /// # Errors
    ///
    /// Returns `TaskError::TaskNotFound` for unknown tokens.
    pub fn wait_for_pause(&self, token: &TaskToken) -> Result<TaskState, TaskError> {
        let entry = self.entry(token).ok_or(TaskError::TaskNotFound(*token))?;
        Ok(entry.wait_paused())
    }

    /// Block until the task is terminal. `None` when the token is unknown.
    pub fn wait_for_completion(&self, token: &TaskToken) -> Option<TaskOutcome> {
        self.entry(token).and_then(|e| e.wait_terminal())
    }

    /// Decide whether a due fire starts, and compute the next fire time.
    ///
    /// The next fire is computed from the scheduled `due` time; if that lands
    /// in the past (the dispatcher ran late) it is recomputed from `now`, so
    /// missed ticks are coalesced.
    pub(crate) fn begin_firing(
        &self,
        token: &TaskToken,
        due: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> (FireDecision, Option<DateTime<Utc>>) {
        let Some(entry) = self.entry(token) else {
            return (FireDecision::Gone, None);
        };
        let mut ctl = entry.control.lock();
        if ctl.state.is_terminal() || ctl.stop_requested {
            return (FireDecision::Gone, None);
        }

        let next = match entry.trigger.next_fire_time(due) {
            Some(next) if next <= now => entry.trigger.next_fire_time(now),
            other => other,
        };
        ctl.next_fire_at = next;
        ctl.exhausted = next.is_none();

        if ctl.in_flight {
            ctl.skipped_fires += 1;
            entry.record(AuditAction::Skip, Some("previous firing still running".into()));
            warn!(
                token = %token,
                job_type = %entry.spec.job_type,
                skipped = ctl.skipped_fires,
                "previous firing still running, skipping fire"
            );
            if ctl.exhausted {
                // the running firing is the last one; it reaps the task
                debug!(token = %token, "trigger exhausted while firing");
            }
            return (FireDecision::Skip, next);
        }

        if ctl.state == TaskState::Paused && next.is_some() {
            ctl.skipped_fires += 1;
            entry.record(AuditAction::Skip, Some("paused".into()));
            debug!(token = %token, depth = ctl.pause_depth, "task paused, skipping fire");
            return (FireDecision::Skip, next);
        }

        // A paused task whose trigger is exhausted still starts its last
        // firing; it parks at the first checkpoint until resumed or stopped.
        ctl.in_flight = true;
        ctl.stop_observed = false;
        ctl.fire_count += 1;
        ctl.last_fired_at = Some(now);
        if ctl.state == TaskState::Scheduled {
            ctl.state = TaskState::Running;
        }
        entry.record(AuditAction::Fire, Some(format!("fire={}", ctl.fire_count)));
        entry.signal.notify_all();
        drop(ctl);
        (FireDecision::Start(entry), next)
    }

    /// Record the outcome of one firing.
    ///
    /// Non-repeating tasks, exhausted triggers, cancellations and stop
    /// requests make the task terminal: it leaves both indices (freeing its
    /// singleton slot) and completion waiters wake. Otherwise a repeating task
    /// goes back to `Scheduled`, or `Paused` if a pause is still outstanding;
    /// a failed firing is recorded and the next fire is the retry.
    pub fn report_outcome(&self, token: &TaskToken, outcome: TaskOutcome) {
        let Some(entry) = self.entry(token) else {
            warn!(token = %token, "outcome reported for unknown task");
            return;
        };
        let mut index = self.index.lock();
        let mut ctl = entry.control.lock();
        if ctl.state.is_terminal() {
            return;
        }
        ctl.in_flight = false;
        if let TaskOutcome::Failed { error } = &outcome {
            ctl.failed_fires += 1;
            ctl.last_error = Some(error.clone());
        }

        let repeating = entry.spec.is_repeating();
        let terminal = !repeating
            || ctl.stop_requested
            || ctl.exhausted
            || outcome == TaskOutcome::Cancelled;
        if terminal {
            let outcome = if repeating && ctl.stop_requested && outcome == TaskOutcome::Completed {
                TaskOutcome::Cancelled
            } else {
                outcome
            };
            Self::finalize(&mut index, &entry, &mut ctl, outcome);
            return;
        }
        drop(index);

        match &outcome {
            TaskOutcome::Failed { error } => {
                entry.record(AuditAction::Fail, Some(error.clone()));
                warn!(token = %token, job_type = %entry.spec.job_type, error = %error, "firing failed; retrying on next fire");
            }
            _ => entry.record(AuditAction::Complete, None),
        }
        ctl.state = if ctl.pause_depth > 0 {
            TaskState::Paused
        } else {
            TaskState::Scheduled
        };
        entry.signal.notify_all();
        debug!(token = %token, state = %ctl.state, "firing finished");
    }

    /// Move a task to its terminal state, reap it and wake every waiter.
    fn finalize(
        index: &mut MutexGuard<'_, RegistryIndex>,
        entry: &TaskEntry,
        ctl: &mut TaskControl,
        outcome: TaskOutcome,
    ) {
        let action = match &outcome {
            TaskOutcome::Completed => AuditAction::Complete,
            TaskOutcome::Failed { error } => {
                ctl.last_error = Some(error.clone());
                AuditAction::Fail
            }
            TaskOutcome::Cancelled => AuditAction::Cancel,
        };
        ctl.state = outcome.state();
        ctl.next_fire_at = None;
        ctl.outcome = Some(outcome);
        index.remove(&entry.token, &entry.spec.job_type);
        entry.record(action, ctl.last_error.clone().filter(|_| action == AuditAction::Fail));
        entry.signal.notify_all();
        info!(
            token = %entry.token,
            job_type = %entry.spec.job_type,
            state = %ctl.state,
            "task finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit::InMemoryAuditSink;
    use crate::core::task::TriggerSpec;
    use std::time::Duration;

    fn registry() -> (TaskRegistry, InMemoryAuditSink) {
        let sink = InMemoryAuditSink::new(256);
        (TaskRegistry::new(Arc::new(sink.clone())), sink)
    }

    fn interval_spec(job_type: &str) -> (TaskSpec, CompiledTrigger) {
        let spec = TaskSpec::new(job_type).with_trigger(TriggerSpec::interval(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let trigger = CompiledTrigger::compile(&spec.trigger).unwrap();
        (spec, trigger)
    }

    fn manual_spec(job_type: &str, singleton: bool) -> (TaskSpec, CompiledTrigger) {
        let spec = TaskSpec::new(job_type).singleton(singleton).manual(true);
        (spec, CompiledTrigger::Manual)
    }

    #[test]
    fn test_singleton_collision_rejected() {
        let (registry, _) = registry();
        let (spec, trigger) = manual_spec("gc", true);
        registry.register(spec.clone(), trigger.clone()).unwrap();
        let err = registry.register(spec, trigger).unwrap_err();
        assert_eq!(err, TaskError::SingletonAlreadyActive("gc".into()));
    }

    #[test]
    fn test_non_singleton_blocked_by_live_singleton() {
        let (registry, _) = registry();
        let (spec, trigger) = manual_spec("gc", true);
        registry.register(spec, trigger).unwrap();
        let (spec, trigger) = manual_spec("gc", false);
        assert!(registry.register(spec, trigger).is_err());
    }

    #[test]
    fn test_failed_manual_task_frees_slot() {
        let (registry, _) = registry();
        let (spec, trigger) = manual_spec("backup", true);
        let token = registry.register(spec.clone(), trigger.clone()).unwrap();
        registry.report_outcome(&token, TaskOutcome::Failed { error: "disk full".into() });
        assert!(registry.lookup(&token).is_none());
        assert!(!registry.has_active_singleton("backup"));
        registry.register(spec, trigger).unwrap();
    }

    #[test]
    fn test_idle_pause_and_resume() {
        let (registry, sink) = registry();
        let (spec, trigger) = interval_spec("index");
        let token = registry.register(spec, trigger).unwrap();

        registry.request_pause(&token).unwrap();
        registry.request_pause(&token).unwrap();
        assert_eq!(registry.lookup(&token).unwrap().state, TaskState::Paused);

        assert!(!registry.request_resume(&token).unwrap());
        assert_eq!(registry.lookup(&token).unwrap().state, TaskState::Paused);
        assert!(registry.request_resume(&token).unwrap());
        assert_eq!(registry.lookup(&token).unwrap().state, TaskState::Scheduled);

        // over-resume is a no-op
        assert!(!registry.request_resume(&token).unwrap());
        assert_eq!(registry.lookup(&token).unwrap().pause_depth, 0);

        let resumed = sink
            .actions_for(&token)
            .into_iter()
            .filter(|a| *a == AuditAction::Resumed)
            .count();
        assert_eq!(resumed, 1);
    }

    #[test]
    fn test_pause_unknown_token() {
        let (registry, _) = registry();
        let token = TaskToken::generate();
        assert_eq!(registry.request_pause(&token), Err(TaskError::TaskNotFound(token)));
        assert_eq!(registry.request_resume(&token), Err(TaskError::TaskNotFound(token)));
        assert!(!registry.request_stop(&token, true));
        assert!(registry.wait_for_completion(&token).is_none());
    }

    #[test]
    fn test_stop_idle_task_cancels_immediately() {
        let (registry, _) = registry();
        let (spec, trigger) = interval_spec("replication");
        let token = registry.register(spec, trigger).unwrap();
        let entry = registry.entry(&token).unwrap();
        assert!(registry.request_stop(&token, true));
        assert_eq!(entry.wait_terminal(), Some(TaskOutcome::Cancelled));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_overlapping_fire_is_skipped() {
        let (registry, _) = registry();
        let (spec, trigger) = interval_spec("gc");
        let token = registry.register(spec, trigger).unwrap();
        let now = Utc::now();

        let (first, next) = registry.begin_firing(&token, now, now);
        assert!(matches!(first, FireDecision::Start(_)));
        assert!(next.is_some());
        let (second, _) = registry.begin_firing(&token, now, now);
        assert!(matches!(second, FireDecision::Skip));

        registry.report_outcome(&token, TaskOutcome::Completed);
        let snapshot = registry.lookup(&token).unwrap();
        assert_eq!(snapshot.state, TaskState::Scheduled);
        assert_eq!(snapshot.fire_count, 1);
        assert_eq!(snapshot.skipped_fires, 1);
    }

    #[test]
    fn test_paused_idle_task_skips_fires() {
        let (registry, sink) = registry();
        let (spec, trigger) = interval_spec("index");
        let token = registry.register(spec, trigger).unwrap();
        registry.request_pause(&token).unwrap();

        let now = Utc::now();
        let (decision, next) = registry.begin_firing(&token, now, now);
        assert!(matches!(decision, FireDecision::Skip));
        assert!(next.is_some());
        let snapshot = registry.lookup(&token).unwrap();
        assert_eq!(snapshot.fire_count, 0);
        assert_eq!(snapshot.skipped_fires, 1);
        assert!(sink.actions_for(&token).contains(&AuditAction::Skip));

        assert!(registry.request_resume(&token).unwrap());
        let (decision, _) = registry.begin_firing(&token, now, now);
        assert!(matches!(decision, FireDecision::Start(_)));
    }

    #[test]
    fn test_paused_single_fire_task_still_starts() {
        let (registry, _) = registry();
        let spec = TaskSpec::new("export");
        let token = registry.register(spec, CompiledTrigger::Manual).unwrap();
        registry.request_pause(&token).unwrap();

        let now = Utc::now();
        let (decision, next) = registry.begin_firing(&token, now, now);
        assert!(matches!(decision, FireDecision::Start(_)));
        assert!(next.is_none());
        assert_eq!(registry.lookup(&token).unwrap().state, TaskState::Paused);
    }

    #[test]
    fn test_repeating_failure_keeps_schedule() {
        let (registry, _) = registry();
        let (spec, trigger) = interval_spec("gc");
        let token = registry.register(spec, trigger).unwrap();
        let now = Utc::now();
        let _ = registry.begin_firing(&token, now, now);
        registry.report_outcome(&token, TaskOutcome::Failed { error: "transient".into() });
        let snapshot = registry.lookup(&token).unwrap();
        assert_eq!(snapshot.state, TaskState::Scheduled);
        assert_eq!(snapshot.failed_fires, 1);
        assert_eq!(snapshot.last_error.as_deref(), Some("transient"));
    }

    #[test]
    fn test_late_dispatch_coalesces_missed_ticks() {
        let (registry, _) = registry();
        let (spec, trigger) = interval_spec("gc");
        let token = registry.register(spec, trigger).unwrap();
        let now = Utc::now();
        let long_ago = now - chrono::Duration::minutes(10);
        let (_, next) = registry.begin_firing(&token, long_ago, now);
        assert!(next.unwrap() > now);
    }

    #[test]
    fn test_stop_during_firing_waits_for_report() {
        let (registry, _) = registry();
        let registry = Arc::new(registry);
        let (spec, trigger) = interval_spec("gc");
        let token = registry.register(spec, trigger).unwrap();
        let now = Utc::now();
        let _ = registry.begin_firing(&token, now, now);

        let reporter = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                registry.report_outcome(&token, TaskOutcome::Completed);
            })
        };
        let entry = registry.entry(&token).unwrap();
        registry.request_stop(&token, true);
        assert_eq!(entry.wait_terminal(), Some(TaskOutcome::Cancelled));
        reporter.join().unwrap();
    }
}
