//! Dispatcher: the single timing loop.
//!
//! One named thread owns the [`FireQueue`]. It sleeps on its command channel
//! with `recv_deadline(next due)`, so new schedules wake it early and due fires
//! wake it on time, without polling. Job bodies never run on this thread.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::error::TaskError;
use super::executor::{FiringCounters, TaskExecutor};
use super::fire_queue::FireQueue;
use super::job::JobCatalog;
use super::registry::{FireDecision, TaskRegistry};
use super::task::{TaskOutcome, TaskToken};
use crate::util::clock;

/// Messages accepted by the dispatcher thread.
#[derive(Debug)]
pub(crate) enum DispatchCommand {
    /// Add a pending fire.
    Schedule { token: TaskToken, due: DateTime<Utc> },
    /// Exit the loop.
    Shutdown,
}

/// Everything the loop needs, moved onto the dispatcher thread.
struct DispatchLoop {
    rx: Receiver<DispatchCommand>,
    queue: FireQueue,
    registry: Arc<TaskRegistry>,
    catalog: Arc<JobCatalog>,
    executor: Arc<TaskExecutor>,
    counters: Arc<FiringCounters>,
}

/// Handle to the dispatcher thread.
pub(crate) struct Dispatcher {
    tx: Sender<DispatchCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start the dispatcher thread.
    pub fn spawn(
        thread_name: &str,
        registry: Arc<TaskRegistry>,
        catalog: Arc<JobCatalog>,
        executor: Arc<TaskExecutor>,
        counters: Arc<FiringCounters>,
    ) -> Result<Self, TaskError> {
        let (tx, rx) = unbounded();
        let dispatch = DispatchLoop {
            rx,
            queue: FireQueue::new(),
            registry,
            catalog,
            executor,
            counters,
        };
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || dispatch.run())
            .map_err(|e| TaskError::Spawn(e.to_string()))?;
        info!(thread = thread_name, "dispatcher started");
        Ok(Self {
            tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queue a fire for `token` at `due`.
    pub fn schedule(&self, token: TaskToken, due: DateTime<Utc>) -> Result<(), TaskError> {
        self.tx
            .send(DispatchCommand::Schedule { token, due })
            .map_err(|_| TaskError::Shutdown)
    }

    /// Stop the loop and join the thread. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(DispatchCommand::Shutdown);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("dispatcher thread panicked");
            }
        }
    }

    /// Ask the loop to exit without joining it.
    pub fn signal_shutdown(&self) {
        let _ = self.tx.send(DispatchCommand::Shutdown);
    }
}

impl DispatchLoop {
    fn run(mut self) {
        debug!("dispatcher loop running");
        loop {
            let received = match self.queue.next_due() {
                Some(due) => self.rx.recv_deadline(Instant::now() + clock::until(due)),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(DispatchCommand::Schedule { token, due }) => {
                    debug!(token = %token, due = %due, "fire scheduled");
                    self.queue.push(token, due);
                }
                Ok(DispatchCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.fire_due(Utc::now());
        }
        info!(pending = self.queue.len(), "dispatcher loop exiting");
    }

    /// Start (or skip) every fire that is due and enqueue each task's next fire.
    fn fire_due(&mut self, now: DateTime<Utc>) {
        for fire in self.queue.pop_due(now) {
            let (decision, next) = self.registry.begin_firing(&fire.token, fire.due, now);
            if !matches!(decision, FireDecision::Gone) {
                if let Some(next) = next {
                    self.queue.push(fire.token, next);
                }
            }
            match decision {
                FireDecision::Start(entry) => {
                    let Some(body) = self.catalog.get(&entry.spec.job_type) else {
                        error!(token = %fire.token, job_type = %entry.spec.job_type, "no job body registered");
                        self.registry.report_outcome(
                            &fire.token,
                            TaskOutcome::Failed {
                                error: format!("unknown job type: {}", entry.spec.job_type),
                            },
                        );
                        continue;
                    };
                    if let Err(e) = self.executor.launch(entry, body) {
                        warn!(token = %fire.token, error = %e, "firing could not be launched");
                    }
                }
                FireDecision::Skip => {
                    self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                }
                FireDecision::Gone => {
                    debug!(token = %fire.token, "dropping fire for finished task");
                }
            }
        }
    }
}
