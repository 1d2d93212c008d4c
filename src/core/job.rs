//! Job bodies and the catalog mapping job types to them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::checkpoint::Checkpoint;
use super::task::Attributes;

/// Business logic run by a task on every firing.
///
/// The body receives the task's attribute bag and a [`Checkpoint`] bound to
/// the task. It should call `checkpoint.checkpoint()` at safe points and
/// return `Ok(())` promptly once that call reports `true`; such a return is
/// classified as a cancellation. Returning an error (or panicking) marks the
/// firing failed. Bodies are never retried by the scheduler.
///
/// # Example
///
/// ```rust,ignore
/// use repo_task_scheduler::core::{Attributes, Checkpoint, JobBody};
///
/// struct IndexRebuild;
///
/// impl JobBody for IndexRebuild {
///     fn run(&self, attrs: &Attributes, checkpoint: &Checkpoint) -> anyhow::Result<()> {
///         let repo = attrs.get("repo").and_then(|v| v.as_str()).unwrap_or("all");
///         for path in list_paths(repo)? {
///             if checkpoint.checkpoint() {
///                 return Ok(());
///             }
///             reindex(&path)?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait JobBody: Send + Sync + 'static {
    /// Run one firing.
    ///
    /// # Errors
    ///
    /// Any error is captured as the firing's failure reason.
    fn run(&self, attributes: &Attributes, checkpoint: &Checkpoint) -> anyhow::Result<()>;
}

impl<F> JobBody for F
where
    F: Fn(&Attributes, &Checkpoint) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn run(&self, attributes: &Attributes, checkpoint: &Checkpoint) -> anyhow::Result<()> {
        self(attributes, checkpoint)
    }
}

/// Job type → body mapping.
#[derive(Clone, Default)]
pub struct JobCatalog {
    jobs: HashMap<String, Arc<dyn JobBody>>,
}

impl JobCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a closure body for `job_type`.
    pub fn register<F>(&mut self, job_type: impl Into<String>, body: F)
    where
        F: Fn(&Attributes, &Checkpoint) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.jobs.insert(job_type.into(), Arc::new(body));
    }

    /// Register (or replace) a body implemented as a type.
    pub fn register_body(&mut self, job_type: impl Into<String>, body: impl JobBody) {
        self.jobs.insert(job_type.into(), Arc::new(body));
    }

    /// Register a shared body.
    pub fn register_shared(&mut self, job_type: impl Into<String>, body: Arc<dyn JobBody>) {
        self.jobs.insert(job_type.into(), body);
    }

    /// Body for `job_type`.
    #[must_use]
    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobBody>> {
        self.jobs.get(job_type).cloned()
    }

    /// Whether `job_type` has a body.
    #[must_use]
    pub fn contains(&self, job_type: &str) -> bool {
        self.jobs.contains_key(job_type)
    }

    /// Registered job types, sorted.
    #[must_use]
    pub fn job_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.jobs.keys().cloned().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for JobCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCatalog").field("job_types", &self.job_types()).finish()
    }
}
