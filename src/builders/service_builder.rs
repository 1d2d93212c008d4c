//! Builder to assemble a running [`TaskService`] from configuration.

use std::sync::Arc;

use tracing::debug;

use crate::config::SchedulerConfig;
use crate::core::{
    Attributes, AuditSink, Checkpoint, InMemoryAuditSink, JobBody, JobCatalog, TaskError, TaskService,
};

/// Collects configuration, job bodies and an audit sink, then starts the service.
///
/// Without [`with_audit`](Self::with_audit) an [`InMemoryAuditSink`] sized
/// by `audit_buffer_size` is used.
pub struct TaskServiceBuilder {
    config: SchedulerConfig,
    catalog: JobCatalog,
    audit: Option<Arc<dyn AuditSink>>,
}

impl TaskServiceBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            catalog: JobCatalog::new(),
            audit: None,
        }
    }

    /// Register a closure as the body of `job_type`.
    #[must_use]
    pub fn with_job<F>(mut self, job_type: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Attributes, &Checkpoint) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.catalog.register(job_type, body);
        self
    }

    /// Register a [`JobBody`] implementation as the body of `job_type`.
    #[must_use]
    pub fn with_job_body(mut self, job_type: impl Into<String>, body: impl JobBody) -> Self {
        self.catalog.register_body(job_type, body);
        self
    }

    /// Use a pre-built catalog; bodies registered later are added to it.
    #[must_use]
    pub fn with_catalog(mut self, catalog: JobCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Send lifecycle events to `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Validate the configuration and start the service.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidSpec` for an invalid configuration or an
    /// empty catalog, and `TaskError::Spawn` if the dispatcher cannot start.
    pub fn build(self) -> Result<TaskService, TaskError> {
        if self.catalog.job_types().is_empty() {
            return Err(TaskError::InvalidSpec("no job types registered".into()));
        }
        let audit = self.audit.unwrap_or_else(|| {
            Arc::new(InMemoryAuditSink::new(self.config.audit_buffer_size)) as Arc<dyn AuditSink>
        });
        debug!(job_types = ?self.catalog.job_types(), "building task service");
        TaskService::new(self.config, self.catalog, audit)
    }
}
