//! Tests for builder modules

use std::sync::Arc;

use repo_task_scheduler::builders::TaskServiceBuilder;
use repo_task_scheduler::config::SchedulerConfig;
use repo_task_scheduler::core::{
    Attributes, Checkpoint, JobBody, JobCatalog, NoopAuditSink, TaskError, TaskOutcome, TaskSpec,
};

struct Reindex;

impl JobBody for Reindex {
    fn run(&self, attrs: &Attributes, _checkpoint: &Checkpoint) -> anyhow::Result<()> {
        match attrs.get("repo") {
            Some(_) => Ok(()),
            None => anyhow::bail!("no repository given"),
        }
    }
}

#[test]
fn test_builder_registers_bodies() {
    let service = TaskServiceBuilder::new(SchedulerConfig::default())
        .with_job("gc", |_, _| Ok(()))
        .with_job_body("reindex", Reindex)
        .with_audit(Arc::new(NoopAuditSink))
        .build()
        .unwrap();
    assert_eq!(service.job_types(), vec!["gc".to_string(), "reindex".to_string()]);

    let started = service
        .start_task(TaskSpec::new("reindex").manual(true), true)
        .unwrap();
    assert_eq!(
        started.outcome,
        Some(TaskOutcome::Failed {
            error: "no repository given".into()
        })
    );
    service.shutdown();
}

#[test]
fn test_builder_with_catalog() {
    let mut catalog = JobCatalog::new();
    catalog.register("gc", |_, _| Ok(()));
    let service = TaskServiceBuilder::new(SchedulerConfig::default())
        .with_catalog(catalog)
        .with_job("backup", |_, _| Ok(()))
        .build()
        .unwrap();
    assert_eq!(service.job_types().len(), 2);
    service.shutdown();
}

#[test]
fn test_builder_rejects_empty_catalog() {
    assert!(matches!(
        TaskServiceBuilder::new(SchedulerConfig::default()).build(),
        Err(TaskError::InvalidSpec(_))
    ));
}
