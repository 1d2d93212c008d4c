//! Tests for the API surface

use repo_task_scheduler::builders::TaskServiceBuilder;
use repo_task_scheduler::config::SchedulerConfig;
use repo_task_scheduler::core::{TaskError, TaskState, TaskToken};
use repo_task_scheduler::runtime::{health, submit_task, task_status, TaskSubmission};

#[test]
fn test_submit_and_query() {
    let service = TaskServiceBuilder::new(SchedulerConfig::default())
        .with_job("gc", |_, _| Ok(()))
        .build()
        .unwrap();

    let req: TaskSubmission = serde_json::from_value(serde_json::json!({
        "job_type": "gc",
        "trigger": { "kind": "interval", "initial_delay": { "secs": 3600, "nanos": 0 }, "period": { "secs": 3600, "nanos": 0 } },
        "singleton": true
    }))
    .unwrap();
    let resp = submit_task(&service, req).unwrap();
    assert_eq!(resp.state, TaskState::Scheduled);
    assert!(resp.snapshot.as_ref().is_some_and(|s| s.singleton && s.repeating));

    let status = task_status(&service, &resp.token).unwrap();
    assert_eq!(status.token, resp.token);

    let body = health(&service);
    assert!(body.ok);
    assert_eq!(body.live_tasks, 1);

    service.shutdown();
    assert!(!health(&service).ok);
}

#[test]
fn test_submit_manual_and_wait() {
    let service = TaskServiceBuilder::new(SchedulerConfig::default())
        .with_job("gc", |_, _| Err(anyhow::anyhow!("locked")))
        .build()
        .unwrap();
    let req: TaskSubmission =
        serde_json::from_str(r#"{ "job_type": "gc", "manual": true, "wait": true }"#).unwrap();
    let resp = submit_task(&service, req).unwrap();
    assert_eq!(resp.state, TaskState::Failed);
    assert_eq!(resp.reason.as_deref(), Some("locked"));
    assert!(resp.snapshot.is_none());

    let missing = TaskToken::generate();
    assert_eq!(task_status(&service, &missing).unwrap_err(), TaskError::TaskNotFound(missing));
    service.shutdown();
}

#[test]
fn test_submit_without_wait_never_hides_failure() {
    let service = TaskServiceBuilder::new(SchedulerConfig::default())
        .with_job("gc", |_, _| Err(anyhow::anyhow!("locked")))
        .build()
        .unwrap();
    for _ in 0..50 {
        let req: TaskSubmission = serde_json::from_str(r#"{ "job_type": "gc", "manual": true }"#).unwrap();
        let resp = submit_task(&service, req).unwrap();
        assert_ne!(resp.state, TaskState::Completed);
        if resp.state == TaskState::Failed {
            assert_eq!(resp.reason.as_deref(), Some("locked"));
        }
    }
    service.shutdown();
}
