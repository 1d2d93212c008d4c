//! Tests for error types

use repo_task_scheduler::config::ConfigError;
use repo_task_scheduler::core::{TaskError, TaskToken};

#[test]
fn test_singleton_error() {
    let err = TaskError::SingletonAlreadyActive("gc".to_string());
    assert_eq!(format!("{err}"), "a task of type `gc` is already running");
}

#[test]
fn test_not_found_error() {
    let token = TaskToken::generate();
    let err = TaskError::TaskNotFound(token);
    assert_eq!(format!("{err}"), format!("task not found: {token}"));
}

#[test]
fn test_invalid_trigger_error() {
    let err = TaskError::InvalidTrigger("bad cron".to_string());
    assert_eq!(format!("{err}"), "invalid trigger: bad cron");
}

#[test]
fn test_shutdown_error() {
    assert_eq!(format!("{}", TaskError::Shutdown), "task service has been shut down");
}

#[test]
fn test_task_error_into_anyhow() {
    let err: anyhow::Error = TaskError::UnknownJobType("reindex".into()).into();
    assert_eq!(err.to_string(), "unknown job type: reindex");
    assert_eq!(
        err.downcast_ref::<TaskError>(),
        Some(&TaskError::UnknownJobType("reindex".into()))
    );
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::Invalid("audit_buffer_size must be greater than 0".into());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: audit_buffer_size must be greater than 0"
    );
}
