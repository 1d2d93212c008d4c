//! Tests for configuration validation

use std::time::Duration;

use repo_task_scheduler::config::{ConfigError, SchedulerConfig};

#[test]
fn test_default_config_validation() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(10));
    assert!(cfg.cancel_tasks_on_shutdown);
}

#[test]
fn test_config_invalid_stack_size() {
    let cfg = SchedulerConfig::default().with_worker_stack_size(1024);
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_config_invalid_timeout() {
    let cfg = SchedulerConfig::default().with_shutdown_timeout_secs(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_invalid_audit_buffer() {
    let cfg = SchedulerConfig::default().with_audit_buffer_size(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_empty_thread_prefix() {
    let cfg = SchedulerConfig::default().with_worker_thread_prefix("  ");
    assert!(cfg.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "worker_thread_prefix": "repo-job",
        "worker_stack_size": 1048576,
        "dispatcher_thread_name": "repo-dispatch",
        "shutdown_timeout_secs": 5,
        "audit_buffer_size": 64,
        "cancel_tasks_on_shutdown": false
    }"#;

    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.worker_thread_prefix, "repo-job");
    assert_eq!(cfg.dispatcher_thread_name, "repo-dispatch");
    assert_eq!(cfg.audit_buffer_size, 64);
    assert!(!cfg.cancel_tasks_on_shutdown);
}

#[test]
fn test_scheduler_config_from_bad_json() {
    assert!(matches!(
        SchedulerConfig::from_json_str("{ not json"),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        SchedulerConfig::from_json_str(r#"{ "audit_buffer_size": 0 }"#),
        Err(ConfigError::Invalid(_))
    ));
}
