//! Tests for audit sink

use repo_task_scheduler::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, TaskToken};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    let token = TaskToken::generate();

    sink.record(build_audit_event(token, "gc", AuditAction::Register, None));
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].token, token);
    assert_eq!(events[0].job_type, "gc");
    assert_eq!(events[0].action, AuditAction::Register);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);
    let token = TaskToken::generate();

    sink.record(build_audit_event(token, "gc", AuditAction::Register, None));
    sink.record(build_audit_event(token, "gc", AuditAction::Fire, None));
    sink.record(build_audit_event(token, "gc", AuditAction::Complete, None));

    assert_eq!(sink.actions_for(&token), vec![AuditAction::Fire, AuditAction::Complete]); // oldest popped
}

#[test]
fn test_clones_share_buffer() {
    let sink = InMemoryAuditSink::new(8);
    let reader = sink.clone();
    let token = TaskToken::generate();
    sink.record(build_audit_event(token, "replication", AuditAction::Skip, Some("busy".into())));
    assert_eq!(reader.events().len(), 1);
    assert!(reader.actions_for(&TaskToken::generate()).is_empty());
}

#[test]
fn test_build_audit_event() {
    let token = TaskToken::generate();
    let event = build_audit_event(token, "backup", AuditAction::Fail, Some("disk full".to_string()));

    assert_eq!(event.token, token);
    assert_eq!(event.job_type, "backup");
    assert_eq!(event.action, AuditAction::Fail);
    assert_eq!(event.detail, Some("disk full".to_string()));
    assert!(event.event_id.contains("fail"));
    assert!(event.created_at_ms > 0);
}
