//! Tests for utility functions

use std::time::Duration;

use repo_task_scheduler::util::{init_test_tracing, init_tracing, now_ms, now_utc, until};

#[test]
fn test_now_ms_advances() {
    let a = now_ms();
    std::thread::sleep(Duration::from_millis(2));
    assert!(now_ms() > a);
}

#[test]
fn test_until_tracks_now_utc() {
    let wait = until(now_utc() + chrono::Duration::seconds(2));
    assert!(wait > Duration::from_secs(1));
    assert!(wait <= Duration::from_secs(2));
}

#[test]
fn test_tracing_init_is_idempotent() {
    init_test_tracing();
    init_tracing();
    init_test_tracing();
    tracing::info!(target: "repo_task_scheduler", "subscriber installed");
}
