//! Singleton enforcement and pause/resume contention tests
//!
//! Randomized interleavings (via `rand`) of:
//! - Concurrent singleton starts: exactly one winner, the rest rejected
//! - Restart after a failed or cancelled singleton
//! - Many callers racing pause/resume on the same task

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use rand::Rng;
use repo_task_scheduler::builders::TaskServiceBuilder;
use repo_task_scheduler::config::SchedulerConfig;
use repo_task_scheduler::core::{
    Attributes, Checkpoint, StatusHolder, TaskError, TaskOutcome, TaskService, TaskSpec, TaskState,
};

fn service() -> TaskService {
    TaskServiceBuilder::new(SchedulerConfig::default().with_shutdown_timeout_secs(2))
        .with_job("backup", |_: &Attributes, checkpoint: &Checkpoint| {
            while !checkpoint.checkpoint() {
                thread::sleep(Duration::from_millis(2));
            }
            Ok(())
        })
        .with_job("broken-backup", |_: &Attributes, _: &Checkpoint| {
            Err(anyhow::anyhow!("target volume is read-only"))
        })
        .build()
        .unwrap()
}

fn backup() -> TaskSpec {
    TaskSpec::new("backup").singleton(true).manual(true)
}

#[test]
fn test_concurrent_singleton_starts_admit_one() {
    let service = service();
    for round in 0..5 {
        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));
        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let service = service.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let jitter = rand::rng().random_range(0..500);
                    barrier.wait();
                    thread::sleep(Duration::from_micros(jitter));
                    service.start_task(backup(), false)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "round {round}: expected exactly one winner");
        for rejected in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(rejected, &TaskError::SingletonAlreadyActive("backup".into()));
        }

        assert!(service.stop_task(&winners[0].token, true));
        assert!(!service.has_active_task("backup"));
    }
    service.shutdown();
}

#[test]
fn test_restart_after_failed_singleton() {
    let service = service();
    let spec = TaskSpec::new("broken-backup").singleton(true).manual(true);

    let first = service.start_task(spec.clone(), true).unwrap();
    assert_eq!(
        first.outcome.as_ref().and_then(TaskOutcome::error),
        Some("target volume is read-only")
    );

    let mut status = StatusHolder::new();
    assert!(service.check_can_start_manual_task("broken-backup", &mut status));
    assert!(!status.has_errors());

    let second = service.start_task(spec, true).unwrap();
    assert_ne!(first.token, second.token);
    assert_eq!(second.outcome.map(|o| o.state()), Some(TaskState::Failed));
    service.shutdown();
}

#[test]
fn test_non_singleton_blocked_while_singleton_runs() {
    let service = service();
    let winner = service.start_task(backup(), false).unwrap();

    let plain = TaskSpec::new("backup").manual(true);
    assert_eq!(
        service.start_task(plain.clone(), false).unwrap_err(),
        TaskError::SingletonAlreadyActive("backup".into())
    );
    let mut status = StatusHolder::new();
    assert!(!service.check_can_start_manual_task("backup", &mut status));
    assert_eq!(status.last_error(), Some("a task of type `backup` is already running"));

    service.stop_task(&winner.token, true);
    let plain_token = service.start_task(plain, false).unwrap().token;
    service.stop_task(&plain_token, true);
    service.shutdown();
}

#[test]
fn test_racing_pause_resume_balances_out() {
    let service = service();
    let token = service.start_task(backup(), false).unwrap().token;
    let resumed_by = Arc::new(AtomicU64::new(0));

    let callers: Vec<_> = (0..6)
        .map(|_| {
            let service = service.clone();
            let resumed_by = Arc::clone(&resumed_by);
            thread::spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..20 {
                    service.pause_task(&token, rng.random_bool(0.3)).unwrap();
                    thread::sleep(Duration::from_micros(rng.random_range(0..300)));
                    if service.resume_task(&token).unwrap() {
                        resumed_by.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for caller in callers {
        caller.join().unwrap();
    }

    let snapshot = service.get_task(&token).unwrap();
    assert_eq!(snapshot.pause_depth, 0);
    assert_eq!(snapshot.state, TaskState::Running);
    assert!(resumed_by.load(Ordering::SeqCst) >= 1);

    assert!(service.stop_task(&token, true));
    service.shutdown();
}
