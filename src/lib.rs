//! # Repo Task Scheduler
//!
//! In-process task scheduling and lifecycle manager for repository-management servers.
//!
//! Every long-running operation of a repository server (backups, garbage collection,
//! index rebuilding, replication pulls) runs as a *task* managed by this crate. The
//! scheduler fires tasks on cron or interval triggers (or once, manually), runs each
//! firing on a dedicated worker thread, and lets any number of independent callers
//! pause, resume, stop and wait on the same unit of work while it runs.
//!
//! ## Key Features
//!
//! - **Trigger clock**: cron expressions, fixed intervals with an initial delay, or one-shot
//! - **Singleton job types**: at most one live task per type, rejected (never queued) on collision
//! - **Cooperative pause/resume**: depth-counted, observed by job bodies at checkpoints
//! - **Cooperative cancellation**: stop always wins over pause; no preemptive kills
//! - **Blocking waits**: wait for a pause to take hold or for a task to finish
//! - **Non-overlapping fires**: a firing that is still running makes the next tick a skip
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use repo_task_scheduler::builders::TaskServiceBuilder;
//! use repo_task_scheduler::config::SchedulerConfig;
//! use repo_task_scheduler::core::{Attributes, Checkpoint, TaskSpec, TriggerSpec};
//!
//! let service = TaskServiceBuilder::new(SchedulerConfig::default())
//!     .with_job("gc", |_attrs: &Attributes, checkpoint: &Checkpoint| {
//!         for _batch in 0..100 {
//!             if checkpoint.checkpoint() {
//!                 return Ok(());
//!             }
//!             // sweep one batch ...
//!         }
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let started = service.start_task(
//!     TaskSpec::new("gc")
//!         .with_trigger(TriggerSpec::interval(Duration::from_secs(5), Duration::from_secs(3600)))
//!         .singleton(true),
//!     false,
//! )?;
//!
//! service.pause_task(&started.token, true)?;
//! service.resume_task(&started.token)?;
//! service.stop_task(&started.token, true);
//! service.shutdown();
//! ```
//!
//! For complete examples, see:
//! - `tests/lifecycle_test.rs` - pause/resume/stop scenarios
//! - `tests/singleton_test.rs` - singleton enforcement under contention

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: triggers, registry, checkpoints, dispatcher and facade.
pub mod core;
/// Configuration models for the scheduler.
pub mod config;
/// Builders to assemble a running task service.
pub mod builders;
/// Runtime adapters (async wrappers) and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
