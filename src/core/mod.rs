//! Core scheduling abstractions: triggers, task bookkeeping, checkpoints,
//! firing execution and the service facade.

pub mod audit;
pub mod checkpoint;
mod dispatcher;
pub mod error;
pub mod executor;
mod fire_queue;
pub mod job;
pub mod registry;
pub mod service;
pub mod status;
pub mod task;
pub mod trigger;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use checkpoint::Checkpoint;
pub use error::{AppResult, TaskError};
pub use executor::SchedulerStats;
pub use job::{JobBody, JobCatalog};
pub use registry::TaskRegistry;
pub use service::TaskService;
pub use status::{StatusEntry, StatusHolder, StatusLevel};
pub use task::{
    Attributes, StartedTask, TaskOutcome, TaskSnapshot, TaskSpec, TaskState, TaskToken, TriggerSpec,
};
pub use trigger::CompiledTrigger;
