//! Runtime API surface: serde request/response models over the task service.
//!
//! Async wrappers live on [`crate::core::TaskService`] behind the
//! `tokio-runtime` feature.

pub mod api;

pub use api::{health, submit_task, task_status, Health, TaskStatusResponse, TaskSubmission};
