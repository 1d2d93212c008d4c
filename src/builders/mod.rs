//! Builders to assemble a running task service.

pub mod service_builder;

pub use service_builder::TaskServiceBuilder;
