//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of the environment variables read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "TASK_SCHEDULER_";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// JSON could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// An environment variable could not be parsed.
    #[error("environment variable `{name}` invalid: {reason}")]
    Env {
        /// Variable name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name prefix of firing worker threads (the job type is appended).
    pub worker_thread_prefix: String,
    /// Stack size of firing worker threads, in bytes.
    pub worker_stack_size: usize,
    /// Name of the dispatcher thread.
    pub dispatcher_thread_name: String,
    /// How long `shutdown` waits for each worker thread, in seconds.
    pub shutdown_timeout_secs: u64,
    /// Events kept by the default in-memory audit sink.
    pub audit_buffer_size: usize,
    /// Whether `shutdown` cancels live tasks before joining workers.
    pub cancel_tasks_on_shutdown: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_thread_prefix: "task-worker".into(),
            worker_stack_size: 2 * 1024 * 1024,
            dispatcher_thread_name: "task-dispatcher".into(),
            shutdown_timeout_secs: 10,
            audit_buffer_size: 1024,
            cancel_tasks_on_shutdown: true,
        }
    }
}

impl SchedulerConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_worker_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_thread_prefix = prefix.into();
        self
    }

    /// Set the worker stack size in bytes.
    #[must_use]
    pub const fn with_worker_stack_size(mut self, bytes: usize) -> Self {
        self.worker_stack_size = bytes;
        self
    }

    /// Set the per-worker shutdown join timeout.
    #[must_use]
    pub const fn with_shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.shutdown_timeout_secs = secs;
        self
    }

    /// Set the in-memory audit buffer size.
    #[must_use]
    pub const fn with_audit_buffer_size(mut self, events: usize) -> Self {
        self.audit_buffer_size = events;
        self
    }

    /// Choose whether shutdown cancels live tasks.
    #[must_use]
    pub const fn with_cancel_tasks_on_shutdown(mut self, cancel: bool) -> Self {
        self.cancel_tasks_on_shutdown = cancel;
        self
    }

    /// Shutdown join timeout as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_thread_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("worker_thread_prefix must not be empty".into()));
        }
        if self.dispatcher_thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid("dispatcher_thread_name must not be empty".into()));
        }
        if self.worker_stack_size < 64 * 1024 {
            return Err(ConfigError::Invalid("worker_stack_size must be at least 64 KiB".into()));
        }
        if self.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Invalid("shutdown_timeout_secs must be greater than 0".into()));
        }
        if self.audit_buffer_size == 0 {
            return Err(ConfigError::Invalid("audit_buffer_size must be greater than 0".into()));
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `TASK_SCHEDULER_*` environment variables,
    /// loading a `.env` file first if one exists. Unset variables keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Env` for unparsable values and
    /// `ConfigError::Invalid` if the result fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(v) = env_var("WORKER_THREAD_PREFIX") {
            cfg.worker_thread_prefix = v;
        }
        if let Some(v) = env_var("DISPATCHER_THREAD_NAME") {
            cfg.dispatcher_thread_name = v;
        }
        if let Some(v) = env_parse("WORKER_STACK_SIZE")? {
            cfg.worker_stack_size = v;
        }
        if let Some(v) = env_parse("SHUTDOWN_TIMEOUT_SECS")? {
            cfg.shutdown_timeout_secs = v;
        }
        if let Some(v) = env_parse("AUDIT_BUFFER_SIZE")? {
            cfg.audit_buffer_size = v;
        }
        if let Some(v) = env_parse("CANCEL_TASKS_ON_SHUTDOWN")? {
            cfg.cancel_tasks_on_shutdown = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_var(suffix: &str) -> Option<String> {
    dotenvy::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

fn env_parse<T>(suffix: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var(suffix)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Env {
                name: format!("{ENV_PREFIX}{suffix}"),
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let cfg = SchedulerConfig::from_json_str(r#"{ "shutdown_timeout_secs": 3 }"#).unwrap();
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.worker_thread_prefix, "task-worker");
    }
}
