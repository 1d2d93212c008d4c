//! Trigger clock: compiles trigger specs and computes fire times.
//!
//! Compilation happens once, at registration, so malformed cron expressions
//! surface from `start_task` and never reach the dispatcher.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use super::error::TaskError;
use super::task::TriggerSpec;

/// A validated trigger, ready to produce fire times.
#[derive(Debug, Clone)]
pub enum CompiledTrigger {
    /// Parsed cron schedule.
    Cron(Box<Schedule>),
    /// Fixed period with an initial delay.
    Interval {
        /// Delay before the first fire.
        initial_delay: chrono::Duration,
        /// Delay between fires.
        period: chrono::Duration,
    },
    /// Single fire.
    Manual,
}

impl CompiledTrigger {
    /// Validate and compile a trigger spec.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidTrigger` for unparsable cron expressions, for
    /// a zero period, and for a delay or period that cannot be added to the
    /// current time.
    pub fn compile(spec: &TriggerSpec) -> Result<Self, TaskError> {
        match spec {
            TriggerSpec::Cron { expression } => parse_cron(expression).map(|s| Self::Cron(Box::new(s))),
            TriggerSpec::Interval {
                initial_delay,
                period,
            } => {
                if period.is_zero() {
                    return Err(TaskError::InvalidTrigger("interval period must be greater than 0".into()));
                }
                Self::Interval {
                    initial_delay: to_chrono(*initial_delay)?,
                    period: to_chrono(*period)?,
                }
                .check_reachable(Utc::now())
            }
            TriggerSpec::Manual => Ok(Self::Manual),
        }
    }

    /// First fire time for a task registered at `registered_at`.
    #[must_use]
    pub fn first_fire_time(&self, registered_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron(schedule) => schedule.after(&registered_at).next(),
            Self::Interval { initial_delay, .. } => registered_at.checked_add_signed(*initial_delay),
            Self::Manual => Some(registered_at),
        }
    }

    /// Earliest fire time strictly after `after`, or `None` once exhausted.
    #[must_use]
    pub fn next_fire_time(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron(schedule) => schedule.after(&after).next(),
            Self::Interval { period, .. } => after.checked_add_signed(*period),
            Self::Manual => None,
        }
    }

    /// Reject intervals whose first or second fire time overflows the calendar.
    fn check_reachable(self, now: DateTime<Utc>) -> Result<Self, TaskError> {
        if let Self::Interval { initial_delay, period } = &self {
            let reachable = now
                .checked_add_signed(*initial_delay)
                .and_then(|first| first.checked_add_signed(*period))
                .is_some();
            if !reachable {
                return Err(TaskError::InvalidTrigger(
                    "interval delay or period overflows the calendar".into(),
                ));
            }
        }
        Ok(self)
    }
}

/// Parse a cron expression. Five-field expressions (no seconds) fire at second zero.
fn parse_cron(expression: &str) -> Result<Schedule, TaskError> {
    let trimmed = expression.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| TaskError::InvalidTrigger(format!("{expression}: {e}")))
}

fn to_chrono(duration: Duration) -> Result<chrono::Duration, TaskError> {
    chrono::Duration::from_std(duration)
        .map_err(|_| TaskError::InvalidTrigger(format!("duration out of range: {duration:?}")))
}
