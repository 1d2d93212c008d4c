//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Current UTC time.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Time left until `deadline`, zero if it has passed.
#[must_use]
pub fn until(deadline: DateTime<Utc>) -> std::time::Duration {
    (deadline - Utc::now()).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until_past_deadline_is_zero() {
        let past = Utc::now() - chrono::Duration::seconds(5);
        assert_eq!(until(past), std::time::Duration::ZERO);
    }

    #[test]
    fn test_until_future_deadline() {
        let future = Utc::now() + chrono::Duration::seconds(60);
        let left = until(future);
        assert!(left > std::time::Duration::from_secs(58));
    }
}
