//! Recency window used to bound each crawl.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lookback horizon, in whole hours, for changed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyWindow {
    hours: u32,
}

impl RecencyWindow {
    pub fn hours(hours: u32) -> Self {
        Self { hours }
    }

    pub fn as_hours(&self) -> u32 {
        self.hours
    }

    /// Oldest timestamp still inside the window at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(i64::from(self.hours))
    }

    /// Whether `updated_at` falls inside the window at `now`.
    ///
    /// The boundary is inclusive, and timestamps ahead of `now` count as inside.
    pub fn contains(&self, now: DateTime<Utc>, updated_at: DateTime<Utc>) -> bool {
        updated_at >= self.cutoff(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let window = RecencyWindow::hours(48);
        assert!(window.contains(now(), now() - Duration::hours(48)));
        assert!(window.contains(now(), now() - Duration::hours(47)));
        assert!(!window.contains(now(), now() - Duration::hours(49)));
        assert!(!window.contains(now(), now() - Duration::hours(48) - Duration::seconds(1)));
    }

    #[test]
    fn test_future_timestamp_is_inside() {
        let window = RecencyWindow::hours(1);
        assert!(window.contains(now(), now() + Duration::minutes(5)));
    }

    #[test]
    fn test_zero_window_only_keeps_now() {
        let window = RecencyWindow::hours(0);
        assert!(window.contains(now(), now()));
        assert!(!window.contains(now(), now() - Duration::seconds(1)));
    }
}
