//! Call analytics models
//!
//! Aggregated call statistics for the agent dashboard.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time window for analytics queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsPeriod {
    /// Since the start of the current UTC day
    Today,
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
}

impl AnalyticsPeriod {
    /// Inclusive lower bound of the window relative to `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always a valid time")
                .and_utc(),
            Self::Week => now - Duration::days(7),
            Self::Month => now - Duration::days(30),
        }
    }

    /// Wire string value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl Default for AnalyticsPeriod {
    fn default() -> Self {
        Self::Today
    }
}

/// Aggregated call statistics for one owner over one window
#[derive(Debug, Clone, Serialize)]
pub struct CallAnalytics {
    /// Total calls in the window
    pub total_calls: i64,

    /// Calls with outcome `completed`
    pub answered_calls: i64,

    /// Calls with outcome in {missed, no-answer, busy}
    pub missed_calls: i64,

    /// Average duration over completed calls, rounded to whole seconds
    /// (0 if there are none)
    pub avg_duration_seconds: i64,

    /// Average duration formatted as `m:ss`
    pub avg_duration: String,

    /// `round(100 * answered / total)`, 0 when total is 0
    pub answer_rate: i64,

    /// Incoming call count
    pub incoming_calls: i64,

    /// Outgoing call count
    pub outgoing_calls: i64,

    /// The window this summary covers
    pub period: AnalyticsPeriod,
}

/// Format a duration in seconds as `m:ss`
pub fn format_duration(seconds: i64) -> String {
    let mins = seconds / 60;
    let secs = seconds % 60;
    format!("{}:{:02}", mins, secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_start_today() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let start = AnalyticsPeriod::Today.window_start(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_window_start_week_and_month() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        assert_eq!(
            AnalyticsPeriod::Week.window_start(now),
            Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap()
        );
        assert_eq!(
            AnalyticsPeriod::Month.window_start(now),
            Utc.with_ymd_and_hms(2026, 2, 12, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(60), "1:00");
        assert_eq!(format_duration(125), "2:05");
    }
}
