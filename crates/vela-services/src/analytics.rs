//! Call analytics aggregation
//!
//! Read-side summary over the call record ledger: a query scoped to one
//! owner and window, folded into the dashboard counters. Stateless per
//! request.

use std::sync::Arc;
use tracing::{debug, instrument};
use vela_core::models::analytics::format_duration;
use vela_core::models::{AnalyticsPeriod, CallAnalytics, CallDirection, CallOutcome, CallRecord};
use vela_core::traits::{CallRecordStore, Clock};
use vela_core::AppResult;

/// Aggregates call statistics for the agent dashboard
pub struct CallAnalyticsService {
    records: Arc<dyn CallRecordStore>,
    clock: Arc<dyn Clock>,
}

impl CallAnalyticsService {
    /// Create a new analytics service
    pub fn new(records: Arc<dyn CallRecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }

    /// Summarize one owner's calls over the given window
    #[instrument(skip(self))]
    pub async fn summarize(
        &self,
        owner_identity: &str,
        period: AnalyticsPeriod,
    ) -> AppResult<CallAnalytics> {
        let now = self.clock.now();
        let since = period.window_start(now);
        debug!("Summarizing calls for {} since {}", owner_identity, since);

        let records = self.records.list_since(owner_identity, since).await?;
        Ok(fold(&records, period))
    }
}

/// Fold a window of records into the summary counters
fn fold(records: &[CallRecord], period: AnalyticsPeriod) -> CallAnalytics {
    let total_calls = records.len() as i64;

    let answered_calls = records
        .iter()
        .filter(|r| r.outcome == CallOutcome::Completed)
        .count() as i64;

    let missed_calls = records
        .iter()
        .filter(|r| r.outcome.is_missed_class())
        .count() as i64;

    let completed_durations: Vec<i64> = records
        .iter()
        .filter(|r| r.outcome == CallOutcome::Completed)
        .map(|r| r.duration_seconds)
        .collect();

    let avg_duration_seconds = if completed_durations.is_empty() {
        0
    } else {
        let sum: i64 = completed_durations.iter().sum();
        (sum as f64 / completed_durations.len() as f64).round() as i64
    };

    let answer_rate = if total_calls > 0 {
        ((answered_calls as f64 / total_calls as f64) * 100.0).round() as i64
    } else {
        0
    };

    let incoming_calls = records
        .iter()
        .filter(|r| r.direction == CallDirection::Incoming)
        .count() as i64;

    let outgoing_calls = records
        .iter()
        .filter(|r| r.direction == CallDirection::Outgoing)
        .count() as i64;

    CallAnalytics {
        total_calls,
        answered_calls,
        missed_calls,
        avg_duration_seconds,
        avg_duration: format_duration(avg_duration_seconds),
        answer_rate,
        incoming_calls,
        outgoing_calls,
        period,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use vela_core::models::NewCallRecord;
    use vela_core::traits::ManualClock;
    use vela_db::InMemoryCallRecordStore;

    fn record(
        direction: CallDirection,
        outcome: CallOutcome,
        duration: i64,
        started_at: DateTime<Utc>,
    ) -> CallRecord {
        CallRecord {
            id: 0,
            phone_number: "+15551234567".to_string(),
            direction,
            outcome,
            duration_seconds: duration,
            started_at,
            provider_call_id: None,
            owner_identity: "agent-1".to_string(),
            created_at: started_at,
        }
    }

    #[test]
    fn fold_empty_window_is_all_zeros() {
        let summary = fold(&[], AnalyticsPeriod::Today);
        assert_eq!(summary.total_calls, 0);
        assert_eq!(summary.answered_calls, 0);
        assert_eq!(summary.missed_calls, 0);
        assert_eq!(summary.answer_rate, 0);
        assert_eq!(summary.avg_duration_seconds, 0);
        assert_eq!(summary.avg_duration, "0:00");
    }

    #[test]
    fn fold_counts_and_rates() {
        let now = Utc::now();
        let records = vec![
            record(CallDirection::Outgoing, CallOutcome::Completed, 60, now),
            record(CallDirection::Outgoing, CallOutcome::Completed, 120, now),
            record(CallDirection::Incoming, CallOutcome::Missed, 0, now),
            record(CallDirection::Outgoing, CallOutcome::NoAnswer, 0, now),
            record(CallDirection::Incoming, CallOutcome::Busy, 0, now),
            record(CallDirection::Outgoing, CallOutcome::Failed, 12, now),
        ];

        let summary = fold(&records, AnalyticsPeriod::Week);
        assert_eq!(summary.total_calls, 6);
        assert_eq!(summary.answered_calls, 2);
        // failed is neither answered nor missed-class
        assert_eq!(summary.missed_calls, 3);
        assert_eq!(summary.avg_duration_seconds, 90);
        assert_eq!(summary.avg_duration, "1:30");
        // round(100 * 2/6) = 33
        assert_eq!(summary.answer_rate, 33);
        assert_eq!(summary.incoming_calls, 2);
        assert_eq!(summary.outgoing_calls, 4);
    }

    #[test]
    fn fold_rounds_answer_rate_to_nearest() {
        let now = Utc::now();
        let records = vec![
            record(CallDirection::Outgoing, CallOutcome::Completed, 10, now),
            record(CallDirection::Outgoing, CallOutcome::Completed, 10, now),
            record(CallDirection::Outgoing, CallOutcome::NoAnswer, 0, now),
        ];

        // round(100 * 2/3) = 67
        let summary = fold(&records, AnalyticsPeriod::Today);
        assert_eq!(summary.answer_rate, 67);
    }

    #[tokio::test]
    async fn summarize_honors_window_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        let store = Arc::new(InMemoryCallRecordStore::new());
        let clock = Arc::new(ManualClock::new(now));

        let persist = |started_at: DateTime<Utc>, outcome: CallOutcome| {
            let store = store.clone();
            async move {
                store
                    .persist(&NewCallRecord {
                        phone_number: "+15551234567".to_string(),
                        direction: CallDirection::Outgoing,
                        outcome,
                        duration_seconds: 0,
                        started_at,
                        provider_call_id: None,
                        owner_identity: "agent-1".to_string(),
                    })
                    .await
                    .unwrap();
            }
        };

        // Inside the 7-day window, exactly on the boundary, and outside it
        persist(now - Duration::days(1), CallOutcome::Completed).await;
        persist(now - Duration::days(7), CallOutcome::NoAnswer).await;
        persist(now - Duration::days(8), CallOutcome::Completed).await;

        // A different owner inside the window must not leak in
        store
            .persist(&NewCallRecord {
                phone_number: "+15550000000".to_string(),
                direction: CallDirection::Incoming,
                outcome: CallOutcome::Completed,
                duration_seconds: 5,
                started_at: now,
                provider_call_id: None,
                owner_identity: "agent-2".to_string(),
            })
            .await
            .unwrap();

        let service = CallAnalyticsService::new(store.clone(), clock);
        let summary = service
            .summarize("agent-1", AnalyticsPeriod::Week)
            .await
            .unwrap();

        assert_eq!(summary.total_calls, 2);
        assert_eq!(summary.answered_calls, 1);
        assert_eq!(summary.missed_calls, 1);
        assert_eq!(summary.answer_rate, 50);
    }
}
