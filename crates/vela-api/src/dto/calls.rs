//! Call record and analytics DTOs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;
use vela_core::models::{AnalyticsPeriod, NewCallRecord};
use vela_core::AppResult;

/// Query parameters for listing call records
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CallListParams {
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200))]
    pub limit: i64,

    /// Number of records to skip
    #[serde(default)]
    #[validate(range(min = 0))]
    pub offset: i64,

    /// When set, return every record with `started_at >= since` instead of
    /// a page (used by the analytics read path of softphone clients)
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

fn default_limit() -> i64 {
    50
}

/// Query parameters for the analytics summary
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsParams {
    /// Aggregation window
    #[serde(default)]
    pub period: AnalyticsPeriod,
}

/// Request body for appending one call record
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCallRequest {
    /// Phone number or client identifier of the remote party
    #[validate(length(min = 1, max = 64))]
    pub phone_number: String,

    /// Call direction: `incoming` or `outgoing`
    pub direction: String,

    /// Terminal outcome: `completed`, `missed`, `busy`, `failed`, `no-answer`
    pub outcome: String,

    /// Billable duration in seconds
    #[serde(default)]
    #[validate(range(min = 0))]
    pub duration_seconds: i64,

    /// Provider correlation id, if one was assigned
    #[serde(default)]
    pub provider_call_id: Option<String>,

    /// Answer time for answered calls; defaults to the server clock
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl CreateCallRequest {
    /// Convert into the store input, resolving enum strings and defaults
    pub fn into_record(self, owner_identity: String, now: DateTime<Utc>) -> AppResult<NewCallRecord> {
        Ok(NewCallRecord {
            phone_number: self.phone_number,
            direction: self.direction.parse()?,
            outcome: self.outcome.parse()?,
            duration_seconds: self.duration_seconds,
            started_at: self.started_at.unwrap_or(now),
            provider_call_id: self.provider_call_id,
            owner_identity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::models::{CallDirection, CallOutcome};

    #[test]
    fn test_into_record() {
        let request = CreateCallRequest {
            phone_number: "+15551234567".to_string(),
            direction: "outgoing".to_string(),
            outcome: "no-answer".to_string(),
            duration_seconds: 0,
            provider_call_id: Some("CA-1".to_string()),
            started_at: None,
        };

        let now = Utc::now();
        let record = request.into_record("agent-1".to_string(), now).unwrap();
        assert_eq!(record.direction, CallDirection::Outgoing);
        assert_eq!(record.outcome, CallOutcome::NoAnswer);
        assert_eq!(record.started_at, now);
        assert_eq!(record.owner_identity, "agent-1");
    }

    #[test]
    fn test_into_record_rejects_unknown_outcome() {
        let request = CreateCallRequest {
            phone_number: "+15551234567".to_string(),
            direction: "outgoing".to_string(),
            outcome: "vanished".to_string(),
            duration_seconds: 0,
            provider_call_id: None,
            started_at: None,
        };

        assert!(request.into_record("agent-1".to_string(), Utc::now()).is_err());
    }

    #[test]
    fn test_list_params_validation() {
        let params = CallListParams {
            limit: 500,
            offset: 0,
            since: None,
        };
        assert!(params.validate().is_err());

        let params = CallListParams {
            limit: 50,
            offset: -1,
            since: None,
        };
        assert!(params.validate().is_err());

        let params = CallListParams {
            limit: 50,
            offset: 0,
            since: None,
        };
        assert!(params.validate().is_ok());
    }
}
