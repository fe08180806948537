//! Call record repository implementation
//!
//! Provides PostgreSQL-backed storage for the call record ledger with
//! queries scoped to the owning identity. Uses runtime queries (not
//! compile-time macros) to avoid requiring a database connection at build
//! time. Inserts only - the ledger is append-only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use vela_core::models::{CallRecord, NewCallRecord};
use vela_core::traits::CallRecordStore;
use vela_core::{AppError, AppResult};

/// PostgreSQL implementation of `CallRecordStore`
pub struct PgCallRecordStore {
    pool: PgPool,
}

impl PgCallRecordStore {
    /// Create a new call record store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RECORD_SELECT_COLUMNS: &str = r#"
    id, owner_identity, phone_number,
    direction, outcome, duration_seconds,
    provider_call_id, started_at, created_at
"#;

#[async_trait]
impl CallRecordStore for PgCallRecordStore {
    #[instrument(skip(self, record))]
    async fn persist(&self, record: &NewCallRecord) -> AppResult<i64> {
        debug!(
            "Persisting call record for {} ({} {})",
            record.owner_identity,
            record.direction.as_str(),
            record.outcome.as_str()
        );

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO call_records (
                owner_identity, phone_number,
                direction, outcome, duration_seconds,
                provider_call_id, started_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&record.owner_identity)
        .bind(&record.phone_number)
        .bind(record.direction.as_str())
        .bind(record.outcome.as_str())
        .bind(record.duration_seconds)
        .bind(&record.provider_call_id)
        .bind(record.started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error persisting call record: {}", e);
            AppError::Database(format!("Failed to persist call record: {}", e))
        })?;

        Ok(row.0)
    }

    #[instrument(skip(self))]
    async fn list_since(
        &self,
        owner_identity: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<CallRecord>> {
        debug!("Listing call records for {} since {}", owner_identity, since);

        let query = format!(
            "SELECT {} FROM call_records WHERE owner_identity = $1 AND started_at >= $2 ORDER BY started_at DESC",
            RECORD_SELECT_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, CallRecordRow>(&query)
            .bind(owner_identity)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing call records: {}", e);
                AppError::Database(format!("Failed to list call records: {}", e))
            })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn list_recent(
        &self,
        owner_identity: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<CallRecord>> {
        debug!(
            "Listing recent call records for {} (limit {} offset {})",
            owner_identity, limit, offset
        );

        let query = format!(
            "SELECT {} FROM call_records WHERE owner_identity = $1 ORDER BY started_at DESC LIMIT $2 OFFSET $3",
            RECORD_SELECT_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, CallRecordRow>(&query)
            .bind(owner_identity)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing recent call records: {}", e);
                AppError::Database(format!("Failed to list call records: {}", e))
            })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// Helper struct for mapping database rows to the domain model
#[derive(Debug, sqlx::FromRow)]
struct CallRecordRow {
    id: i64,
    owner_identity: String,
    phone_number: String,
    direction: String,
    outcome: String,
    duration_seconds: i64,
    provider_call_id: Option<String>,
    started_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CallRecordRow> for CallRecord {
    type Error = AppError;

    fn try_from(row: CallRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            phone_number: row.phone_number,
            direction: row
                .direction
                .parse()
                .map_err(|_| AppError::Database(format!("bad direction value: {}", row.direction)))?,
            outcome: row
                .outcome
                .parse()
                .map_err(|_| AppError::Database(format!("bad outcome value: {}", row.outcome)))?,
            duration_seconds: row.duration_seconds,
            started_at: row.started_at,
            provider_call_id: row.provider_call_id,
            owner_identity: row.owner_identity,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::models::{CallDirection, CallOutcome};

    #[test]
    fn test_row_conversion() {
        let now = Utc::now();
        let row = CallRecordRow {
            id: 1,
            owner_identity: "agent-1".to_string(),
            phone_number: "+15551234567".to_string(),
            direction: "outgoing".to_string(),
            outcome: "no-answer".to_string(),
            duration_seconds: 0,
            provider_call_id: Some("CA-test".to_string()),
            started_at: now,
            created_at: now,
        };

        let record: CallRecord = row.try_into().unwrap();
        assert_eq!(record.direction, CallDirection::Outgoing);
        assert_eq!(record.outcome, CallOutcome::NoAnswer);
        assert_eq!(record.duration_seconds, 0);
    }

    #[test]
    fn test_row_conversion_rejects_bad_outcome() {
        let now = Utc::now();
        let row = CallRecordRow {
            id: 2,
            owner_identity: "agent-1".to_string(),
            phone_number: "+15551234567".to_string(),
            direction: "outgoing".to_string(),
            outcome: "vanished".to_string(),
            duration_seconds: 0,
            provider_call_id: None,
            started_at: now,
            created_at: now,
        };

        assert!(CallRecord::try_from(row).is_err());
    }
}
