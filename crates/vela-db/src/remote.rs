//! Remote call record store
//!
//! HTTP client implementation of `CallRecordStore` used by the softphone
//! client process: records are appended and queried through the backend API
//! rather than a local database connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use vela_core::models::{CallRecord, NewCallRecord};
use vela_core::traits::CallRecordStore;
use vela_core::{AppError, AppResult};

/// Request header carrying the owner identity, mirrored by the API extractor
const IDENTITY_HEADER: &str = "X-Identity";

/// `CallRecordStore` backed by the Vela backend HTTP API
pub struct RemoteCallRecordStore {
    base_url: String,
    client: reqwest::Client,
}

/// JSON envelope returned by the backend API
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

impl RemoteCallRecordStore {
    /// Create a store talking to `base_url` (e.g. `https://crm.example.com`)
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn calls_url(&self) -> String {
        format!("{}/api/v1/calls", self.base_url)
    }
}

#[async_trait]
impl CallRecordStore for RemoteCallRecordStore {
    async fn persist(&self, record: &NewCallRecord) -> AppResult<i64> {
        debug!("Posting call record to {}", self.calls_url());

        let body = json!({
            "phone_number": record.phone_number,
            "direction": record.direction.as_str(),
            "outcome": record.outcome.as_str(),
            "duration_seconds": record.duration_seconds,
            "provider_call_id": record.provider_call_id,
            "started_at": record.started_at,
        });

        let response = self
            .client
            .post(self.calls_url())
            .header(IDENTITY_HEADER, &record.owner_identity)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("call record POST failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Persistence(format!(
                "call record POST returned {}",
                response.status()
            )));
        }

        let envelope: Envelope<CallRecord> = response
            .json()
            .await
            .map_err(|e| AppError::Persistence(format!("bad call record response: {}", e)))?;

        if !envelope.success {
            return Err(AppError::Persistence(
                "backend reported a failed call record write".to_string(),
            ));
        }

        Ok(envelope.data.id)
    }

    async fn list_since(
        &self,
        owner_identity: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<CallRecord>> {
        let response = self
            .client
            .get(self.calls_url())
            .header(IDENTITY_HEADER, owner_identity)
            .query(&[("since", since.to_rfc3339())])
            .send()
            .await
            .map_err(|e| AppError::Database(format!("call record GET failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Database(format!(
                "call record GET returned {}",
                response.status()
            )));
        }

        let envelope: Envelope<Vec<CallRecord>> = response
            .json()
            .await
            .map_err(|e| AppError::Database(format!("bad call list response: {}", e)))?;

        Ok(envelope.data)
    }

    async fn list_recent(
        &self,
        owner_identity: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<CallRecord>> {
        let response = self
            .client
            .get(self.calls_url())
            .header(IDENTITY_HEADER, owner_identity)
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())])
            .send()
            .await
            .map_err(|e| AppError::Database(format!("call record GET failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Database(format!(
                "call record GET returned {}",
                response.status()
            )));
        }

        let envelope: Envelope<Vec<CallRecord>> = response
            .json()
            .await
            .map_err(|e| AppError::Database(format!("bad call list response: {}", e)))?;

        Ok(envelope.data)
    }
}
