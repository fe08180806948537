//! In-memory call record store
//!
//! Backs the simulate mode and unit tests. Same append-only contract as the
//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use vela_core::models::{CallRecord, NewCallRecord};
use vela_core::traits::CallRecordStore;
use vela_core::{AppError, AppResult};

/// In-process implementation of `CallRecordStore`
pub struct InMemoryCallRecordStore {
    records: Mutex<Vec<CallRecord>>,
    next_id: AtomicI64,
    failing: AtomicBool,
}

impl InMemoryCallRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            failing: AtomicBool::new(false),
        }
    }

    /// When set, every `persist` fails. Exercises the fire-and-forget
    /// write path: a lost record must never affect live-call state.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of all stored records, oldest first
    pub fn all(&self) -> Vec<CallRecord> {
        self.records.lock().expect("store lock poisoned").clone()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock poisoned").len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CallRecordStore for InMemoryCallRecordStore {
    async fn persist(&self, record: &NewCallRecord) -> AppResult<i64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Persistence(
                "in-memory store configured to fail".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = CallRecord {
            id,
            phone_number: record.phone_number.clone(),
            direction: record.direction,
            outcome: record.outcome,
            duration_seconds: record.duration_seconds,
            started_at: record.started_at,
            provider_call_id: record.provider_call_id.clone(),
            owner_identity: record.owner_identity.clone(),
            created_at: Utc::now(),
        };

        self.records
            .lock()
            .expect("store lock poisoned")
            .push(stored);
        Ok(id)
    }

    async fn list_since(
        &self,
        owner_identity: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<CallRecord>> {
        let records = self.records.lock().expect("store lock poisoned");
        let mut matched: Vec<CallRecord> = records
            .iter()
            .filter(|r| r.owner_identity == owner_identity && r.started_at >= since)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(matched)
    }

    async fn list_recent(
        &self,
        owner_identity: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<CallRecord>> {
        let records = self.records.lock().expect("store lock poisoned");
        let mut matched: Vec<CallRecord> = records
            .iter()
            .filter(|r| r.owner_identity == owner_identity)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(matched
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}
