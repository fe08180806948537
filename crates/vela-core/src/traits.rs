//! Common traits for the softphone subsystem
//!
//! Defines abstractions for the call record ledger, the session token
//! provider, and the clock. The lifecycle controller only ever talks to
//! these traits, which keeps every collaborator substitutable in tests.

use crate::error::AppError;
use crate::models::{CallRecord, NewCallRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Append-only store of terminated-call records
///
/// The write path is `persist` alone; records are never updated or deleted.
/// Corrections would be new records, not edits.
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    /// Append one record, returning its id
    async fn persist(&self, record: &NewCallRecord) -> Result<i64, AppError>;

    /// All records for one owner with `started_at >= since`
    async fn list_since(
        &self,
        owner_identity: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, AppError>;

    /// One owner's records, newest first, paginated
    async fn list_recent(
        &self,
        owner_identity: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CallRecord>, AppError>;
}

/// Issues short-lived credentials scoping a user identity to the telephony
/// provider
///
/// Every failure mode (transport error, non-success response, missing or
/// empty token) surfaces as `AppError::TokenUnavailable`; callers degrade
/// rather than retry.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch a provider access token for the given identity
    async fn fetch_token(&self, identity: &str) -> Result<String, AppError>;
}

/// Source of the current time
///
/// Injected into the controller and analytics service so duration and
/// window arithmetic is deterministic under test.
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Advance the clock by `seconds`
    pub fn advance_secs(&self, seconds: i64) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += chrono::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance_secs(30);
        assert_eq!(clock.now(), start + chrono::Duration::seconds(30));
    }

    #[test]
    fn test_system_clock_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
