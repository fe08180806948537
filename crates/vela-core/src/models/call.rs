//! Call session and call record models
//!
//! `CallSession` is the in-memory representation of the single active or
//! ringing call; `CallRecord` is the durable, append-only ledger entry
//! describing a terminated call's outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Direction of a call relative to the local party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Call received by the local party
    Incoming,
    /// Call placed by the local party
    Outgoing,
}

impl CallDirection {
    /// Convert to the database/wire string value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }
}

impl FromStr for CallDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(Self::Incoming),
            "outgoing" => Ok(Self::Outgoing),
            other => Err(AppError::InvalidInput(format!(
                "unknown call direction: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome classification of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallOutcome {
    /// Call was answered and ended normally
    Completed,
    /// Incoming call that was never answered locally
    Missed,
    /// Incoming call rejected because another call was already active
    Busy,
    /// Call terminated by a provider error
    Failed,
    /// Outgoing call that was never answered by the remote party
    NoAnswer,
}

impl CallOutcome {
    /// Convert to the database/wire string value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Missed => "missed",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::NoAnswer => "no-answer",
        }
    }

    /// Whether this outcome counts as a missed call in analytics
    pub fn is_missed_class(&self) -> bool {
        matches!(self, Self::Missed | Self::NoAnswer | Self::Busy)
    }
}

impl FromStr for CallOutcome {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "missed" => Ok(Self::Missed),
            "busy" => Ok(Self::Busy),
            "failed" => Ok(Self::Failed),
            "no-answer" => Ok(Self::NoAnswer),
            other => Err(AppError::InvalidInput(format!(
                "unknown call outcome: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration status of the device session with the telephony provider
///
/// Independent of whether a `CallSession` exists; dialing is only permitted
/// in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No initialization attempted yet
    Uninitialized,
    /// The session token fetch failed at the transport level
    TokenFetchFailed,
    /// Token obtained, registration with the provider in flight
    Connecting,
    /// Registered and able to place or receive calls
    Ready,
    /// Provider reported the device offline
    Offline,
    /// Provider reported the device unregistered
    Disconnected,
    /// Device-scope provider error
    Error,
    /// Terminal degraded mode: no usable token could be obtained.
    /// Calling is unavailable; the rest of the product keeps working.
    Disabled,
}

impl ConnectionState {
    /// Whether the controller may initiate an outgoing call in this state
    pub fn is_call_capable(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether calling has been degraded away entirely for this session
    pub fn is_calling_disabled(&self) -> bool {
        matches!(self, Self::Disabled | Self::TokenFetchFailed)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::TokenFetchFailed => "token_fetch_failed",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Offline => "offline",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// Phase of the currently active call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// Outgoing call placed, waiting for the remote party
    Dialing,
    /// Incoming call ringing, waiting for a local accept/reject
    Ringing,
    /// Call answered; duration is accruing
    InProgress,
}

/// In-memory state of the single active or ringing call
///
/// Owned exclusively by the lifecycle controller. Created when a dial is
/// initiated locally or an incoming-call event arrives; dropped the instant
/// a terminal event is observed. At most one exists at a time.
#[derive(Debug, Clone, Serialize)]
pub struct CallSession {
    /// Opaque identifier of the local (authenticated) party
    pub identity: String,

    /// Phone number or client identifier of the other party
    pub remote_address: String,

    /// Direction of the call
    pub direction: CallDirection,

    /// Current phase of the call
    pub phase: CallPhase,

    /// Set when the provider call transitions to accepted; duration is
    /// measured from answer, never from dial or ring start
    pub started_at: Option<DateTime<Utc>>,

    /// Correlation id assigned by the provider (absent until the provider
    /// hands one out, or if it errors before assigning one)
    pub provider_call_id: Option<String>,

    /// Local-only mute flag, independent of provider state
    pub muted: bool,
}

impl CallSession {
    /// Billable seconds accrued by `now`: `max(0, now - started_at)` if the
    /// call was answered, otherwise 0.
    pub fn billable_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.started_at
            .map(|started| (now - started).num_seconds().max(0))
            .unwrap_or(0)
    }
}

/// Input for appending one call record to the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCallRecord {
    /// Phone number or client identifier of the remote party
    pub phone_number: String,

    /// Call direction
    pub direction: CallDirection,

    /// Terminal outcome classification
    pub outcome: CallOutcome,

    /// Billable duration in seconds (0 unless the call was answered)
    pub duration_seconds: i64,

    /// Answer time for answered calls, termination time otherwise
    pub started_at: DateTime<Utc>,

    /// Provider correlation id, if one was assigned
    pub provider_call_id: Option<String>,

    /// Opaque identifier of the local party that owns this record
    pub owner_identity: String,
}

/// Durable, append-only record of a terminated call
///
/// Written exactly once per call session, never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Unique identifier
    pub id: i64,

    /// Phone number or client identifier of the remote party
    pub phone_number: String,

    /// Call direction
    pub direction: CallDirection,

    /// Terminal outcome classification
    pub outcome: CallOutcome,

    /// Billable duration in seconds
    pub duration_seconds: i64,

    /// Answer time for answered calls, termination time otherwise
    pub started_at: DateTime<Utc>,

    /// Provider correlation id, if one was assigned
    pub provider_call_id: Option<String>,

    /// Opaque identifier of the local party that owns this record
    pub owner_identity: String,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
}

impl CallRecord {
    /// Whether the call was answered
    #[inline]
    pub fn was_answered(&self) -> bool {
        self.outcome == CallOutcome::Completed
    }

    /// Duration for display as `m:ss`
    pub fn display_duration(&self) -> String {
        let mins = self.duration_seconds / 60;
        let secs = self.duration_seconds % 60;
        format!("{}:{:02}", mins, secs)
    }
}
