//! Domain models for the Vela softphone
//!
//! This module contains the core domain models used throughout the subsystem.

pub mod analytics;
pub mod call;

pub use analytics::{AnalyticsPeriod, CallAnalytics};
pub use call::{
    CallDirection, CallOutcome, CallPhase, CallRecord, CallSession, ConnectionState, NewCallRecord,
};
