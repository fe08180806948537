//! Vela Softphone Services
//!
//! This crate holds the business logic of the softphone subsystem:
//!
//! - `CallController`: the call lifecycle state machine. Owns the connection
//!   state and the single active call session, translates device events into
//!   state transitions, and writes exactly one call record per terminated
//!   call.
//! - `CallAnalyticsService`: read-side aggregation over the call record
//!   ledger.

pub mod analytics;
pub mod controller;

pub use analytics::CallAnalyticsService;
pub use controller::CallController;
