//! API layer for the Vela softphone backend
//!
//! HTTP handlers for the call record ledger and call analytics.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;
pub mod identity;

pub use dto::ApiResponse;
pub use handlers::configure_calls;
pub use identity::Identity;
