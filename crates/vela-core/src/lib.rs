//! Vela Softphone Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Vela softphone subsystem. It includes:
//!
//! - Domain models (CallSession, CallRecord, ConnectionState, analytics)
//! - Common traits for the call record store, token provider, and clock
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::VelaConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
