//! Vela Softphone Persistence Layer
//!
//! This crate provides the `CallRecordStore` implementations for the Vela
//! softphone subsystem:
//!
//! - `PgCallRecordStore`: PostgreSQL-backed ledger used by the backend server
//! - `RemoteCallRecordStore`: HTTP client used by the softphone client
//!   process, persisting through the backend API
//! - `InMemoryCallRecordStore`: in-process store for tests and simulate mode
//!
//! The ledger is append-only; no implementation exposes update or delete.

pub mod memory;
pub mod pool;
pub mod remote;
pub mod repositories;

pub use memory::InMemoryCallRecordStore;
pub use pool::{create_pool, run_migrations};
pub use remote::RemoteCallRecordStore;
pub use repositories::PgCallRecordStore;

// Re-export commonly used types
pub use sqlx::PgPool;
pub use vela_core::{AppError, AppResult};
