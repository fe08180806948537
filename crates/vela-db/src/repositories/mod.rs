//! Repository implementations

pub mod call_repo;

pub use call_repo::PgCallRecordStore;
