//! HTTP handlers

pub mod calls;

pub use calls::configure as configure_calls;
