//! Vela Telephony Layer
//!
//! This crate wraps the telephony provider behind a narrow capability
//! interface:
//!
//! - `DeviceSession` / `CallHandle` traits with the device- and call-scope
//!   event vocabulary the lifecycle controller consumes
//! - `HttpTokenProvider`: client for the session token endpoint
//! - `SimulatedDevice`: scriptable in-process device for tests and the
//!   simulate mode
//!
//! The provider's media negotiation lives entirely on the other side of
//! these traits and is out of scope here.

pub mod device;
pub mod simulator;
pub mod token;

pub use device::{CallEvent, CallHandle, DeviceEvent, DeviceSession};
pub use simulator::{SimulatedCallHandle, SimulatedDevice};
pub use token::{HttpTokenProvider, StaticTokenProvider};
