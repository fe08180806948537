//! Device session capability interface
//!
//! The telephony provider's client object is consumed exclusively through
//! these traits. The device emits lifecycle events over a single FIFO
//! channel; call-scope events carry the provider's correlation id so the
//! controller can match them against the active session.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use vela_core::AppResult;

/// Call-scope event emitted by the provider for one call
///
/// Every variant except `Accepted` is terminal for the call. Delivery order
/// across `Error` and `Disconnected` for the same failure is not guaranteed
/// by the provider contract; consumers must drop duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// Remote party (or local accept) answered the call
    Accepted,
    /// Call ended after being connected
    Disconnected,
    /// Call canceled before being answered (includes provider ring timeout)
    Canceled,
    /// Incoming call rejected
    Rejected,
    /// Provider error terminated the call
    Error { message: String },
}

impl CallEvent {
    /// Whether this event ends the call's life
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Accepted)
    }
}

/// Device-scope event emitted by the provider
pub enum DeviceEvent {
    /// Registration with the voice network confirmed
    Registered,
    /// Registration dropped
    Unregistered,
    /// Device lost connectivity to the voice network
    Offline,
    /// Device-scope provider error (independent of any call)
    Error { message: String },
    /// A new incoming call is ringing
    Incoming { call: Arc<dyn CallHandle> },
    /// Call-scope event, tagged with the provider correlation id
    Call {
        call_id: Option<String>,
        event: CallEvent,
    },
}

impl fmt::Debug for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => write!(f, "Registered"),
            Self::Unregistered => write!(f, "Unregistered"),
            Self::Offline => write!(f, "Offline"),
            Self::Error { message } => write!(f, "Error {{ message: {:?} }}", message),
            Self::Incoming { call } => write!(
                f,
                "Incoming {{ call_id: {:?} }}",
                call.provider_call_id()
            ),
            Self::Call { call_id, event } => {
                write!(f, "Call {{ call_id: {:?}, event: {:?} }}", call_id, event)
            }
        }
    }
}

/// The telephony provider's local client object
///
/// Represents this process's registration with the voice network. Events are
/// delivered FIFO over a single-consumer channel.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Register the identity scoped by `token` with the voice network.
    /// Success is confirmed asynchronously by a `Registered` event.
    async fn register(&self, token: &str) -> AppResult<()>;

    /// Place an outgoing call to a phone number or client identifier
    async fn connect(&self, destination: &str) -> AppResult<Arc<dyn CallHandle>>;

    /// Take the event stream. Single consumer; calling twice is an error.
    fn take_events(&self) -> AppResult<mpsc::UnboundedReceiver<DeviceEvent>>;
}

/// Control surface of one provider call
#[async_trait]
pub trait CallHandle: Send + Sync {
    /// Correlation id assigned by the provider, if any
    fn provider_call_id(&self) -> Option<String>;

    /// Remote party address, if the provider knows it
    fn remote_address(&self) -> Option<String>;

    /// Answer an incoming call
    async fn accept(&self) -> AppResult<()>;

    /// Decline an incoming call
    async fn reject(&self) -> AppResult<()>;

    /// Hang up (or cancel a not-yet-answered outgoing call)
    async fn disconnect(&self) -> AppResult<()>;

    /// Set the local mute state
    async fn mute(&self, muted: bool) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(!CallEvent::Accepted.is_terminal());
        assert!(CallEvent::Disconnected.is_terminal());
        assert!(CallEvent::Canceled.is_terminal());
        assert!(CallEvent::Rejected.is_terminal());
        assert!(CallEvent::Error {
            message: "media setup failed".to_string()
        }
        .is_terminal());
    }
}
