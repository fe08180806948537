//! Simulated telephony device
//!
//! Scriptable in-process implementation of `DeviceSession` for driving the
//! call lifecycle without a real provider: tests inject arbitrary event
//! sequences (including duplicate terminal events), and the binary's
//! simulate mode runs a scripted call through it at startup.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;
use vela_core::{AppError, AppResult};

use crate::device::{CallEvent, CallHandle, DeviceEvent, DeviceSession};

/// In-process device session with an event injection surface
pub struct SimulatedDevice {
    events_tx: mpsc::UnboundedSender<DeviceEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<DeviceEvent>>>,
    registration_fails: bool,
    connect_fails: AtomicBool,
    outgoing: Mutex<Vec<Arc<SimulatedCallHandle>>>,
}

impl SimulatedDevice {
    /// Create a device that registers successfully
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            events_tx: tx,
            events_rx: Mutex::new(Some(rx)),
            registration_fails: false,
            connect_fails: AtomicBool::new(false),
            outgoing: Mutex::new(Vec::new()),
        }
    }

    /// Create a device whose registration always fails
    pub fn failing_registration() -> Self {
        let mut device = Self::new();
        device.registration_fails = true;
        device
    }

    /// Make subsequent `connect` calls fail
    pub fn set_connect_failure(&self, fails: bool) {
        self.connect_fails.store(fails, Ordering::SeqCst);
    }

    /// Inject a raw device-scope event
    pub fn emit(&self, event: DeviceEvent) {
        // Receiver dropped means the consumer shut down; nothing to signal
        let _ = self.events_tx.send(event);
    }

    /// Inject a call-scope event tagged with `call_id`
    pub fn emit_call(&self, call_id: Option<&str>, event: CallEvent) {
        self.emit(DeviceEvent::Call {
            call_id: call_id.map(str::to_string),
            event,
        });
    }

    /// Ring an incoming call from `from`, returning its handle
    pub fn ring(&self, from: &str) -> Arc<SimulatedCallHandle> {
        let handle = Arc::new(SimulatedCallHandle::new(from));
        debug!(
            "Simulated incoming call {} from {}",
            handle.id, handle.remote
        );
        self.emit(DeviceEvent::Incoming {
            call: handle.clone(),
        });
        handle
    }

    /// Number of outgoing calls placed through this device
    pub fn connect_count(&self) -> usize {
        self.outgoing.lock().expect("device lock poisoned").len()
    }

    /// The most recently placed outgoing call, if any
    pub fn last_outgoing(&self) -> Option<Arc<SimulatedCallHandle>> {
        self.outgoing
            .lock()
            .expect("device lock poisoned")
            .last()
            .cloned()
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceSession for SimulatedDevice {
    async fn register(&self, _token: &str) -> AppResult<()> {
        if self.registration_fails {
            return Err(AppError::ProviderCall(
                "simulated registration refused".to_string(),
            ));
        }
        self.emit(DeviceEvent::Registered);
        Ok(())
    }

    async fn connect(&self, destination: &str) -> AppResult<Arc<dyn CallHandle>> {
        if self.connect_fails.load(Ordering::SeqCst) {
            return Err(AppError::ProviderCall(
                "simulated connect refused".to_string(),
            ));
        }

        let handle = Arc::new(SimulatedCallHandle::new(destination));
        debug!("Simulated outgoing call {} to {}", handle.id, destination);
        self.outgoing
            .lock()
            .expect("device lock poisoned")
            .push(handle.clone());
        Ok(handle)
    }

    fn take_events(&self) -> AppResult<mpsc::UnboundedReceiver<DeviceEvent>> {
        self.events_rx
            .lock()
            .expect("device lock poisoned")
            .take()
            .ok_or_else(|| AppError::Internal("device event stream already taken".to_string()))
    }
}

/// Handle for one simulated call
///
/// Control operations record their invocation instead of touching a real
/// provider, so tests can assert exactly what the controller forwarded.
pub struct SimulatedCallHandle {
    id: String,
    remote: String,
    accepted: AtomicBool,
    rejected: AtomicBool,
    disconnected: AtomicBool,
    muted: AtomicBool,
}

impl SimulatedCallHandle {
    fn new(remote: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote: remote.to_string(),
            accepted: AtomicBool::new(false),
            rejected: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            muted: AtomicBool::new(false),
        }
    }

    /// The provider correlation id minted for this call
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn was_accepted(&self) -> bool {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn was_rejected(&self) -> bool {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn was_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallHandle for SimulatedCallHandle {
    fn provider_call_id(&self) -> Option<String> {
        Some(self.id.clone())
    }

    fn remote_address(&self) -> Option<String> {
        Some(self.remote.clone())
    }

    async fn accept(&self) -> AppResult<()> {
        self.accepted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn reject(&self) -> AppResult<()> {
        self.rejected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> AppResult<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn mute(&self, muted: bool) -> AppResult<()> {
        self.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_emits_registered() {
        let device = SimulatedDevice::new();
        let mut events = device.take_events().unwrap();

        device.register("token").await.unwrap();
        assert!(matches!(events.recv().await, Some(DeviceEvent::Registered)));
    }

    #[tokio::test]
    async fn test_failing_registration() {
        let device = SimulatedDevice::failing_registration();
        assert!(device.register("token").await.is_err());
    }

    #[tokio::test]
    async fn test_event_stream_single_consumer() {
        let device = SimulatedDevice::new();
        assert!(device.take_events().is_ok());
        assert!(device.take_events().is_err());
    }

    #[tokio::test]
    async fn test_connect_tracks_outgoing_calls() {
        let device = SimulatedDevice::new();
        assert_eq!(device.connect_count(), 0);

        let handle = device.connect("+15551234567").await.unwrap();
        assert_eq!(device.connect_count(), 1);
        assert_eq!(handle.remote_address().as_deref(), Some("+15551234567"));
        assert!(handle.provider_call_id().is_some());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let device = SimulatedDevice::new();
        device.set_connect_failure(true);
        assert!(device.connect("+15551234567").await.is_err());
        assert_eq!(device.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let device = SimulatedDevice::new();
        let mut events = device.take_events().unwrap();

        device.emit_call(Some("call-1"), CallEvent::Accepted);
        device.emit_call(Some("call-1"), CallEvent::Error {
            message: "carrier fault".to_string(),
        });
        device.emit_call(Some("call-1"), CallEvent::Disconnected);

        match events.recv().await {
            Some(DeviceEvent::Call { event, .. }) => assert_eq!(event, CallEvent::Accepted),
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv().await {
            Some(DeviceEvent::Call { event, .. }) => {
                assert!(matches!(event, CallEvent::Error { .. }))
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv().await {
            Some(DeviceEvent::Call { event, .. }) => assert_eq!(event, CallEvent::Disconnected),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handle_records_control_operations() {
        let device = SimulatedDevice::new();
        let handle = device.ring("+15559876543");

        handle.accept().await.unwrap();
        handle.mute(true).await.unwrap();
        handle.disconnect().await.unwrap();

        assert!(handle.was_accepted());
        assert!(handle.is_muted());
        assert!(handle.was_disconnected());
        assert!(!handle.was_rejected());
    }
}
