//! Call lifecycle controller
//!
//! Owns the registration state and the single active call session. User
//! actions and device events both funnel into this controller; it is the
//! only writer of either piece of state.
//!
//! Terminal-event idempotency: the provider may emit both `error` and
//! `disconnect` for one failure, in either order. The active session is
//! taken out of the state synchronously on the first terminal event, before
//! the record write is even scheduled, so a duplicate finds no session (or a
//! mismatching call id) and is dropped. That enforces exactly one record per
//! call.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vela_core::models::{
    CallDirection, CallOutcome, CallPhase, CallSession, ConnectionState, NewCallRecord,
};
use vela_core::traits::{CallRecordStore, Clock, TokenProvider};
use vela_core::{AppError, AppResult};
use vela_telephony::{CallEvent, CallHandle, DeviceEvent, DeviceSession};

/// The active call session together with its provider handle
struct ActiveCall {
    session: CallSession,
    handle: Option<Arc<dyn CallHandle>>,
}

struct ControllerInner {
    connection: ConnectionState,
    active: Option<ActiveCall>,
    identity: Option<String>,
    event_loop_cancel: Option<CancellationToken>,
}

/// Call lifecycle state machine
///
/// One controller instance serves one authenticated identity. On identity
/// change (sign-out/sign-in) the old controller is `reset()` and a new one
/// is constructed with a fresh device session, so stale call state can never
/// leak between identities.
#[derive(Clone)]
pub struct CallController {
    device: Arc<dyn DeviceSession>,
    tokens: Arc<dyn TokenProvider>,
    records: Arc<dyn CallRecordStore>,
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<ControllerInner>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

impl CallController {
    /// Create a controller with all collaborators injected
    pub fn new(
        device: Arc<dyn DeviceSession>,
        tokens: Arc<dyn TokenProvider>,
        records: Arc<dyn CallRecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Uninitialized);
        Self {
            device,
            tokens,
            records,
            clock,
            inner: Arc::new(Mutex::new(ControllerInner {
                connection: ConnectionState::Uninitialized,
                active: None,
                identity: None,
                event_loop_cancel: None,
            })),
            state_tx: Arc::new(state_tx),
        }
    }

    // ==================== Read-only surface ====================

    /// Current registration state
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to registration state changes
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the active call session, if one exists
    pub async fn session(&self) -> Option<CallSession> {
        self.inner.lock().await.active.as_ref().map(|a| a.session.clone())
    }

    // ==================== Bootstrap ====================

    /// Initialize calling for `identity`: fetch a session token, register
    /// the device, and start consuming its events.
    ///
    /// Token failures never propagate out of here. Whatever goes wrong with
    /// the fetch, the controller degrades to `Disabled` and the rest of the
    /// product keeps working without calling.
    pub async fn init(&self, identity: &str) -> AppResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.connection != ConnectionState::Uninitialized {
                return Err(AppError::InvalidInput(
                    "controller already initialized; reset() before switching identities"
                        .to_string(),
                ));
            }
            inner.identity = Some(identity.to_string());
        }

        let token = match self.tokens.fetch_token(identity).await {
            Ok(token) => token,
            Err(e) => {
                warn!("telephony token unavailable, disabling calling: {}", e);
                self.set_connection(ConnectionState::Disabled).await;
                return Ok(());
            }
        };

        let events = match self.device.take_events() {
            Ok(events) => events,
            Err(e) => {
                warn!("could not subscribe to device events: {}", e);
                self.set_connection(ConnectionState::Error).await;
                return Ok(());
            }
        };

        let cancel = CancellationToken::new();
        {
            let mut inner = self.inner.lock().await;
            inner.event_loop_cancel = Some(cancel.clone());
            self.set_connection_locked(&mut inner, ConnectionState::Connecting);
        }

        tokio::spawn(Self::run_event_loop(self.clone(), events, cancel));

        if let Err(e) = self.device.register(&token).await {
            warn!("device registration failed: {}", e);
            self.set_connection(ConnectionState::Error).await;
            return Ok(());
        }

        info!("device registration started for {}", identity);
        Ok(())
    }

    /// Tear down this identity's calling state
    ///
    /// An in-flight call is terminalized through the regular exactly-once
    /// path (in-progress becomes `completed`, dialing `no-answer`, ringing
    /// `missed`) and recorded under the identity that placed it. The state
    /// returns to `Uninitialized`.
    pub async fn reset(&self) {
        let handle = {
            let mut inner = self.inner.lock().await;

            if let Some(cancel) = inner.event_loop_cancel.take() {
                cancel.cancel();
            }

            let handle = match inner.active.as_ref().map(|a| a.session.phase) {
                Some(CallPhase::InProgress) => {
                    self.finish_active_locked(&mut inner, CallOutcome::Completed)
                }
                Some(CallPhase::Dialing) => {
                    self.finish_active_locked(&mut inner, CallOutcome::NoAnswer)
                }
                Some(CallPhase::Ringing) => {
                    self.finish_active_locked(&mut inner, CallOutcome::Missed)
                }
                None => None,
            };

            inner.identity = None;
            self.set_connection_locked(&mut inner, ConnectionState::Uninitialized);
            handle
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.disconnect().await {
                warn!("provider disconnect during reset failed: {}", e);
            }
        }
        info!("controller reset");
    }

    // ==================== Call control operations ====================

    /// Place an outgoing call
    ///
    /// Rejected locally (the provider is never touched) unless the
    /// connection is `Ready` and no call is active.
    pub async fn dial(&self, destination: &str) -> AppResult<()> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(AppError::InvalidInput(
                "destination must not be empty".to_string(),
            ));
        }

        {
            let mut inner = self.inner.lock().await;
            if !inner.connection.is_call_capable() {
                return Err(AppError::DeviceNotReady(format!(
                    "connection state is {}",
                    inner.connection
                )));
            }
            if inner.active.is_some() {
                return Err(AppError::DeviceNotReady(
                    "another call is already active".to_string(),
                ));
            }
            let identity = inner.identity.clone().ok_or_else(|| {
                AppError::DeviceNotReady("no identity registered".to_string())
            })?;

            inner.active = Some(ActiveCall {
                session: CallSession {
                    identity,
                    remote_address: destination.to_string(),
                    direction: CallDirection::Outgoing,
                    phase: CallPhase::Dialing,
                    started_at: None,
                    provider_call_id: None,
                    muted: false,
                },
                handle: None,
            });
        }

        info!("dialing {}", destination);
        match self.device.connect(destination).await {
            Ok(handle) => {
                let mut inner = self.inner.lock().await;
                let attached = match inner.active.as_mut() {
                    Some(active)
                        if active.session.direction == CallDirection::Outgoing
                            && active.handle.is_none() =>
                    {
                        active.session.provider_call_id = handle.provider_call_id();
                        active.handle = Some(handle.clone());
                        true
                    }
                    _ => false,
                };
                drop(inner);

                if !attached {
                    // A racing event already terminalized the session; tear
                    // down the provider side as well.
                    if let Err(e) = handle.disconnect().await {
                        warn!("failed to disconnect orphaned call: {}", e);
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!("provider connect failed: {}", e);
                let mut inner = self.inner.lock().await;
                self.finish_active_locked(&mut inner, CallOutcome::Failed);
                Err(e)
            }
        }
    }

    /// Hang up the active call
    ///
    /// Idempotent: with no active session this does nothing. While dialing,
    /// the hangup is forwarded to the provider and the session stays until
    /// the provider's cancel event performs the terminal transition.
    pub async fn end_call(&self) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let phase = match inner.active.as_ref() {
            Some(active) => active.session.phase,
            None => {
                debug!("end_call with no active session, ignoring");
                return Ok(());
            }
        };

        match phase {
            CallPhase::InProgress => {
                let handle = self.finish_active_locked(&mut inner, CallOutcome::Completed);
                drop(inner);
                if let Some(handle) = handle {
                    if let Err(e) = handle.disconnect().await {
                        warn!("provider disconnect failed: {}", e);
                    }
                }
            }
            CallPhase::Dialing => {
                let handle = inner.active.as_ref().and_then(|a| a.handle.clone());
                drop(inner);
                if let Some(handle) = handle {
                    if let Err(e) = handle.disconnect().await {
                        warn!("provider disconnect failed: {}", e);
                    }
                }
            }
            CallPhase::Ringing => {
                let handle = self.finish_active_locked(&mut inner, CallOutcome::Missed);
                drop(inner);
                if let Some(handle) = handle {
                    if let Err(e) = handle.reject().await {
                        warn!("provider reject failed: {}", e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Answer the ringing incoming call; no-op when nothing is ringing
    pub async fn accept_call(&self) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let handle = match inner.active.as_mut() {
            Some(active) if active.session.phase == CallPhase::Ringing => {
                active.session.phase = CallPhase::InProgress;
                active.session.started_at = Some(self.clock.now());
                active.handle.clone()
            }
            _ => {
                debug!("accept_call with no ringing session, ignoring");
                return Ok(());
            }
        };
        drop(inner);

        info!("incoming call accepted");
        if let Some(handle) = handle {
            if let Err(e) = handle.accept().await {
                warn!("provider accept failed: {}", e);
            }
        }
        Ok(())
    }

    /// Decline the ringing incoming call; no-op when nothing is ringing
    pub async fn reject_call(&self) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.active.as_ref() {
            Some(active) if active.session.phase == CallPhase::Ringing => {}
            _ => {
                debug!("reject_call with no ringing session, ignoring");
                return Ok(());
            }
        }

        let handle = self.finish_active_locked(&mut inner, CallOutcome::Missed);
        drop(inner);

        if let Some(handle) = handle {
            if let Err(e) = handle.reject().await {
                warn!("provider reject failed: {}", e);
            }
        }
        Ok(())
    }

    /// Flip the local mute flag and forward it to the provider
    ///
    /// No-op when no session exists; the flag is local-only state and does
    /// not depend on the provider acknowledging it.
    pub async fn toggle_mute(&self) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let (muted, handle) = match inner.active.as_mut() {
            Some(active) => {
                active.session.muted = !active.session.muted;
                (active.session.muted, active.handle.clone())
            }
            None => {
                debug!("toggle_mute with no active session, ignoring");
                return Ok(());
            }
        };
        drop(inner);

        if let Some(handle) = handle {
            if let Err(e) = handle.mute(muted).await {
                warn!("provider mute failed: {}", e);
            }
        }
        Ok(())
    }

    // ==================== Event handling ====================

    async fn run_event_loop(
        controller: CallController,
        mut events: mpsc::UnboundedReceiver<DeviceEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("device event loop cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => controller.handle_event(event).await,
                    None => {
                        debug!("device event stream closed");
                        break;
                    }
                }
            }
        }
    }

    async fn handle_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Registered => self.set_connection(ConnectionState::Ready).await,
            DeviceEvent::Unregistered => self.set_connection(ConnectionState::Disconnected).await,
            DeviceEvent::Offline => self.set_connection(ConnectionState::Offline).await,
            DeviceEvent::Error { message } => {
                // Device-scope errors change the registration state only.
                // No session means no record; an active session is ended by
                // its own call-scope error, not this one.
                warn!("device error: {}", message);
                self.set_connection(ConnectionState::Error).await;
            }
            DeviceEvent::Incoming { call } => self.on_incoming(call).await,
            DeviceEvent::Call { call_id, event } => self.on_call_event(call_id, event).await,
        }
    }

    async fn on_incoming(&self, call: Arc<dyn CallHandle>) {
        let remote = call
            .remote_address()
            .unwrap_or_else(|| "unknown".to_string());
        let mut inner = self.inner.lock().await;

        if inner.active.is_some() {
            // Second call while one is live: decline it and record the
            // attempt as busy. The active session is untouched.
            let identity = inner.identity.clone().unwrap_or_default();
            drop(inner);
            info!("incoming call from {} while busy, rejecting", remote);

            let record = NewCallRecord {
                phone_number: remote,
                direction: CallDirection::Incoming,
                outcome: CallOutcome::Busy,
                duration_seconds: 0,
                started_at: self.clock.now(),
                provider_call_id: call.provider_call_id(),
                owner_identity: identity,
            };
            if let Err(e) = call.reject().await {
                warn!("failed to reject busy call: {}", e);
            }
            self.persist_detached(record);
            return;
        }

        let identity = match inner.identity.clone() {
            Some(identity) => identity,
            None => {
                drop(inner);
                warn!("incoming call before initialization, rejecting");
                if let Err(e) = call.reject().await {
                    warn!("failed to reject call: {}", e);
                }
                return;
            }
        };

        info!("incoming call from {}", remote);
        inner.active = Some(ActiveCall {
            session: CallSession {
                identity,
                remote_address: remote,
                direction: CallDirection::Incoming,
                phase: CallPhase::Ringing,
                started_at: None,
                provider_call_id: call.provider_call_id(),
                muted: false,
            },
            handle: Some(call),
        });
    }

    async fn on_call_event(&self, call_id: Option<String>, event: CallEvent) {
        let mut inner = self.inner.lock().await;

        let active = match inner.active.as_mut() {
            Some(active) => active,
            None => {
                debug!(?call_id, ?event, "call event with no active session, dropping");
                return;
            }
        };

        if !session_matches(&active.session, call_id.as_deref()) {
            debug!(?call_id, "call event for a different call, dropping");
            return;
        }

        match event {
            CallEvent::Accepted => {
                if active.session.phase != CallPhase::InProgress {
                    active.session.phase = CallPhase::InProgress;
                    active.session.started_at = Some(self.clock.now());
                    info!("call accepted");
                }
            }
            terminal => {
                if let CallEvent::Error { message } = &terminal {
                    warn!("provider call error: {}", message);
                }
                let outcome = classify_terminal(active.session.phase, &terminal);
                self.finish_active_locked(&mut inner, outcome);
            }
        }
    }

    // ==================== Internals ====================

    /// Terminal transition: take the session out of the state synchronously
    /// and schedule the record write. Returns the provider handle so callers
    /// can forward a control operation after releasing the lock.
    fn finish_active_locked(
        &self,
        inner: &mut ControllerInner,
        outcome: CallOutcome,
    ) -> Option<Arc<dyn CallHandle>> {
        let active = inner.active.take()?;
        let now = self.clock.now();
        let duration = active.session.billable_seconds(now);

        let record = NewCallRecord {
            phone_number: active.session.remote_address.clone(),
            direction: active.session.direction,
            outcome,
            duration_seconds: duration,
            started_at: active.session.started_at.unwrap_or(now),
            provider_call_id: active.session.provider_call_id.clone(),
            owner_identity: active.session.identity.clone(),
        };

        info!(
            outcome = %outcome,
            duration,
            remote = %active.session.remote_address,
            "call terminated"
        );
        self.persist_detached(record);
        active.handle
    }

    /// Fire-and-forget record write. The call is already torn down locally;
    /// losing one analytics row must never affect live-call state, so a
    /// failure here is logged and swallowed.
    fn persist_detached(&self, record: NewCallRecord) {
        let records = self.records.clone();
        tokio::spawn(async move {
            if let Err(e) = records.persist(&record).await {
                error!("failed to persist call record: {}", e);
            }
        });
    }

    fn set_connection_locked(&self, inner: &mut ControllerInner, state: ConnectionState) {
        if inner.connection != state {
            info!("connection state: {} -> {}", inner.connection, state);
        }
        inner.connection = state;
        self.state_tx.send_replace(state);
    }

    async fn set_connection(&self, state: ConnectionState) {
        let mut inner = self.inner.lock().await;
        self.set_connection_locked(&mut inner, state);
    }
}

/// Whether a call-scope event belongs to the active session
///
/// When both sides carry a provider id they must match. With either id
/// missing, the event is attributed to the active session: at most one call
/// exists at a time, and an id can be absent legitimately (events racing the
/// connect result, or a provider erroring before assigning one).
fn session_matches(session: &CallSession, event_call_id: Option<&str>) -> bool {
    match (session.provider_call_id.as_deref(), event_call_id) {
        (Some(own), Some(event)) => own == event,
        _ => true,
    }
}

/// Map a terminal event to the record outcome given the phase it interrupted
fn classify_terminal(phase: CallPhase, event: &CallEvent) -> CallOutcome {
    match phase {
        CallPhase::InProgress => match event {
            CallEvent::Error { .. } => CallOutcome::Failed,
            _ => CallOutcome::Completed,
        },
        CallPhase::Dialing => match event {
            CallEvent::Error { .. } => CallOutcome::Failed,
            _ => CallOutcome::NoAnswer,
        },
        // Anything that kills a ringing incoming call counts as missed,
        // provider errors included.
        CallPhase::Ringing => CallOutcome::Missed,
    }
}
