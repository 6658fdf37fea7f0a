//! Recording connector and provider service used in tests.
//!
//! Nothing happens asynchronously: tests fire connection and session
//! callbacks explicitly, which lets them interleave callbacks with facade
//! calls in any order.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::broker::{ConnectionLink, SessionReply};
use crate::errors::{ConnectError, TransportError};
use crate::listener::{ListenerId, SessionHandle};
use crate::provider::{Provider, ProviderId};
use crate::service::{ConnectionToken, Connector, ProviderService, SessionParams};

/// Connection-level call observed by the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorCall {
    /// `connect` was invoked.
    Connect(ProviderId, ConnectionToken),
    /// `disconnect` was invoked.
    Disconnect(ProviderId, ConnectionToken),
}

#[derive(Default)]
struct ConnectorState {
    calls: Vec<ConnectorCall>,
    links: Vec<ConnectionLink>,
    refuse: bool,
    immediate: Option<RecordingService>,
}

/// Test double recording every connect and disconnect.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    shared: Arc<Mutex<ConnectorState>>,
}

impl RecordingConnector {
    /// Refuses every subsequent connection attempt.
    pub fn refuse_connections(&self) {
        with_state(&self.shared, |state| state.refuse = true);
    }

    /// Reports every subsequent connection as established from inside
    /// `connect`, using `service`.
    pub fn connect_immediately(&self, service: &RecordingService) {
        with_state(&self.shared, |state| state.immediate = Some(service.clone()));
    }

    /// Recorded calls in order.
    pub fn calls(&self) -> Vec<ConnectorCall> {
        with_state(&self.shared, |state| state.calls.clone())
    }

    /// Number of `connect` calls for `provider`.
    pub fn connect_count(&self, provider: &str) -> usize {
        self.count(provider, |call| matches!(call, ConnectorCall::Connect(..)))
    }

    /// Number of `disconnect` calls for `provider`.
    pub fn disconnect_count(&self, provider: &str) -> usize {
        self.count(provider, |call| matches!(call, ConnectorCall::Disconnect(..)))
    }

    fn count(&self, provider: &str, kind: impl Fn(&ConnectorCall) -> bool) -> usize {
        with_state(&self.shared, |state| {
            state
                .calls
                .iter()
                .filter(|call| kind(call))
                .filter(|call| match call {
                    ConnectorCall::Connect(id, _) | ConnectorCall::Disconnect(id, _) => {
                        id.as_str() == provider
                    }
                })
                .count()
        })
    }

    /// Most recent link handed out for `provider`.
    pub fn link(&self, provider: &str) -> Option<ConnectionLink> {
        with_state(&self.shared, |state| {
            state
                .links
                .iter()
                .rev()
                .find(|link| link.provider_id().as_str() == provider)
                .cloned()
        })
    }

    /// Reports the latest connection for `provider` as established.
    pub fn fire_connected(&self, provider: &str, service: &RecordingService) {
        let link = self.link(provider).expect("provider was never connected");
        link.connected(Arc::new(service.clone()));
    }

    /// Reports the latest connection for `provider` as dropped.
    pub fn fire_disconnected(&self, provider: &str) {
        let link = self.link(provider).expect("provider was never connected");
        link.disconnected();
    }
}

impl Connector for RecordingConnector {
    fn connect(&self, provider: &Provider, link: ConnectionLink) -> Result<(), ConnectError> {
        let immediate = with_state(&self.shared, |state| {
            state
                .calls
                .push(ConnectorCall::Connect(provider.id().clone(), link.token()));
            if state.refuse {
                return Err(ConnectError::new("connections refused by test"));
            }
            state.links.push(link.clone());
            Ok(state.immediate.clone())
        })?;
        if let Some(service) = immediate {
            link.connected(Arc::new(service));
        }
        Ok(())
    }

    fn disconnect(&self, provider: &ProviderId, token: ConnectionToken) {
        with_state(&self.shared, |state| {
            state
                .calls
                .push(ConnectorCall::Disconnect(provider.clone(), token));
        });
    }
}

#[derive(Default)]
struct GateState {
    entered: usize,
    open: bool,
}

/// Connector that blocks inside `connect` until the test opens it, then
/// behaves like the wrapped [`RecordingConnector`].
#[derive(Clone, Default)]
pub struct GatedConnector {
    inner: RecordingConnector,
    gate: Arc<(Mutex<GateState>, Condvar)>,
}

impl GatedConnector {
    /// Recorder behind the gate.
    pub const fn recorder(&self) -> &RecordingConnector {
        &self.inner
    }

    /// Blocks until `count` calls have entered `connect`.
    pub fn wait_until_entered(&self, count: usize) {
        let (lock, signal) = &*self.gate;
        let guard = lock.lock().unwrap_or_else(|poison| poison.into_inner());
        let _entered = signal
            .wait_while(guard, |state| state.entered < count)
            .unwrap_or_else(|poison| poison.into_inner());
    }

    /// Lets every blocked and future `connect` call proceed.
    pub fn open(&self) {
        let (lock, signal) = &*self.gate;
        lock.lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .open = true;
        signal.notify_all();
    }
}

impl Connector for GatedConnector {
    fn connect(&self, provider: &Provider, link: ConnectionLink) -> Result<(), ConnectError> {
        {
            let (lock, signal) = &*self.gate;
            let mut guard = lock.lock().unwrap_or_else(|poison| poison.into_inner());
            guard.entered += 1;
            signal.notify_all();
            let _released = signal
                .wait_while(guard, |state| !state.open)
                .unwrap_or_else(|poison| poison.into_inner());
        }
        self.inner.connect(provider, link)
    }

    fn disconnect(&self, provider: &ProviderId, token: ConnectionToken) {
        self.inner.disconnect(provider, token);
    }
}

#[derive(Default)]
struct ServiceState {
    dispatched: Vec<(ListenerId, Option<String>)>,
    replies: VecDeque<SessionReply>,
    failures: usize,
}

/// Provider service recording dispatched requests and holding their replies.
#[derive(Clone, Default)]
pub struct RecordingService {
    shared: Arc<Mutex<ServiceState>>,
}

impl RecordingService {
    /// Fails the next `count` dispatches with a transport error.
    pub fn fail_next(&self, count: usize) {
        with_state(&self.shared, |state| state.failures = count);
    }

    /// Listener ids of every dispatched request, in dispatch order.
    pub fn dispatched(&self) -> Vec<ListenerId> {
        with_state(&self.shared, |state| {
            state.dispatched.iter().map(|(id, _)| *id).collect()
        })
    }

    /// Locale hints of every dispatched request, in dispatch order.
    pub fn dispatched_locales(&self) -> Vec<Option<String>> {
        with_state(&self.shared, |state| {
            state
                .dispatched
                .iter()
                .map(|(_, locale)| locale.clone())
                .collect()
        })
    }

    /// Number of replies not yet delivered.
    pub fn outstanding(&self) -> usize {
        with_state(&self.shared, |state| state.replies.len())
    }

    /// Delivers the oldest outstanding reply. Returns `false` when none is left.
    pub fn complete_next(&self, session: Option<SessionHandle>) -> bool {
        let reply = with_state(&self.shared, |state| state.replies.pop_front());
        reply.map(|pending| pending.deliver(session)).is_some()
    }

    /// Delivers every outstanding reply with a fresh session handle.
    pub fn complete_all(&self) {
        let replies: Vec<SessionReply> =
            with_state(&self.shared, |state| state.replies.drain(..).collect());
        for (index, reply) in replies.into_iter().enumerate() {
            reply.deliver(Some(SessionHandle::new(format!("session-{index}"))));
        }
    }
}

impl ProviderService for RecordingService {
    fn create_session(
        &self,
        params: SessionParams,
        reply: SessionReply,
    ) -> Result<(), TransportError> {
        with_state(&self.shared, |state| {
            state
                .dispatched
                .push((params.listener.id(), params.locale.clone()));
            if state.failures > 0 {
                state.failures -= 1;
                return Err(TransportError::new("pipe closed"));
            }
            state.replies.push_back(reply);
            Ok(())
        })
    }
}

fn with_state<S, R>(shared: &Arc<Mutex<S>>, action: impl FnOnce(&mut S) -> R) -> R {
    let mut guard = shared.lock().unwrap_or_else(|poison| poison.into_inner());
    action(&mut guard)
}
