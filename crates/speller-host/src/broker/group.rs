//! Per-provider connection state.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::listener::{ListenerId, SessionListener};
use crate::service::{ConnectionToken, ProviderService};

use super::request::{RequestId, TrackedRequest};

/// Outcome of offering a request to a group.
pub(crate) enum Admission {
    /// Not connected yet; the request waits in the pending queue.
    Queued,
    /// Connected; the request is now ongoing and must be handed over.
    Dispatch(Dispatch),
    /// The group is retired and accepts nothing.
    Dropped,
}

/// A request that moved to ongoing and still has to reach the provider.
pub(crate) struct Dispatch {
    pub(crate) service: Arc<dyn ProviderService>,
    pub(crate) request: TrackedRequest,
}

/// Connection state for one provider id.
pub(crate) struct BindGroup {
    token: ConnectionToken,
    service: Option<Arc<dyn ProviderService>>,
    admitting: bool,
    unbind_called: bool,
    pending: VecDeque<TrackedRequest>,
    ongoing: Vec<TrackedRequest>,
    listeners: BTreeMap<ListenerId, Arc<dyn SessionListener>>,
}

impl BindGroup {
    /// A group whose connect call has not returned yet.
    pub(crate) const fn new(token: ConnectionToken) -> Self {
        Self {
            token,
            service: None,
            admitting: true,
            unbind_called: false,
            pending: VecDeque::new(),
            ongoing: Vec::new(),
            listeners: BTreeMap::new(),
        }
    }

    pub(crate) const fn token(&self) -> ConnectionToken {
        self.token
    }

    pub(crate) const fn is_connected(&self) -> bool {
        self.service.is_some()
    }

    pub(crate) const fn is_retired(&self) -> bool {
        self.unbind_called
    }

    /// Whether the connector has not yet accepted the connect call.
    pub(crate) const fn is_admitting(&self) -> bool {
        self.admitting
    }

    /// The connector accepted the connect call.
    pub(crate) const fn admit_connection(&mut self) {
        self.admitting = false;
    }

    pub(crate) fn admit(&mut self, request: TrackedRequest) -> Admission {
        if self.unbind_called {
            return Admission::Dropped;
        }
        let Some(service) = self.service.as_ref().map(Arc::clone) else {
            self.pending.push_back(request);
            return Admission::Queued;
        };
        self.ongoing.push(request.clone());
        Admission::Dispatch(Dispatch { service, request })
    }

    /// Marks the group connected and drains pending requests in arrival order.
    pub(crate) fn connect(&mut self, service: Arc<dyn ProviderService>) -> Vec<Dispatch> {
        if self.unbind_called {
            return Vec::new();
        }
        self.service = Some(service);
        let mut dispatches = Vec::with_capacity(self.pending.len());
        while let Some(request) = self.pending.pop_front() {
            if let Admission::Dispatch(dispatch) = self.admit(request) {
                dispatches.push(dispatch);
            }
        }
        dispatches
    }

    /// Drops the service handle; queued work stays for a later reconnect.
    pub(crate) fn disconnect(&mut self) {
        self.service = None;
    }

    /// Removes a completed request from the ongoing set.
    pub(crate) fn complete(&mut self, id: RequestId) -> Option<TrackedRequest> {
        if self.unbind_called {
            return None;
        }
        let position = self.ongoing.iter().position(|tracked| tracked.id == id)?;
        Some(self.ongoing.remove(position))
    }

    pub(crate) fn register(&mut self, listener: Arc<dyn SessionListener>) {
        self.listeners.insert(listener.id(), listener);
    }

    pub(crate) fn unregister(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Forgets every listener and every queued or in-flight request.
    pub(crate) fn clear_all(&mut self) {
        self.listeners.clear();
        self.pending.clear();
        self.ongoing.clear();
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.listeners.is_empty() && self.pending.is_empty() && self.ongoing.is_empty()
    }

    /// Flips `unbind_called` when the group is idle. Returns `true` exactly once.
    pub(crate) fn try_retire(&mut self) -> bool {
        if self.unbind_called || !self.is_idle() {
            return false;
        }
        self.unbind_called = true;
        self.service = None;
        true
    }

    pub(crate) fn pending(&self) -> impl Iterator<Item = &TrackedRequest> {
        self.pending.iter()
    }

    pub(crate) fn ongoing(&self) -> impl Iterator<Item = &TrackedRequest> {
        self.ongoing.iter()
    }

    pub(crate) fn listener_ids(&self) -> impl Iterator<Item = ListenerId> + '_ {
        self.listeners.keys().copied()
    }
}
