//! Lazy per-provider connection broker.
//!
//! Each provider id owns at most one bind group. The
//! first session request for a provider creates its group and starts a
//! connection; requests wait in FIFO order until the provider is connected,
//! are dispatched, and the resulting session listeners are tracked until the
//! caller closes them. The group is torn down exactly once, the moment it has
//! no listeners, pending, or ongoing requests left.
//!
//! All state lives behind one mutex shared with the facade. Transitions run
//! under it and record deferred side effects; those run
//! once the guard is released so collaborators may call straight back in.
//! Callbacks carry the [`ConnectionToken`] of their connection and are
//! ignored when the live group for the provider id no longer matches it.
//!
//! A new group is admitting until its connect call returns. Requests for an
//! admitting provider wait on a condition variable, so a refused connect
//! never strands a request that was already acknowledged. A group retired
//! while admitting is released once connect returns, which keeps every
//! `disconnect` after the `connect` it undoes.

mod action;
mod group;
mod link;
mod request;
mod state;
mod txn;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::errors::SpellerError;
use crate::listener::{ListenerId, SessionHandle};
use crate::provider::{Provider, ProviderId};
use crate::service::{ConnectionToken, Connector, ProviderService};
use crate::snapshot::GroupSnapshot;

use self::action::Deferred;

pub use self::link::{ConnectionLink, SessionReply};
pub(crate) use self::request::{RequestId, TrackedRequest};
pub use self::request::{CallerIdentity, SessionRequest};
pub(crate) use self::state::HostState;
pub(crate) use self::txn::BrokerTxn;

pub(crate) const BROKER_TARGET: &str = "speller_host::broker";

pub(crate) struct Shared {
    state: Mutex<HostState>,
    admission: Condvar,
    connector: Arc<dyn Connector>,
}

impl Shared {
    fn lock(self: &Arc<Self>) -> BrokerTxn<'_> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        BrokerTxn::new(self, guard)
    }

    /// Runs `operation` under the lock and returns the side effects it chose.
    fn transact(self: &Arc<Self>, operation: impl FnOnce(&mut BrokerTxn<'_>)) -> Vec<Deferred> {
        let mut txn = self.lock();
        operation(&mut txn);
        txn.into_deferred()
    }

    fn on_connected(
        self: &Arc<Self>,
        provider_id: &ProviderId,
        token: ConnectionToken,
        service: Arc<dyn ProviderService>,
    ) {
        let mut txn = self.lock();
        txn.connected(provider_id, token, service);
        txn.finish();
    }

    fn on_disconnected(self: &Arc<Self>, provider_id: &ProviderId, token: ConnectionToken) {
        let mut txn = self.lock();
        txn.disconnected(provider_id, token);
        txn.finish();
    }

    fn on_session_ready(
        self: &Arc<Self>,
        provider_id: &ProviderId,
        token: ConnectionToken,
        request: RequestId,
        session: Option<SessionHandle>,
    ) {
        let mut txn = self.lock();
        txn.session_ready(provider_id, token, request, session);
        txn.finish();
    }

    fn run(self: &Arc<Self>, actions: Vec<Deferred>) -> Result<(), SpellerError> {
        let mut queue: VecDeque<Deferred> = actions.into();
        let mut failed: HashSet<ConnectionToken> = HashSet::new();
        let mut outcome = Ok(());

        while let Some(action) = queue.pop_front() {
            match action {
                Deferred::Connect { provider, token } => {
                    let link =
                        ConnectionLink::new(Arc::downgrade(self), provider.id().clone(), token);
                    match self.connector.connect(&provider, link) {
                        Ok(()) => {
                            queue.extend(self.transact(|txn| txn.admitted(provider.id(), token)));
                        }
                        Err(source) => {
                            warn!(
                                target: BROKER_TARGET,
                                provider = %provider.id(),
                                error = %source,
                                "connect refused"
                            );
                            failed.insert(token);
                            queue.extend(self.transact(|txn| txn.abandon(provider.id(), token)));
                            outcome =
                                Err(SpellerError::connect_refused(provider.id().clone(), source));
                        }
                    }
                    self.admission.notify_all();
                }
                Deferred::Dispatch {
                    provider_id,
                    token,
                    service,
                    request,
                    params,
                } => {
                    if failed.contains(&token) {
                        continue;
                    }
                    let reply =
                        SessionReply::new(Arc::downgrade(self), provider_id.clone(), token, request);
                    if let Err(error) = service.create_session(params, reply) {
                        warn!(
                            target: BROKER_TARGET,
                            provider = %provider_id,
                            %error,
                            "session dispatch failed"
                        );
                        failed.insert(token);
                        queue.extend(self.transact(|txn| txn.fail_group(&provider_id, token)));
                    }
                }
                Deferred::Notify {
                    provider_id,
                    token,
                    lifecycle,
                    listener,
                    session,
                } => {
                    if lifecycle.notify_ready(session).is_err() {
                        debug!(
                            target: BROKER_TARGET,
                            provider = %provider_id,
                            %listener,
                            "session owner gone before notification"
                        );
                        queue.extend(
                            self.transact(|txn| txn.forget_listener(&provider_id, token, listener)),
                        );
                    }
                }
                Deferred::Disconnect { provider_id, token } => {
                    self.connector.disconnect(&provider_id, token);
                }
            }
        }
        outcome
    }
}

/// Shared handle to the connection broker and the state it guards.
#[derive(Clone)]
pub struct ConnectionBroker {
    shared: Arc<Shared>,
}

impl ConnectionBroker {
    /// Builds a broker that connects through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(HostState::default()),
                admission: Condvar::new(),
                connector,
            }),
        }
    }

    pub(crate) fn transaction(&self) -> BrokerTxn<'_> {
        self.shared.lock()
    }

    /// Queues a session request for `provider`, connecting lazily.
    ///
    /// # Errors
    ///
    /// Returns [`SpellerError::ConnectRefused`] when a new connection had to
    /// be started and the connector refused it. No group is left behind.
    pub fn request_session(
        &self,
        provider: &Arc<Provider>,
        request: SessionRequest,
    ) -> Result<(), SpellerError> {
        let mut txn = self.transaction().settle(provider.id().as_str());
        txn.request_session(provider, request);
        txn.commit()
    }

    /// Unregisters `listener` from whichever group owns it.
    pub fn remove_listener(&self, listener: ListenerId) {
        let mut txn = self.transaction();
        txn.remove_listener(listener);
        txn.finish();
    }

    /// Drops every listener and request and retires every group.
    pub fn remove_all_listeners(&self) {
        let mut txn = self.transaction();
        txn.retire_all();
        txn.finish();
    }

    /// Diagnostic view of the live groups, ordered by provider id.
    #[must_use]
    pub fn groups(&self) -> Vec<GroupSnapshot> {
        GroupSnapshot::collect(self.transaction().state())
    }

    /// Number of live groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.transaction().state().group_count()
    }
}

impl fmt::Debug for ConnectionBroker {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("ConnectionBroker")
    }
}
