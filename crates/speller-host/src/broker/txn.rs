//! State transitions performed while holding the host lock.

use std::sync::{Arc, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::listener::{ListenerId, SessionHandle};
use crate::provider::{Provider, ProviderId};
use crate::service::{ConnectionToken, ProviderService};

use super::action::Deferred;
use super::group::{Admission, BindGroup};
use super::request::{RequestId, SessionRequest, TrackedRequest};
use super::state::HostState;
use super::{BROKER_TARGET, Shared};

/// Exclusive access to [`HostState`] plus the side effects it has decided on.
///
/// Side effects only run in [`BrokerTxn::commit`], after the guard is gone.
pub(crate) struct BrokerTxn<'a> {
    shared: &'a Arc<Shared>,
    state: MutexGuard<'a, HostState>,
    deferred: Vec<Deferred>,
}

impl<'a> BrokerTxn<'a> {
    pub(super) fn new(shared: &'a Arc<Shared>, state: MutexGuard<'a, HostState>) -> Self {
        Self {
            shared,
            state,
            deferred: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> &HostState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut HostState {
        &mut self.state
    }

    /// Waits, with the lock released, until no connect call for
    /// `provider_id` is awaiting admission.
    ///
    /// Anything read from the state before this call may be stale afterwards.
    pub(crate) fn settle(self, provider_id: &str) -> Self {
        let Self {
            shared,
            state: guard,
            deferred,
        } = self;
        let state = shared
            .admission
            .wait_while(guard, |state| state.is_admitting(provider_id))
            .unwrap_or_else(PoisonError::into_inner);
        Self {
            shared,
            state,
            deferred,
        }
    }

    pub(super) fn into_deferred(self) -> Vec<Deferred> {
        self.deferred
    }

    /// Releases the lock and runs every deferred side effect.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SpellerError::ConnectRefused`] when a connection this
    /// transaction started was refused.
    pub(crate) fn commit(self) -> Result<(), crate::SpellerError> {
        let Self {
            shared,
            state,
            deferred,
        } = self;
        drop(state);
        shared.run(deferred)
    }

    /// Commits a transaction that cannot start connections, logging any
    /// follow-up failure instead of returning it.
    pub(crate) fn finish(self) {
        if let Err(error) = self.commit() {
            debug!(target: BROKER_TARGET, %error, "deferred follow-up failed");
        }
    }

    /// Queues `request` on the group for `provider`, creating the group and
    /// starting a connection when none exists.
    pub(crate) fn request_session(&mut self, provider: &Arc<Provider>, request: SessionRequest) {
        let provider_id = provider.id().clone();
        if self.state.group_mut(&provider_id).is_none() {
            let token = self.state.next_token();
            debug!(
                target: BROKER_TARGET,
                provider = %provider_id,
                %token,
                "creating bind group"
            );
            self.state
                .insert_group(provider_id.clone(), BindGroup::new(token));
            self.deferred.push(Deferred::Connect {
                provider: Arc::clone(provider),
                token,
            });
        }

        let tracked = TrackedRequest {
            id: self.state.next_request(),
            request,
        };
        let Some(group) = self.state.group_mut(&provider_id) else {
            return;
        };
        let token = group.token();
        match group.admit(tracked) {
            Admission::Queued => {
                debug!(target: BROKER_TARGET, provider = %provider_id, "session request queued");
            }
            Admission::Dispatch(dispatch) => {
                self.deferred
                    .push(Deferred::dispatch(provider_id, token, dispatch));
            }
            Admission::Dropped => {
                warn!(
                    target: BROKER_TARGET,
                    provider = %provider_id,
                    "dropping session request for retired bind group"
                );
            }
        }
    }

    pub(super) fn connected(
        &mut self,
        provider_id: &ProviderId,
        token: ConnectionToken,
        service: Arc<dyn ProviderService>,
    ) {
        let Some(group) = self.state.live_group_mut(provider_id, token) else {
            debug!(target: BROKER_TARGET, provider = %provider_id, %token, "ignoring stale connect");
            return;
        };
        let dispatches = group.connect(service);
        debug!(
            target: BROKER_TARGET,
            provider = %provider_id,
            drained = dispatches.len(),
            "provider connected"
        );
        for dispatch in dispatches {
            self.deferred
                .push(Deferred::dispatch(provider_id.clone(), token, dispatch));
        }
    }

    pub(super) fn disconnected(&mut self, provider_id: &ProviderId, token: ConnectionToken) {
        if let Some(group) = self.state.live_group_mut(provider_id, token) {
            group.disconnect();
            debug!(target: BROKER_TARGET, provider = %provider_id, "provider disconnected");
        }
    }

    pub(super) fn session_ready(
        &mut self,
        provider_id: &ProviderId,
        token: ConnectionToken,
        request: RequestId,
        session: Option<SessionHandle>,
    ) {
        let Some(group) = self.state.live_group_mut(provider_id, token) else {
            debug!(target: BROKER_TARGET, provider = %provider_id, %token, "ignoring stale session");
            return;
        };
        if let Some(tracked) = group.complete(request) {
            let listener = Arc::clone(&tracked.request.listener);
            let listener_id = listener.id();
            group.register(listener);
            self.deferred.push(Deferred::Notify {
                provider_id: provider_id.clone(),
                token,
                lifecycle: tracked.request.lifecycle,
                listener: listener_id,
                session,
            });
        }
        self.attempt_teardown(provider_id, token);
    }

    /// Invalidates the whole group after a transport failure.
    pub(super) fn fail_group(&mut self, provider_id: &ProviderId, token: ConnectionToken) {
        if let Some(group) = self.state.live_group_mut(provider_id, token) {
            warn!(
                target: BROKER_TARGET,
                provider = %provider_id,
                "transport failure, dropping every request and listener"
            );
            group.clear_all();
        }
        self.attempt_teardown(provider_id, token);
    }

    /// Unregisters a listener whose peer went away during notification.
    pub(super) fn forget_listener(
        &mut self,
        provider_id: &ProviderId,
        token: ConnectionToken,
        listener: ListenerId,
    ) {
        if let Some(group) = self.state.live_group_mut(provider_id, token) {
            group.unregister(listener);
        }
        self.attempt_teardown(provider_id, token);
    }

    /// Records that the connector accepted the connect call for `token`.
    ///
    /// A group retired while its connect call was in flight had its
    /// disconnect held back; it is issued now.
    pub(super) fn admitted(&mut self, provider_id: &ProviderId, token: ConnectionToken) {
        if let Some(group) = self.state.live_group_mut(provider_id, token) {
            group.admit_connection();
            return;
        }
        debug!(
            target: BROKER_TARGET,
            provider = %provider_id,
            %token,
            "releasing connection retired during admission"
        );
        self.deferred.push(Deferred::Disconnect {
            provider_id: provider_id.clone(),
            token,
        });
    }

    /// Forgets a group whose connection was refused before it started.
    pub(super) fn abandon(&mut self, provider_id: &ProviderId, token: ConnectionToken) {
        if self.state.live_group_mut(provider_id, token).is_some() {
            self.state.remove_group(provider_id);
        }
    }

    /// Unregisters `listener` from every group and retires groups left idle.
    pub(crate) fn remove_listener(&mut self, listener: ListenerId) {
        let targets: Vec<(ProviderId, ConnectionToken)> = self
            .state
            .groups_mut()
            .map(|(id, group)| {
                if group.unregister(listener) {
                    debug!(target: BROKER_TARGET, provider = %id, %listener, "listener removed");
                }
                (id.clone(), group.token())
            })
            .collect();
        for (id, token) in targets {
            self.attempt_teardown(&id, token);
        }
    }

    /// Force-retires every group.
    pub(crate) fn retire_all(&mut self) {
        let targets: Vec<(ProviderId, ConnectionToken)> = self
            .state
            .groups_mut()
            .map(|(id, group)| {
                group.clear_all();
                (id.clone(), group.token())
            })
            .collect();
        if !targets.is_empty() {
            warn!(
                target: BROKER_TARGET,
                groups = targets.len(),
                "force retiring bind groups"
            );
        }
        for (id, token) in targets {
            self.attempt_teardown(&id, token);
        }
    }

    /// Retires the group for `provider_id` when it is idle and still owned by
    /// `token`.
    ///
    /// The disconnect of a group still awaiting admission is issued by
    /// `admitted` once its connect call returns.
    pub(crate) fn attempt_teardown(&mut self, provider_id: &ProviderId, token: ConnectionToken) {
        let Some(group) = self.state.live_group_mut(provider_id, token) else {
            return;
        };
        if !group.try_retire() {
            return;
        }
        let admitting = group.is_admitting();
        self.state.remove_group(provider_id);
        if admitting {
            debug!(
                target: BROKER_TARGET,
                provider = %provider_id,
                %token,
                "retired bind group before admission"
            );
            return;
        }
        debug!(target: BROKER_TARGET, provider = %provider_id, %token, "tearing down bind group");
        self.deferred.push(Deferred::Disconnect {
            provider_id: provider_id.clone(),
            token,
        });
    }
}
