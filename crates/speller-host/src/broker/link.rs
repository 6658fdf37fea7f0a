//! Callback handles given to collaborators.
//!
//! Both handles hold the broker weakly: a callback arriving after the broker
//! was dropped is ignored.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::listener::SessionHandle;
use crate::provider::ProviderId;
use crate::service::{ConnectionToken, ProviderService};

use super::Shared;
use super::request::RequestId;

/// Reports connection progress for one connection attempt.
#[derive(Clone)]
pub struct ConnectionLink {
    shared: Weak<Shared>,
    provider_id: ProviderId,
    token: ConnectionToken,
}

impl ConnectionLink {
    pub(crate) fn new(shared: Weak<Shared>, provider_id: ProviderId, token: ConnectionToken) -> Self {
        Self {
            shared,
            provider_id,
            token,
        }
    }

    /// Provider this connection belongs to.
    #[must_use]
    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    /// Identity of this connection attempt.
    #[must_use]
    pub const fn token(&self) -> ConnectionToken {
        self.token
    }

    /// The provider is reachable through `service`; queued requests drain.
    pub fn connected(&self, service: Arc<dyn ProviderService>) {
        if let Some(shared) = self.shared.upgrade() {
            Shared::on_connected(&shared, &self.provider_id, self.token, service);
        }
    }

    /// The provider dropped; queued and in-flight requests are kept.
    pub fn disconnected(&self) {
        if let Some(shared) = self.shared.upgrade() {
            Shared::on_disconnected(&shared, &self.provider_id, self.token);
        }
    }
}

impl fmt::Debug for ConnectionLink {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConnectionLink")
            .field("provider_id", &self.provider_id)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// One-shot completion for a dispatched session request.
pub struct SessionReply {
    shared: Weak<Shared>,
    provider_id: ProviderId,
    token: ConnectionToken,
    request: RequestId,
}

impl SessionReply {
    pub(crate) fn new(
        shared: Weak<Shared>,
        provider_id: ProviderId,
        token: ConnectionToken,
        request: RequestId,
    ) -> Self {
        Self {
            shared,
            provider_id,
            token,
            request,
        }
    }

    /// Provider the request was sent to.
    #[must_use]
    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    /// Delivers the created session, or `None` when the provider declined.
    pub fn deliver(self, session: Option<SessionHandle>) {
        if let Some(shared) = self.shared.upgrade() {
            Shared::on_session_ready(
                &shared,
                &self.provider_id,
                self.token,
                self.request,
                session,
            );
        }
    }
}

impl fmt::Debug for SessionReply {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionReply")
            .field("provider_id", &self.provider_id)
            .field("token", &self.token)
            .field("request", &self.request.get())
            .finish_non_exhaustive()
    }
}
