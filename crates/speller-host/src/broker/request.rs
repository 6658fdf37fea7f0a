//! Session requests as submitted by callers and as tracked by bind groups.

use std::fmt;
use std::sync::Arc;

use crate::listener::{LifecycleListener, ListenerId, SessionExtras, SessionListener};
use crate::service::SessionParams;
use crate::settings::UserContext;

/// Identity of the caller behind an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerIdentity {
    /// Process-level identity checked by the access gate.
    pub uid: u32,
    /// User the caller runs as.
    pub user: UserContext,
}

impl CallerIdentity {
    /// Builds a caller identity.
    #[must_use]
    pub const fn new(uid: u32, user: UserContext) -> Self {
        Self { uid, user }
    }
}

/// A request to open a spell checker session.
#[derive(Clone)]
pub struct SessionRequest {
    /// Who is asking.
    pub caller: CallerIdentity,
    /// Optional locale hint forwarded to the provider.
    pub locale: Option<String>,
    /// Notified once the session object is ready.
    pub lifecycle: Arc<dyn LifecycleListener>,
    /// Registered for liveness tracking and forwarded to the provider.
    pub listener: Arc<dyn SessionListener>,
    /// Caller-supplied extras.
    pub extras: SessionExtras,
}

impl SessionRequest {
    /// Builds a request without locale hint or extras.
    #[must_use]
    pub fn new(
        caller: CallerIdentity,
        lifecycle: Arc<dyn LifecycleListener>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            caller,
            locale: None,
            lifecycle,
            listener,
            extras: SessionExtras::new(),
        }
    }

    /// Sets the locale hint.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Adds an extra forwarded to the provider.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Identity of the session listener.
    #[must_use]
    pub fn listener_id(&self) -> ListenerId {
        self.listener.id()
    }
}

impl fmt::Debug for SessionRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionRequest")
            .field("caller", &self.caller)
            .field("locale", &self.locale)
            .field("listener", &self.listener.id())
            .field("extras", &self.extras)
            .finish_non_exhaustive()
    }
}

/// Broker-assigned identity of a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RequestId(u64);

impl RequestId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) const fn get(self) -> u64 {
        self.0
    }
}

/// A request owned by a bind group.
#[derive(Debug, Clone)]
pub(crate) struct TrackedRequest {
    pub(crate) id: RequestId,
    pub(crate) request: SessionRequest,
}

impl TrackedRequest {
    pub(crate) fn params(&self) -> SessionParams {
        SessionParams {
            locale: self.request.locale.clone(),
            listener: Arc::clone(&self.request.listener),
            extras: self.request.extras.clone(),
        }
    }
}
