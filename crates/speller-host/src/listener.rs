//! Capability handles supplied by callers when they open a session.
//!
//! The broker never calls into a session listener; it only keeps the handle
//! alive while the session is live and identifies it by [`ListenerId`] when
//! the caller closes the session or its peer dies.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::PeerGone;

/// Free-form key-value extras forwarded to the provider with a session request.
pub type SessionExtras = BTreeMap<String, String>;

/// Identity of a session listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Wraps a raw listener identity.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identity.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "listener#{}", self.0)
    }
}

/// Long-lived listener forwarded to the provider and tracked for liveness.
pub trait SessionListener: Send + Sync {
    /// Stable identity used to unregister the listener.
    fn id(&self) -> ListenerId;
}

/// Receives the session handle once the provider has created the session.
pub trait LifecycleListener: Send + Sync {
    /// Delivers the created session, or `None` when the provider declined.
    ///
    /// # Errors
    ///
    /// Returns [`PeerGone`] when the caller is no longer reachable; the
    /// request is consumed regardless.
    fn notify_ready(&self, session: Option<SessionHandle>) -> Result<(), PeerGone>;
}

/// Opaque session object produced by a provider.
#[derive(Clone)]
pub struct SessionHandle(Arc<dyn Any + Send + Sync>);

impl SessionHandle {
    /// Wraps a provider-specific session value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(session: T) -> Self {
        Self(Arc::new(session))
    }

    /// Borrows the wrapped session when it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("SessionHandle(..)")
    }
}
