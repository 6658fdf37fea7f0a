//! Collaborator traits for reaching out-of-process providers.
//!
//! A [`Connector`] starts connections and reports their progress through the
//! [`ConnectionLink`] it is handed. Once connected, the provider is driven
//! through [`ProviderService`], whose session results come back through a
//! one-shot [`SessionReply`]. Both callbacks may fire from any thread, and
//! may fire synchronously from inside the originating call.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::broker::{ConnectionLink, SessionReply};
use crate::errors::{ConnectError, TransportError};
use crate::listener::{SessionExtras, SessionListener};
use crate::provider::{Provider, ProviderId};

/// Identity of one connection attempt.
///
/// Tokens are never reused, so a callback carrying a token that differs from
/// the live group's token belongs to a retired connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionToken(u64);

impl ConnectionToken {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw token value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "conn#{}", self.0)
    }
}

/// Starts and stops connections to providers.
pub trait Connector: Send + Sync {
    /// Begins connecting to `provider`.
    ///
    /// Progress is reported later through `link`: `connected` once the
    /// provider is reachable and `disconnected` whenever it drops. Either
    /// may repeat for the lifetime of the binding.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] when the connection cannot even be attempted.
    fn connect(&self, provider: &Provider, link: ConnectionLink) -> Result<(), ConnectError>;

    /// Releases the connection identified by `token`. Fire-and-forget.
    fn disconnect(&self, provider: &ProviderId, token: ConnectionToken);
}

/// Session-creation endpoint of a connected provider.
pub trait ProviderService: Send + Sync {
    /// Asks the provider to create a session; the result arrives via `reply`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request could not be handed over.
    /// The broker treats this as a failure of the whole connection.
    fn create_session(&self, params: SessionParams, reply: SessionReply)
    -> Result<(), TransportError>;
}

/// Parameters forwarded to [`ProviderService::create_session`].
#[derive(Clone)]
pub struct SessionParams {
    /// Locale hint supplied by the caller.
    pub locale: Option<String>,
    /// Listener the provider reports spell checking results to.
    pub listener: Arc<dyn SessionListener>,
    /// Caller-supplied extras.
    pub extras: SessionExtras,
}

impl fmt::Debug for SessionParams {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionParams")
            .field("locale", &self.locale)
            .field("listener", &self.listener.id())
            .field("extras", &self.extras)
            .finish()
    }
}
