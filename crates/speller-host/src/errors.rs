//! Error types surfaced by the session facade and its collaborators.

use thiserror::Error;

use crate::provider::ProviderId;

/// Errors returned by [`crate::SessionFacade`].
#[derive(Debug, Error)]
pub enum SpellerError {
    /// The access gate rejected the caller.
    #[error("caller uid {uid} is not allowed to use the spell checker service")]
    AccessDenied {
        /// Caller that was rejected.
        uid: u32,
    },

    /// No user context is active.
    #[error("spell checker service is not active")]
    Inactive,

    /// The request itself was malformed.
    #[error("invalid session request: {reason}")]
    InvalidRequest {
        /// What was wrong with the request.
        reason: &'static str,
    },

    /// The provider is not present in the current registry snapshot.
    #[error("spell checker provider '{id}' is not known")]
    UnknownProvider {
        /// Provider requested by the caller.
        id: String,
    },

    /// The connect primitive refused to start a connection.
    #[error("no session available for provider '{provider}': {source}")]
    ConnectRefused {
        /// Provider the connection was requested for.
        provider: ProviderId,
        /// Refusal reported by the connector.
        #[source]
        source: ConnectError,
    },
}

impl SpellerError {
    pub(crate) fn access_denied(uid: u32) -> Self {
        Self::AccessDenied { uid }
    }

    pub(crate) fn invalid_request(reason: &'static str) -> Self {
        Self::InvalidRequest { reason }
    }

    pub(crate) fn unknown_provider(id: &str) -> Self {
        Self::UnknownProvider { id: id.to_owned() }
    }

    pub(crate) fn connect_refused(provider: ProviderId, source: ConnectError) -> Self {
        Self::ConnectRefused { provider, source }
    }
}

/// Synchronous refusal to attempt a connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("connection refused: {message}")]
pub struct ConnectError {
    message: String,
}

impl ConnectError {
    /// Builds a refusal carrying `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable refusal reason.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Immediate failure while handing a request to a connected provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("provider transport failed: {message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Builds a transport failure carrying `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable failure reason.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// The peer behind a listener is no longer reachable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Default)]
#[error("listener peer is gone")]
pub struct PeerGone;
