//! Lazy spell checker service broker.
//!
//! The crate connects callers to out-of-process spell checker providers. A
//! [`SessionFacade`] answers which provider and subtype are current, and
//! opens sessions through a [`ConnectionBroker`] that connects to a provider
//! on first demand, queues requests until the connection is live, tracks the
//! listener of every live session, and disconnects once no work remains.
//!
//! Provider discovery, persistence, connection transport, and caller checks
//! are collaborators behind the [`ProviderDiscovery`], [`SettingsStore`],
//! [`Connector`] / [`ProviderService`], and [`AccessGate`] traits, so hosts
//! and tests can plug in their own implementations.
//!
//! The selection is stored per user, not per context locale:
//! [`SessionFacade::current_provider`] keeps its locale argument for parity
//! with callers that pass one, and ignores it.

mod broker;
mod errors;
mod facade;
mod listener;
mod locale;
mod provider;
mod registry;
mod selection;
mod service;
mod settings;
mod snapshot;
pub mod telemetry;

pub use broker::{CallerIdentity, ConnectionBroker, ConnectionLink, SessionReply, SessionRequest};
pub use errors::{ConnectError, PeerGone, SpellerError, TransportError};
pub use facade::{
    AccessGate, AllowAll, Collaborators, FixedLocales, LocaleContext, PackageChange, SessionFacade,
};
pub use listener::{LifecycleListener, ListenerId, SessionExtras, SessionHandle, SessionListener};
pub use locale::{Locale, LocaleParseError, suitable_locales};
pub use provider::{
    BIND_PERMISSION, DescriptorError, Provider, ProviderDescriptor, ProviderId, Subtype,
    SubtypeDescriptor, SubtypeHash,
};
pub use registry::{ProviderDiscovery, ProviderRegistry, RegistrySnapshot};
pub use selection::{SelectionPolicy, select_default_subtype};
pub use service::{ConnectionToken, Connector, ProviderService, SessionParams};
pub use settings::{InMemorySettings, SettingsStore, UserContext};
pub use snapshot::{GroupSnapshot, ProviderSummary, RequestSnapshot, StateSnapshot};

#[cfg(test)]
mod tests;
