//! Serialisable diagnostic view of the host state.

use serde::Serialize;

use crate::broker::{HostState, TrackedRequest};
use crate::listener::ListenerId;
use crate::provider::{Provider, ProviderId};
use crate::service::ConnectionToken;
use crate::settings::UserContext;

/// Point-in-time dump of providers and bind groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    /// User the service is serving.
    pub user: Option<UserContext>,
    /// Whether the service is active for that user.
    pub active: bool,
    /// Selected provider id as persisted, empty when unset.
    pub selected_provider: String,
    /// Known providers in discovery order.
    pub providers: Vec<ProviderSummary>,
    /// Live bind groups ordered by provider id.
    pub groups: Vec<GroupSnapshot>,
}

impl StateSnapshot {
    pub(crate) fn capture(state: &HostState, selected_provider: String) -> Self {
        Self {
            user: state.user,
            active: state.active,
            selected_provider,
            providers: state
                .registry
                .providers()
                .iter()
                .map(|provider| ProviderSummary::from(provider.as_ref()))
                .collect(),
            groups: GroupSnapshot::collect(state),
        }
    }

    /// Renders the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates serialisation failures from `serde_json`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Summary of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    /// Provider id.
    pub id: ProviderId,
    /// Package shipping the provider.
    pub package: String,
    /// Whether the provider ships with the system image.
    pub system: bool,
    /// Declared subtype locales.
    pub subtypes: Vec<String>,
}

impl From<&Provider> for ProviderSummary {
    fn from(provider: &Provider) -> Self {
        Self {
            id: provider.id().clone(),
            package: provider.package().to_owned(),
            system: provider.is_system(),
            subtypes: provider
                .subtypes()
                .iter()
                .map(|subtype| subtype.locale().to_string())
                .collect(),
        }
    }
}

/// State of one bind group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    /// Provider the group connects to.
    pub provider: ProviderId,
    /// Connection attempt owning the group.
    pub token: ConnectionToken,
    /// Whether the connect call has yet to return.
    pub admitting: bool,
    /// Whether the provider is currently connected.
    pub connected: bool,
    /// Whether teardown already fired.
    pub unbind_called: bool,
    /// Requests waiting for the connection.
    pub pending: Vec<RequestSnapshot>,
    /// Requests awaiting the provider's session.
    pub ongoing: Vec<RequestSnapshot>,
    /// Registered session listeners.
    pub listeners: Vec<ListenerId>,
}

impl GroupSnapshot {
    pub(crate) fn collect(state: &HostState) -> Vec<Self> {
        let mut groups: Vec<Self> = state
            .groups()
            .map(|(id, group)| Self {
                provider: id.clone(),
                token: group.token(),
                admitting: group.is_admitting(),
                connected: group.is_connected(),
                unbind_called: group.is_retired(),
                pending: group.pending().map(RequestSnapshot::from_tracked).collect(),
                ongoing: group.ongoing().map(RequestSnapshot::from_tracked).collect(),
                listeners: group.listener_ids().collect(),
            })
            .collect();
        groups.sort_by(|left, right| left.provider.cmp(&right.provider));
        groups
    }
}

/// A queued or in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSnapshot {
    /// Caller uid.
    pub uid: u32,
    /// Locale hint.
    pub locale: Option<String>,
    /// Session listener identity.
    pub listener: ListenerId,
}

impl RequestSnapshot {
    fn from_tracked(tracked: &TrackedRequest) -> Self {
        Self {
            uid: tracked.request.caller.uid,
            locale: tracked.request.locale.clone(),
            listener: tracked.request.listener_id(),
        }
    }
}
