//! Aggregate state guarded by the host's single lock.

use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::ProviderId;
use crate::registry::RegistrySnapshot;
use crate::service::ConnectionToken;
use crate::settings::UserContext;

use super::group::BindGroup;
use super::request::RequestId;

/// Everything the broker and facade decide on: the registry snapshot, the
/// live bind groups, and the active user.
#[derive(Default)]
pub(crate) struct HostState {
    pub(crate) registry: Arc<RegistrySnapshot>,
    pub(crate) user: Option<UserContext>,
    pub(crate) active: bool,
    groups: HashMap<ProviderId, BindGroup>,
    next_token: u64,
    next_request: u64,
}

impl HostState {
    pub(crate) const fn next_token(&mut self) -> ConnectionToken {
        self.next_token += 1;
        ConnectionToken::new(self.next_token)
    }

    pub(crate) const fn next_request(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId::new(self.next_request)
    }

    /// Whether a connect call for `id` is still awaiting admission.
    pub(crate) fn is_admitting(&self, id: &str) -> bool {
        self.groups.get(id).is_some_and(BindGroup::is_admitting)
    }

    pub(crate) fn group_mut(&mut self, id: &ProviderId) -> Option<&mut BindGroup> {
        self.groups.get_mut(id)
    }

    /// The live group for `id`, provided it still belongs to `token`.
    pub(crate) fn live_group_mut(
        &mut self,
        id: &ProviderId,
        token: ConnectionToken,
    ) -> Option<&mut BindGroup> {
        self.groups
            .get_mut(id)
            .filter(|group| group.token() == token)
    }

    pub(crate) fn insert_group(&mut self, id: ProviderId, group: BindGroup) {
        self.groups.insert(id, group);
    }

    pub(crate) fn remove_group(&mut self, id: &ProviderId) -> Option<BindGroup> {
        self.groups.remove(id)
    }

    pub(crate) fn groups(&self) -> impl Iterator<Item = (&ProviderId, &BindGroup)> {
        self.groups.iter()
    }

    pub(crate) fn groups_mut(&mut self) -> impl Iterator<Item = (&ProviderId, &mut BindGroup)> {
        self.groups.iter_mut()
    }

    pub(crate) fn group_count(&self) -> usize {
        self.groups.len()
    }
}
