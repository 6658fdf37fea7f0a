//! Provider registry snapshots rebuilt from the discovery collaborator.
//!
//! A [`RegistrySnapshot`] is immutable. Rebuilding produces a fresh snapshot
//! that the host swaps in under its state lock, so readers never observe a
//! half-updated registry. Callers resolve providers by id on every decision
//! instead of holding on to [`Provider`] values across a rebuild.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::provider::{Provider, ProviderDescriptor, ProviderId};
use crate::settings::UserContext;

const REGISTRY_TARGET: &str = "speller_host::registry";

/// Source of raw provider descriptors, typically the host's package registry.
pub trait ProviderDiscovery: Send + Sync {
    /// Lists the providers installed for `user`, in discovery order.
    fn discover(&self, user: UserContext) -> Vec<ProviderDescriptor>;
}

/// Immutable view of the known providers.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    providers: Vec<Arc<Provider>>,
    index: HashMap<ProviderId, usize>,
}

impl RegistrySnapshot {
    /// Snapshot with no providers.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot from raw descriptors.
    ///
    /// Descriptors that fail validation, or that repeat an id already seen,
    /// are skipped with a warning; a bad descriptor never aborts the rebuild.
    #[must_use]
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ProviderDescriptor>) -> Self {
        let mut snapshot = Self::default();
        for descriptor in descriptors {
            let package = descriptor.package.clone();
            match Provider::try_from(descriptor) {
                Ok(provider) if snapshot.index.contains_key(provider.id()) => {
                    warn!(
                        target: REGISTRY_TARGET,
                        provider = %provider.id(),
                        package = %package,
                        "skipping duplicate provider id"
                    );
                }
                Ok(provider) => {
                    snapshot
                        .index
                        .insert(provider.id().clone(), snapshot.providers.len());
                    snapshot.providers.push(Arc::new(provider));
                }
                Err(error) => {
                    warn!(
                        target: REGISTRY_TARGET,
                        package = %package,
                        %error,
                        "skipping spell checker provider"
                    );
                }
            }
        }
        debug!(
            target: REGISTRY_TARGET,
            providers = snapshot.providers.len(),
            "registry rebuilt"
        );
        snapshot
    }

    /// Looks up a provider by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Provider>> {
        self.index
            .get(id)
            .and_then(|position| self.providers.get(*position))
    }

    /// Whether a provider with `id` is known.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Providers in discovery order.
    #[must_use]
    pub fn providers(&self) -> &[Arc<Provider>] {
        self.providers.as_slice()
    }

    /// Number of providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the snapshot holds no providers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Rebuilds registry snapshots on demand.
#[derive(Clone)]
pub struct ProviderRegistry {
    discovery: Arc<dyn ProviderDiscovery>,
}

impl ProviderRegistry {
    /// Wraps a discovery collaborator.
    #[must_use]
    pub fn new(discovery: Arc<dyn ProviderDiscovery>) -> Self {
        Self { discovery }
    }

    /// Queries discovery for `user` and builds a fresh snapshot.
    #[must_use]
    pub fn rebuild(&self, user: UserContext) -> RegistrySnapshot {
        RegistrySnapshot::from_descriptors(self.discovery.discover(user))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("ProviderRegistry")
    }
}
