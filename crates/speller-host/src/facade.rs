//! Public entry points composing the registry, selection policy, settings
//! store, and connection broker.
//!
//! Every caller-facing operation passes the [`AccessGate`] first and then
//! requires the caller to belong to the active user. Selection decisions and
//! broker transitions share the broker's lock, so no caller observes a bind
//! group for a provider the current registry snapshot no longer describes.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use speller_config::Config;

use crate::broker::{BrokerTxn, CallerIdentity, ConnectionBroker, HostState, SessionRequest};
use crate::errors::SpellerError;
use crate::listener::ListenerId;
use crate::locale::Locale;
use crate::provider::{Provider, Subtype, SubtypeHash};
use crate::registry::{ProviderDiscovery, ProviderRegistry, RegistrySnapshot};
use crate::selection::{SelectionPolicy, select_default_subtype};
use crate::service::Connector;
use crate::settings::{SettingsStore, UserContext};
use crate::snapshot::StateSnapshot;

const FACADE_TARGET: &str = "speller_host::facade";

/// Decides whether a caller may use the service at all.
pub trait AccessGate: Send + Sync {
    /// Returns `true` when `caller` is permitted.
    fn caller_allowed(&self, caller: &CallerIdentity) -> bool;
}

/// Gate admitting every caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn caller_allowed(&self, _caller: &CallerIdentity) -> bool {
        true
    }
}

/// Supplies the locales selection decisions depend on.
pub trait LocaleContext: Send + Sync {
    /// Current system locale.
    fn system_locale(&self) -> Locale;

    /// Locale of the active input method, if one is known.
    fn current_input_locale(&self) -> Option<Locale>;
}

/// [`LocaleContext`] returning fixed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedLocales {
    system: Locale,
    input: Option<Locale>,
}

impl FixedLocales {
    /// Uses `system` and no input locale.
    #[must_use]
    pub const fn new(system: Locale) -> Self {
        Self {
            system,
            input: None,
        }
    }

    /// Adds an input locale.
    #[must_use]
    pub fn with_input(mut self, input: Locale) -> Self {
        self.input = Some(input);
        self
    }
}

impl LocaleContext for FixedLocales {
    fn system_locale(&self) -> Locale {
        self.system.clone()
    }

    fn current_input_locale(&self) -> Option<Locale> {
        self.input.clone()
    }
}

/// External collaborators the facade is assembled from.
#[derive(Clone)]
pub struct Collaborators {
    /// Starts and stops provider connections.
    pub connector: Arc<dyn Connector>,
    /// Lists installed providers.
    pub discovery: Arc<dyn ProviderDiscovery>,
    /// Persists the user's selection.
    pub settings: Arc<dyn SettingsStore>,
    /// Caller permission check.
    pub gate: Arc<dyn AccessGate>,
    /// System and input locales.
    pub locales: Arc<dyn LocaleContext>,
}

/// Packages that changed for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageChange {
    /// User whose packages changed.
    pub user: UserContext,
    /// Packages that were removed or became unavailable.
    pub disappeared: BTreeSet<String>,
    /// Packages that were updated in place.
    pub modified: BTreeSet<String>,
}

impl PackageChange {
    /// Empty change set for `user`.
    #[must_use]
    pub const fn new(user: UserContext) -> Self {
        Self {
            user,
            disappeared: BTreeSet::new(),
            modified: BTreeSet::new(),
        }
    }

    /// Marks `package` as removed.
    #[must_use]
    pub fn disappeared(mut self, package: impl Into<String>) -> Self {
        self.disappeared.insert(package.into());
        self
    }

    /// Marks `package` as updated.
    #[must_use]
    pub fn modified(mut self, package: impl Into<String>) -> Self {
        self.modified.insert(package.into());
        self
    }

    fn touches(&self, package: &str) -> bool {
        self.disappeared.contains(package) || self.modified.contains(package)
    }
}

/// Spell checker service facade.
pub struct SessionFacade {
    broker: ConnectionBroker,
    registry: ProviderRegistry,
    policy: SelectionPolicy,
    settings: Arc<dyn SettingsStore>,
    gate: Arc<dyn AccessGate>,
    locales: Arc<dyn LocaleContext>,
}

impl SessionFacade {
    /// Assembles the facade. No user is active until [`Self::switch_user`].
    #[must_use]
    pub fn new(collaborators: Collaborators, config: &Config) -> Self {
        let Collaborators {
            connector,
            discovery,
            settings,
            gate,
            locales,
        } = collaborators;
        Self {
            broker: ConnectionBroker::new(connector),
            registry: ProviderRegistry::new(discovery),
            policy: SelectionPolicy::from_config(config),
            settings,
            gate,
            locales,
        }
    }

    /// Broker backing this facade.
    #[must_use]
    pub const fn broker(&self) -> &ConnectionBroker {
        &self.broker
    }

    /// Makes `user` the current user, retiring all state of the previous one.
    ///
    /// The registry is only rebuilt when the user is already unlocked;
    /// otherwise [`Self::unlock_user`] completes initialisation later.
    pub fn switch_user(&self, user: UserContext, unlocked: bool) {
        let mut txn = self.broker.transaction();
        Self::reset(&mut txn);
        txn.state_mut().user = Some(user);
        info!(target: FACADE_TARGET, %user, unlocked, "switching user");
        if unlocked {
            self.initialise(&mut txn, user);
        }
        txn.finish();
    }

    /// Completes initialisation once the current user unlocks.
    pub fn unlock_user(&self, user: UserContext) {
        let mut txn = self.broker.transaction();
        let state = txn.state();
        if state.user == Some(user) && !state.active {
            self.initialise(&mut txn, user);
        }
        txn.finish();
    }

    /// Retires every bind group and discards the registry snapshot.
    pub fn disable(&self) {
        let mut txn = self.broker.transaction();
        Self::reset(&mut txn);
        info!(target: FACADE_TARGET, "spell checker service disabled");
        txn.finish();
    }

    fn reset(txn: &mut BrokerTxn<'_>) {
        txn.retire_all();
        let state = txn.state_mut();
        state.registry = Arc::new(RegistrySnapshot::empty());
        state.active = false;
    }

    fn initialise(&self, txn: &mut BrokerTxn<'_>, user: UserContext) {
        let snapshot = Arc::new(self.registry.rebuild(user));
        {
            let state = txn.state_mut();
            state.registry = Arc::clone(&snapshot);
            state.active = true;
        }
        if Self::resolve_current(&snapshot, self.settings.as_ref(), user).is_some() {
            return;
        }
        let system = self.locales.system_locale();
        let Some(provider) = self.policy.select_default_provider(&snapshot, None, &system) else {
            debug!(target: FACADE_TARGET, %user, "no default provider to select");
            return;
        };
        self.persist_provider(provider, user);
    }

    fn resolve_current(
        snapshot: &RegistrySnapshot,
        settings: &dyn SettingsStore,
        user: UserContext,
    ) -> Option<Arc<Provider>> {
        let id = settings.selected_provider(user);
        if id.is_empty() {
            return None;
        }
        snapshot.get(&id).cloned()
    }

    fn persist_provider(&self, provider: &Provider, user: UserContext) {
        info!(
            target: FACADE_TARGET,
            %user,
            provider = %provider.id(),
            "selecting spell checker provider"
        );
        self.settings.put_selected_provider(provider.id().as_str(), user);
        self.settings
            .put_selected_subtype_hash(SubtypeHash::AUTO.get(), user);
    }

    /// Checks the gate, takes the lock, and confirms the caller belongs to
    /// the active user.
    fn admit(&self, caller: &CallerIdentity) -> Result<BrokerTxn<'_>, SpellerError> {
        if !self.gate.caller_allowed(caller) {
            return Err(SpellerError::access_denied(caller.uid));
        }
        let txn = self.broker.transaction();
        if !Self::serves(txn.state(), caller.user) {
            return Err(SpellerError::Inactive);
        }
        Ok(txn)
    }

    fn serves(state: &HostState, user: UserContext) -> bool {
        state.active && state.user == Some(user)
    }

    /// The selected provider, resolved against the live registry.
    ///
    /// Returns `None` when nothing is selected or the selection no longer
    /// resolves; no fallback selection happens here. The selection is kept
    /// per user, so `_context_locale` does not influence the result.
    ///
    /// # Errors
    ///
    /// Returns [`SpellerError::AccessDenied`] or [`SpellerError::Inactive`]
    /// when the caller may not use the service.
    pub fn current_provider(
        &self,
        caller: &CallerIdentity,
        _context_locale: Option<&Locale>,
    ) -> Result<Option<Arc<Provider>>, SpellerError> {
        let txn = self.admit(caller)?;
        Ok(Self::resolve_current(
            &txn.state().registry,
            self.settings.as_ref(),
            caller.user,
        ))
    }

    /// The subtype to use with the current provider.
    ///
    /// `input_locale` overrides the input method locale reported by the
    /// [`LocaleContext`] when resolving an automatic selection.
    ///
    /// # Errors
    ///
    /// Returns [`SpellerError::AccessDenied`] or [`SpellerError::Inactive`]
    /// when the caller may not use the service.
    pub fn current_subtype(
        &self,
        caller: &CallerIdentity,
        input_locale: Option<&Locale>,
        allow_implicit: bool,
    ) -> Result<Option<Subtype>, SpellerError> {
        let txn = self.admit(caller)?;
        let registry = Arc::clone(&txn.state().registry);
        drop(txn);

        let provider = Self::resolve_current(&registry, self.settings.as_ref(), caller.user);
        let stored = SubtypeHash::from_raw(
            self.settings
                .selected_subtype_hash(SubtypeHash::NONE.get(), caller.user),
        );
        let input = input_locale
            .cloned()
            .or_else(|| self.locales.current_input_locale());
        let system = self.locales.system_locale();
        Ok(select_default_subtype(
            provider.as_deref(),
            stored,
            allow_implicit,
            input.as_ref(),
            &system,
        )
        .cloned())
    }

    /// Opens a session with `provider_id`, connecting lazily.
    ///
    /// # Errors
    ///
    /// Returns [`SpellerError::InvalidRequest`] for an empty id,
    /// [`SpellerError::UnknownProvider`] when the id is not in the registry,
    /// and [`SpellerError::ConnectRefused`] when the connector refused to
    /// start the connection.
    pub fn open_session(
        &self,
        provider_id: &str,
        request: SessionRequest,
    ) -> Result<(), SpellerError> {
        let mut txn = self.admit(&request.caller)?;
        if provider_id.is_empty() {
            return Err(SpellerError::invalid_request("provider id is empty"));
        }
        txn = txn.settle(provider_id);
        if !Self::serves(txn.state(), request.caller.user) {
            return Err(SpellerError::Inactive);
        }
        let Some(provider) = txn.state().registry.get(provider_id).cloned() else {
            return Err(SpellerError::unknown_provider(provider_id));
        };
        debug!(
            target: FACADE_TARGET,
            provider = %provider.id(),
            listener = %request.listener_id(),
            "opening session"
        );
        txn.request_session(&provider, request);
        txn.commit()
    }

    /// Closes the session owned by `listener`.
    ///
    /// # Errors
    ///
    /// Returns [`SpellerError::AccessDenied`] or [`SpellerError::Inactive`]
    /// when the caller may not use the service.
    pub fn close_session(
        &self,
        caller: &CallerIdentity,
        listener: ListenerId,
    ) -> Result<(), SpellerError> {
        let mut txn = self.admit(caller)?;
        txn.remove_listener(listener);
        txn.finish();
        Ok(())
    }

    /// Liveness notification: the peer behind `listener` died.
    pub fn listener_died(&self, listener: ListenerId) {
        debug!(target: FACADE_TARGET, %listener, "session listener died");
        let mut txn = self.broker.transaction();
        txn.remove_listener(listener);
        txn.finish();
    }

    /// Whether spell checking is enabled for the caller's user.
    ///
    /// # Errors
    ///
    /// Returns [`SpellerError::AccessDenied`] or [`SpellerError::Inactive`]
    /// when the caller may not use the service.
    pub fn is_spell_checker_enabled(&self, caller: &CallerIdentity) -> Result<bool, SpellerError> {
        drop(self.admit(caller)?);
        Ok(self.settings.is_enabled(caller.user))
    }

    /// Known providers in discovery order.
    ///
    /// # Errors
    ///
    /// Returns [`SpellerError::AccessDenied`] or [`SpellerError::Inactive`]
    /// when the caller may not use the service.
    pub fn enabled_providers(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Vec<Arc<Provider>>, SpellerError> {
        let txn = self.admit(caller)?;
        Ok(txn.state().registry.providers().to_vec())
    }

    /// Persists `provider_id` as the selection and resets the subtype to
    /// automatic.
    ///
    /// # Errors
    ///
    /// Returns [`SpellerError::UnknownProvider`] when the id is not in the
    /// registry, besides the usual gate errors.
    pub fn set_current_provider(
        &self,
        caller: &CallerIdentity,
        provider_id: &str,
    ) -> Result<(), SpellerError> {
        let txn = self.admit(caller)?;
        let provider = txn
            .state()
            .registry
            .get(provider_id)
            .cloned()
            .ok_or_else(|| SpellerError::unknown_provider(provider_id))?;
        self.persist_provider(&provider, caller.user);
        Ok(())
    }

    /// Persists `hash` when it names a subtype of the current provider, and
    /// the automatic selection otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SpellerError::AccessDenied`] or [`SpellerError::Inactive`]
    /// when the caller may not use the service.
    pub fn set_current_subtype(
        &self,
        caller: &CallerIdentity,
        hash: SubtypeHash,
    ) -> Result<(), SpellerError> {
        let txn = self.admit(caller)?;
        let provider =
            Self::resolve_current(&txn.state().registry, self.settings.as_ref(), caller.user);
        let stored = provider
            .as_deref()
            .and_then(|provider| provider.subtype(hash))
            .map_or(SubtypeHash::AUTO, Subtype::hash);
        self.settings
            .put_selected_subtype_hash(stored.get(), caller.user);
        Ok(())
    }

    /// Rebuilds the registry after installed packages changed.
    ///
    /// When the selected provider's package disappeared or was modified, a
    /// new default is chosen, preferring the same package, and persisted if
    /// it differs. Without a selection nothing is persisted.
    pub fn on_providers_changed(&self, change: &PackageChange) {
        let mut txn = self.broker.transaction();
        if !Self::serves(txn.state(), change.user) {
            debug!(target: FACADE_TARGET, user = %change.user, "ignoring background package change");
            return;
        }
        let selected = Self::resolve_current(
            &txn.state().registry,
            self.settings.as_ref(),
            change.user,
        );
        let snapshot = Arc::new(self.registry.rebuild(change.user));
        txn.state_mut().registry = Arc::clone(&snapshot);

        let Some(current) = selected.filter(|provider| change.touches(provider.package())) else {
            return;
        };
        let system = self.locales.system_locale();
        let replacement = self
            .policy
            .select_default_provider(&snapshot, Some(current.package()), &system)
            .filter(|next| next.id() != current.id());
        if let Some(next) = replacement {
            self.persist_provider(next, change.user);
        }
    }

    /// Diagnostic dump of the current state.
    #[must_use]
    pub fn dump(&self) -> StateSnapshot {
        let txn = self.broker.transaction();
        let state = txn.state();
        let selected = state
            .user
            .map(|user| self.settings.selected_provider(user))
            .unwrap_or_default();
        StateSnapshot::capture(state, selected)
    }
}

impl fmt::Debug for SessionFacade {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionFacade")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
