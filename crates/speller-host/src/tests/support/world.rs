//! Test world wiring a facade to recording collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use speller_config::Config;

use crate::errors::SpellerError;
use crate::facade::{AllowAll, Collaborators, FixedLocales, SessionFacade};
use crate::listener::ListenerId;
use crate::locale::Locale;
use crate::provider::ProviderDescriptor;
use crate::settings::InMemorySettings;
use crate::snapshot::GroupSnapshot;

use super::recording_connector::{RecordingConnector, RecordingService};
use super::{RecordingLifecycle, StaticDiscovery, USER, caller, request_with};

/// Shared state exercised by unit tests and BDD steps.
pub struct TestWorld {
    /// Facade under test.
    pub facade: SessionFacade,
    /// Connector recording every connect and disconnect.
    pub connector: RecordingConnector,
    /// Service handed out when a connection is reported live.
    pub service: RecordingService,
    /// Settings backing the facade.
    pub settings: Arc<InMemorySettings>,
    /// Discovery backing the registry.
    pub discovery: Arc<StaticDiscovery>,
    lifecycles: HashMap<u64, Arc<RecordingLifecycle>>,
    /// Last error returned by the facade.
    pub last_error: Option<SpellerError>,
}

impl TestWorld {
    /// Builds a world whose system locale is `system`.
    pub fn new(descriptors: Vec<ProviderDescriptor>, system: &str) -> Self {
        Self::with_config(descriptors, system, &Config::default())
    }

    /// Builds a world with an explicit configuration.
    pub fn with_config(descriptors: Vec<ProviderDescriptor>, system: &str, config: &Config) -> Self {
        let connector = RecordingConnector::default();
        let settings = Arc::new(InMemorySettings::from_config(config));
        let discovery = Arc::new(StaticDiscovery::new(descriptors));
        let system_locale: Locale = system.parse().expect("valid system locale");
        let facade = SessionFacade::new(
            Collaborators {
                connector: Arc::new(connector.clone()),
                discovery: Arc::clone(&discovery) as _,
                settings: Arc::clone(&settings) as _,
                gate: Arc::new(AllowAll),
                locales: Arc::new(FixedLocales::new(system_locale)),
            },
            config,
        );
        Self {
            facade,
            connector,
            service: RecordingService::default(),
            settings,
            discovery,
            lifecycles: HashMap::new(),
            last_error: None,
        }
    }

    /// Switches to the test user, already unlocked.
    pub fn activate(&self) {
        self.facade.switch_user(USER, true);
    }

    /// Opens a session for `listener` with `provider`.
    pub fn open(&mut self, provider: &str, listener: u64) {
        self.open_with(provider, listener, RecordingLifecycle::default());
    }

    /// Opens a session whose caller dies before the session is ready.
    pub fn open_dying(&mut self, provider: &str, listener: u64) {
        self.open_with(provider, listener, RecordingLifecycle::gone());
    }

    fn open_with(&mut self, provider: &str, listener: u64, lifecycle: RecordingLifecycle) {
        let shared = Arc::new(lifecycle);
        self.lifecycles.insert(listener, Arc::clone(&shared));
        let request = request_with(caller(), listener, shared);
        self.last_error = self.facade.open_session(provider, request).err();
    }

    /// Reports the connection to `provider` as established.
    pub fn connect(&self, provider: &str) {
        self.connector.fire_connected(provider, &self.service);
    }

    /// Reports the connection to `provider` as dropped.
    pub fn disconnect(&self, provider: &str) {
        self.connector.fire_disconnected(provider);
    }

    /// Delivers every outstanding session.
    pub fn complete_all(&self) {
        self.service.complete_all();
    }

    /// Closes the session owned by `listener`.
    pub fn close(&mut self, listener: u64) {
        self.last_error = self
            .facade
            .close_session(&caller(), ListenerId::new(listener))
            .err();
    }

    /// Lifecycle listener used for `listener`.
    pub fn lifecycle(&self, listener: u64) -> Arc<RecordingLifecycle> {
        self.lifecycles
            .get(&listener)
            .cloned()
            .expect("listener was never opened")
    }

    /// Snapshot of the bind group for `provider`, if live.
    pub fn group(&self, provider: &str) -> Option<GroupSnapshot> {
        self.facade
            .broker()
            .groups()
            .into_iter()
            .find(|group| group.provider.as_str() == provider)
    }
}
