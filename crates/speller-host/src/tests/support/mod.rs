//! Shared fixtures and doubles for host tests.

mod recording_connector;
mod world;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mockall::mock;
use rstest::fixture;

use crate::broker::{CallerIdentity, SessionRequest};
use crate::errors::PeerGone;
use crate::facade::AccessGate;
use crate::listener::{LifecycleListener, ListenerId, SessionHandle, SessionListener};
use crate::provider::{ProviderDescriptor, SubtypeDescriptor};
use crate::registry::ProviderDiscovery;
use crate::settings::{SettingsStore, UserContext};

pub use recording_connector::{ConnectorCall, GatedConnector, RecordingConnector, RecordingService};
pub use world::TestWorld;

/// User every test caller runs as.
pub const USER: UserContext = UserContext::new(0);

/// Caller uid used by default.
pub const CALLER_UID: u32 = 10_001;

/// Default caller belonging to [`USER`].
#[fixture]
pub fn caller() -> CallerIdentity {
    CallerIdentity::new(CALLER_UID, USER)
}

/// Session listener identified by a fixed id.
#[derive(Debug)]
pub struct StubListener(pub ListenerId);

impl SessionListener for StubListener {
    fn id(&self) -> ListenerId {
        self.0
    }
}

/// Lifecycle listener counting notifications.
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    notified: AtomicUsize,
    sessions: Mutex<Vec<Option<SessionHandle>>>,
    gone: bool,
}

impl RecordingLifecycle {
    /// Lifecycle whose peer already died; every notification fails.
    #[must_use]
    pub fn gone() -> Self {
        Self {
            gone: true,
            ..Self::default()
        }
    }

    /// Number of notifications received, failed ones included.
    pub fn notified(&self) -> usize {
        self.notified.load(Ordering::SeqCst)
    }

    /// Whether the last accepted notification carried a session.
    pub fn received_session(&self) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .last()
            .is_some_and(Option::is_some)
    }
}

impl LifecycleListener for RecordingLifecycle {
    fn notify_ready(&self, session: Option<SessionHandle>) -> Result<(), PeerGone> {
        self.notified.fetch_add(1, Ordering::SeqCst);
        if self.gone {
            return Err(PeerGone);
        }
        self.sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(session);
        Ok(())
    }
}

/// Builds a request whose session listener is `listener_id`.
pub fn request_for(caller: CallerIdentity, listener_id: u64) -> SessionRequest {
    request_with(
        caller,
        listener_id,
        Arc::new(RecordingLifecycle::default()),
    )
}

/// Builds a request reporting readiness to `lifecycle`.
pub fn request_with(
    caller: CallerIdentity,
    listener_id: u64,
    lifecycle: Arc<RecordingLifecycle>,
) -> SessionRequest {
    SessionRequest::new(
        caller,
        lifecycle,
        Arc::new(StubListener(ListenerId::new(listener_id))),
    )
}

/// Descriptor for provider `id` in package `pkg.<id>`.
pub fn descriptor(id: &str, locales: &[&str]) -> ProviderDescriptor {
    ProviderDescriptor::new(
        id,
        format!("pkg.{id}"),
        locales
            .iter()
            .map(|locale| SubtypeDescriptor::new(*locale))
            .collect(),
    )
}

/// Discovery returning a replaceable list of descriptors.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    descriptors: Mutex<Vec<ProviderDescriptor>>,
}

impl StaticDiscovery {
    /// Discovery returning `descriptors`.
    pub fn new(descriptors: Vec<ProviderDescriptor>) -> Self {
        Self {
            descriptors: Mutex::new(descriptors),
        }
    }

    /// Replaces the installed providers.
    pub fn replace(&self, descriptors: Vec<ProviderDescriptor>) {
        *self
            .descriptors
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = descriptors;
    }
}

impl ProviderDiscovery for StaticDiscovery {
    fn discover(&self, _user: UserContext) -> Vec<ProviderDescriptor> {
        self.descriptors
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

mock! {
    pub Gate {}

    impl AccessGate for Gate {
        fn caller_allowed(&self, caller: &CallerIdentity) -> bool;
    }
}

mock! {
    pub Settings {}

    impl SettingsStore for Settings {
        fn selected_provider(&self, user: UserContext) -> String;
        fn put_selected_provider(&self, id: &str, user: UserContext);
        fn selected_subtype_hash(&self, default: i32, user: UserContext) -> i32;
        fn put_selected_subtype_hash(&self, hash: i32, user: UserContext);
        fn is_enabled(&self, user: UserContext) -> bool;
    }
}
