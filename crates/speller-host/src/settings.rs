//! Persistence of the selected provider and subtype.
//!
//! The broker treats the store as eventually consistent key-value storage
//! keyed by [`UserContext`]; nothing here is transactional with broker state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Opaque user (or account) the stored selection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserContext(u32);

impl UserContext {
    /// Wraps a raw user id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw user id.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UserContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "user#{}", self.0)
    }
}

/// Key-value store holding per-user spell checker settings.
pub trait SettingsStore: Send + Sync {
    /// Selected provider id; empty when nothing is selected.
    fn selected_provider(&self, user: UserContext) -> String;

    /// Stores the selected provider id; an empty id clears the selection.
    fn put_selected_provider(&self, id: &str, user: UserContext);

    /// Stored subtype hash, or `default` when none was written.
    fn selected_subtype_hash(&self, default: i32, user: UserContext) -> i32;

    /// Stores the selected subtype hash.
    fn put_selected_subtype_hash(&self, hash: i32, user: UserContext);

    /// Whether spell checking is enabled for `user`.
    fn is_enabled(&self, user: UserContext) -> bool;
}

#[derive(Debug, Default, Clone)]
struct UserSettings {
    provider: Option<String>,
    subtype_hash: Option<i32>,
    enabled: Option<bool>,
}

/// Process-local [`SettingsStore`], useful for embedding and tests.
#[derive(Debug)]
pub struct InMemorySettings {
    enabled_default: bool,
    users: Mutex<HashMap<UserContext, UserSettings>>,
}

impl InMemorySettings {
    /// Creates an empty store reporting `enabled_default` until the flag is set.
    #[must_use]
    pub fn new(enabled_default: bool) -> Self {
        Self {
            enabled_default,
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a store using the configured enabled default.
    #[must_use]
    pub fn from_config(config: &speller_config::Config) -> Self {
        Self::new(config.spell_checker_enabled_default())
    }

    /// Sets the enabled flag for `user`.
    pub fn set_enabled(&self, enabled: bool, user: UserContext) {
        self.update(user, |settings| settings.enabled = Some(enabled));
    }

    fn read<R>(&self, user: UserContext, read: impl FnOnce(Option<&UserSettings>) -> R) -> R {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        read(users.get(&user))
    }

    fn update(&self, user: UserContext, update: impl FnOnce(&mut UserSettings)) {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        update(users.entry(user).or_default());
    }
}

impl Default for InMemorySettings {
    fn default() -> Self {
        Self::new(speller_config::DEFAULT_SPELL_CHECKER_ENABLED)
    }
}

impl SettingsStore for InMemorySettings {
    fn selected_provider(&self, user: UserContext) -> String {
        self.read(user, |settings| {
            settings
                .and_then(|s| s.provider.clone())
                .unwrap_or_default()
        })
    }

    fn put_selected_provider(&self, id: &str, user: UserContext) {
        let value = (!id.is_empty()).then(|| id.to_owned());
        self.update(user, |settings| settings.provider = value);
    }

    fn selected_subtype_hash(&self, default: i32, user: UserContext) -> i32 {
        self.read(user, |settings| {
            settings.and_then(|s| s.subtype_hash).unwrap_or(default)
        })
    }

    fn put_selected_subtype_hash(&self, hash: i32, user: UserContext) {
        self.update(user, |settings| settings.subtype_hash = Some(hash));
    }

    fn is_enabled(&self, user: UserContext) -> bool {
        self.read(user, |settings| {
            settings
                .and_then(|s| s.enabled)
                .unwrap_or(self.enabled_default)
        })
    }
}
