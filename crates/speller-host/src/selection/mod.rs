//! Default provider and subtype selection.
//!
//! Both selections are pure: given the same snapshot and inputs they return
//! the same answer. "Nothing suitable" is reported as `None`, which callers
//! treat as an expected outcome rather than a failure.

use std::sync::Arc;

use tracing::warn;

use crate::locale::{Locale, suitable_locales};
use crate::provider::{Provider, Subtype, SubtypeHash};
use crate::registry::RegistrySnapshot;

const SELECTION_TARGET: &str = "speller_host::selection";

/// Chooses a default provider for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    fallback_locales: Vec<Locale>,
}

impl SelectionPolicy {
    /// Builds a policy consulting `fallback_locales` after the built-in ladder
    /// for non-English system locales.
    #[must_use]
    pub const fn new(fallback_locales: Vec<Locale>) -> Self {
        Self { fallback_locales }
    }

    /// Builds a policy from configuration, skipping unparsable locale tags.
    #[must_use]
    pub fn from_config(config: &speller_config::Config) -> Self {
        let fallback_locales = config
            .fallback_locales()
            .iter()
            .filter_map(|tag| {
                tag.parse::<Locale>()
                    .inspect_err(|error| {
                        warn!(target: SELECTION_TARGET, %error, "ignoring fallback locale");
                    })
                    .ok()
            })
            .collect();
        Self::new(fallback_locales)
    }

    /// Picks the default provider.
    ///
    /// An explicit preference naming a known provider id (or, failing that, a
    /// provider package) wins. Otherwise the locale ladder for `system_locale`
    /// is walked; for each candidate the providers are scanned in discovery
    /// order and the first one declaring a subtype with that exact locale is
    /// returned. When nothing matches, the first provider is returned.
    #[must_use]
    pub fn select_default_provider<'a>(
        &self,
        snapshot: &'a RegistrySnapshot,
        preferred: Option<&str>,
        system_locale: &Locale,
    ) -> Option<&'a Arc<Provider>> {
        if snapshot.is_empty() {
            warn!(target: SELECTION_TARGET, "no spell checker providers available");
            return None;
        }

        if let Some(wanted) = preferred.filter(|value| !value.is_empty()) {
            let by_id = snapshot.get(wanted);
            let by_package = || {
                snapshot
                    .providers()
                    .iter()
                    .find(|provider| provider.package() == wanted)
            };
            if let Some(provider) = by_id.or_else(by_package) {
                return Some(provider);
            }
        }

        for candidate in suitable_locales(system_locale, &self.fallback_locales) {
            let matched = snapshot.providers().iter().find(|provider| {
                provider
                    .subtypes()
                    .iter()
                    .any(|subtype| subtype.locale() == &candidate)
            });
            if matched.is_some() {
                return matched;
            }
        }

        if snapshot.len() > 1 {
            warn!(
                target: SELECTION_TARGET,
                providers = snapshot.len(),
                "more than one spell checker provider found, picking first"
            );
        }
        snapshot.providers().first()
    }
}

/// Resolves the subtype to use for `provider`.
///
/// `stored` is the persisted selection. [`SubtypeHash::NONE`] yields `None`
/// unless `allow_implicit` is set, in which case it behaves like
/// [`SubtypeHash::AUTO`]. `AUTO` matches the current input locale (or the
/// system locale when there is none) against the declared subtypes: an exact
/// tag match wins, otherwise the first subtype whose tag prefixes the
/// candidate is used. Any other value is looked up by hash; a hash that no
/// longer exists yields `None`.
#[must_use]
pub fn select_default_subtype<'a>(
    provider: Option<&'a Provider>,
    stored: SubtypeHash,
    allow_implicit: bool,
    current_input_locale: Option<&Locale>,
    system_locale: &Locale,
) -> Option<&'a Subtype> {
    let subtypes = provider.map(Provider::subtypes).unwrap_or_default();
    if subtypes.is_empty() || (stored == SubtypeHash::NONE && !allow_implicit) {
        return None;
    }
    if stored != SubtypeHash::AUTO && stored != SubtypeHash::NONE {
        return subtypes.iter().find(|subtype| subtype.hash() == stored);
    }

    let candidate = current_input_locale
        .unwrap_or(system_locale)
        .to_string();
    let mut fallback = None;
    for subtype in subtypes {
        let declared = subtype.locale().to_string();
        if declared == candidate {
            return Some(subtype);
        }
        if fallback.is_none()
            && candidate.len() >= 2
            && declared.len() >= 2
            && candidate.starts_with(declared.as_str())
        {
            fallback = Some(subtype);
        }
    }
    fallback
}

#[cfg(test)]
mod tests;
