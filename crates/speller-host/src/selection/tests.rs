//! Tests for default provider and subtype selection.

use rstest::{fixture, rstest};

use super::*;
use crate::provider::{ProviderDescriptor, SubtypeDescriptor};

fn locale(tag: &str) -> Locale {
    tag.parse().expect("valid locale")
}

fn descriptor(id: &str, locales: &[&str]) -> ProviderDescriptor {
    ProviderDescriptor::new(
        id,
        format!("pkg.{id}"),
        locales
            .iter()
            .map(|tag| SubtypeDescriptor::new(*tag))
            .collect(),
    )
}

fn snapshot(entries: &[(&str, &[&str])]) -> RegistrySnapshot {
    RegistrySnapshot::from_descriptors(
        entries
            .iter()
            .map(|(id, locales)| descriptor(id, locales)),
    )
}

fn selected_id(
    policy: &SelectionPolicy,
    snapshot: &RegistrySnapshot,
    preferred: Option<&str>,
    system: &str,
) -> Option<String> {
    policy
        .select_default_provider(snapshot, preferred, &locale(system))
        .map(|provider| provider.id().to_string())
}

#[fixture]
fn british_and_american() -> RegistrySnapshot {
    snapshot(&[("p1", &["en-GB"]), ("p2", &["en-US"])])
}

#[rstest]
fn exact_system_locale_beats_discovery_order(british_and_american: RegistrySnapshot) {
    let policy = SelectionPolicy::default();
    assert_eq!(
        selected_id(&policy, &british_and_american, None, "en-US").as_deref(),
        Some("p2")
    );
}

#[rstest]
fn unmatched_locale_falls_back_to_first_provider(british_and_american: RegistrySnapshot) {
    let policy = SelectionPolicy::default();
    assert_eq!(
        selected_id(&policy, &british_and_american, None, "fr-FR").as_deref(),
        Some("p1")
    );
}

#[rstest]
#[case(Some("p2"), "p2")]
#[case(Some("pkg.p2"), "p2")]
#[case(Some("missing"), "p1")]
#[case(Some(""), "p1")]
fn preference_wins_when_known(
    british_and_american: RegistrySnapshot,
    #[case] preferred: Option<&str>,
    #[case] expected: &str,
) {
    let policy = SelectionPolicy::default();
    assert_eq!(
        selected_id(&policy, &british_and_american, preferred, "en-GB").as_deref(),
        Some(expected)
    );
}

#[rstest]
fn language_family_matches_before_tie_break() {
    let registry = snapshot(&[("p1", &["de"]), ("p2", &["fr"])]);
    let policy = SelectionPolicy::default();
    assert_eq!(
        selected_id(&policy, &registry, None, "fr-CA").as_deref(),
        Some("p2")
    );
}

#[rstest]
fn configured_fallbacks_follow_the_ladder() {
    let registry = snapshot(&[("p1", &["es"]), ("p2", &["de"])]);
    let policy = SelectionPolicy::new(vec![locale("de")]);
    assert_eq!(
        selected_id(&policy, &registry, None, "ja-JP").as_deref(),
        Some("p2")
    );
}

#[rstest]
fn config_fallbacks_skip_invalid_tags() {
    let config = speller_config::Config::from_json_str(r#"{"fallback_locales": ["de", "??"]}"#)
        .expect("config parses");
    assert_eq!(
        SelectionPolicy::from_config(&config),
        SelectionPolicy::new(vec![locale("de")])
    );
}

#[rstest]
fn empty_snapshot_selects_nothing() {
    let policy = SelectionPolicy::default();
    assert!(selected_id(&policy, &RegistrySnapshot::empty(), Some("p1"), "en").is_none());
}

#[rstest]
fn provider_selection_is_deterministic(british_and_american: RegistrySnapshot) {
    let policy = SelectionPolicy::default();
    let first = selected_id(&policy, &british_and_american, None, "it-IT");
    for _ in 0..8 {
        assert_eq!(selected_id(&policy, &british_and_american, None, "it-IT"), first);
    }
}

fn provider(locales: &[&str]) -> Provider {
    Provider::try_from(descriptor("p", locales)).expect("provider converts")
}

fn subtype_tag(subtype: Option<&Subtype>) -> Option<String> {
    subtype.map(|subtype| subtype.locale().to_string())
}

#[rstest]
fn auto_prefers_prefix_match_over_none() {
    let provider = provider(&["en", "fr"]);
    let chosen = select_default_subtype(
        Some(&provider),
        SubtypeHash::AUTO,
        false,
        Some(&locale("en-US")),
        &locale("fr-FR"),
    );
    assert_eq!(subtype_tag(chosen).as_deref(), Some("en"));
}

#[rstest]
fn auto_exact_match_wins_over_earlier_prefix() {
    let provider = provider(&["en", "en-US"]);
    let chosen = select_default_subtype(
        Some(&provider),
        SubtypeHash::AUTO,
        false,
        Some(&locale("en-US")),
        &locale("en-US"),
    );
    assert_eq!(subtype_tag(chosen).as_deref(), Some("en-US"));
}

#[rstest]
fn auto_keeps_first_prefix_match() {
    let provider = provider(&["en", "en-GB"]);
    let chosen = select_default_subtype(
        Some(&provider),
        SubtypeHash::AUTO,
        false,
        None,
        &locale("en-GB-oxendict"),
    );
    assert_eq!(subtype_tag(chosen).as_deref(), Some("en"));
}

#[rstest]
fn auto_uses_system_locale_without_input_locale() {
    let provider = provider(&["de", "fr"]);
    let chosen =
        select_default_subtype(Some(&provider), SubtypeHash::AUTO, false, None, &locale("fr-BE"));
    assert_eq!(subtype_tag(chosen).as_deref(), Some("fr"));
}

#[rstest]
fn auto_without_any_match_is_none() {
    let provider = provider(&["de"]);
    let chosen =
        select_default_subtype(Some(&provider), SubtypeHash::AUTO, false, None, &locale("ja"));
    assert!(chosen.is_none());
}

#[rstest]
#[case(false, None)]
#[case(true, Some("en"))]
fn none_requires_implicit_permission(#[case] allow_implicit: bool, #[case] expected: Option<&str>) {
    let provider = provider(&["en"]);
    let chosen = select_default_subtype(
        Some(&provider),
        SubtypeHash::NONE,
        allow_implicit,
        None,
        &locale("en-US"),
    );
    assert_eq!(subtype_tag(chosen).as_deref(), expected);
}

#[rstest]
fn stored_hash_resolves_by_identity() {
    let provider = provider(&["en", "fr"]);
    let stored = SubtypeHash::derive("fr", "");
    let chosen = select_default_subtype(Some(&provider), stored, false, None, &locale("en"));
    assert_eq!(subtype_tag(chosen).as_deref(), Some("fr"));
}

#[rstest]
fn vanished_hash_is_none_not_error() {
    let provider = provider(&["en"]);
    let stored = SubtypeHash::derive("it", "");
    assert!(select_default_subtype(Some(&provider), stored, true, None, &locale("en")).is_none());
}

#[rstest]
fn missing_provider_is_none() {
    assert!(
        select_default_subtype(None, SubtypeHash::AUTO, true, None, &locale("en")).is_none()
    );
}
