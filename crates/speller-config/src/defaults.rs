use crate::logging::LogFormat;

/// Default log filter expression used by hosts embedding the broker.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Value reported for the spell checker enabled flag when it was never stored.
pub const DEFAULT_SPELL_CHECKER_ENABLED: bool = true;

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Extra fallback locales consulted after the built-in suitability ladder.
///
/// Empty by default: a non-English system locale only matches providers
/// declaring that locale or its bare language.
#[must_use]
pub const fn default_fallback_locales() -> Vec<String> {
    Vec::new()
}

/// Default for the spell checker enabled flag.
#[must_use]
pub const fn default_spell_checker_enabled() -> bool {
    DEFAULT_SPELL_CHECKER_ENABLED
}
