//! Shared configuration for the spell checker service broker.
//!
//! The configuration is deliberately small: log output settings consumed by
//! the host's telemetry bootstrap, the extra fallback locales used when picking
//! a default provider, and the default reported for the spell checker enabled
//! flag. Values are deserialised with `serde`; every field has a default so a
//! partial document is valid.

mod defaults;
mod logging;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_SPELL_CHECKER_ENABLED, default_fallback_locales,
    default_log_filter, default_log_filter_string, default_log_format,
    default_spell_checker_enabled,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved broker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `tracing` filter expression, e.g. `info` or `speller_host=debug`.
    pub log_filter: String,
    /// Output format for the log subscriber.
    pub log_format: LogFormat,
    /// Locale tags appended to the default-provider suitability ladder for
    /// non-English system locales.
    pub fallback_locales: Vec<String>,
    /// Enabled flag reported when the settings store holds no value.
    pub spell_checker_enabled_default: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            fallback_locales: default_fallback_locales(),
            spell_checker_enabled_default: default_spell_checker_enabled(),
        }
    }
}

/// Errors raised while loading a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document was not valid JSON or contained unknown keys.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Config {
    /// Parses a JSON configuration document, filling omitted keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is malformed or names
    /// an unknown key.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Filter expression for the log subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output format for the log subscriber.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Extra fallback locale tags, in preference order.
    #[must_use]
    pub fn fallback_locales(&self) -> &[String] {
        self.fallback_locales.as_slice()
    }

    /// Enabled flag reported when nothing was stored.
    #[must_use]
    pub const fn spell_checker_enabled_default(&self) -> bool {
        self.spell_checker_enabled_default
    }
}
