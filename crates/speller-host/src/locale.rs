//! Locale tags and the suitability ladder used for default provider selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENGLISH: &str = "en";

/// A `language[-region[-variant]]` locale tag.
///
/// Parsing accepts both `-` and `_` separators; the canonical rendering uses
/// `-`, a lower-case language, and an upper-case region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale {
    language: String,
    region: Option<String>,
    variant: Option<String>,
}

impl Locale {
    /// Builds a language-only locale.
    ///
    /// # Errors
    ///
    /// Returns [`LocaleParseError`] when `language` is not two to eight ASCII
    /// letters.
    pub fn language(language: &str) -> Result<Self, LocaleParseError> {
        Ok(Self {
            language: parse_language(language)?,
            region: None,
            variant: None,
        })
    }

    /// Language subtag, always lower case.
    #[must_use]
    pub fn language_code(&self) -> &str {
        self.language.as_str()
    }

    /// Region subtag, if any.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Variant subtag, if any.
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// Whether the language subtag is English.
    #[must_use]
    pub fn is_english(&self) -> bool {
        self.language == ENGLISH
    }

    fn language_only(&self) -> Self {
        Self {
            language: self.language.clone(),
            region: None,
            variant: None,
        }
    }

    fn language_region(&self) -> Option<Self> {
        self.region.as_ref().map(|region| Self {
            language: self.language.clone(),
            region: Some(region.clone()),
            variant: None,
        })
    }

    fn with_region(language: &str, region: &str) -> Self {
        Self {
            language: language.to_owned(),
            region: Some(region.to_owned()),
            variant: None,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.language)?;
        if let Some(region) = &self.region {
            write!(formatter, "-{region}")?;
        }
        if let Some(variant) = &self.variant {
            write!(formatter, "-{variant}")?;
        }
        Ok(())
    }
}

/// Errors raised when parsing locale tags.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid locale tag '{input}': {reason}")]
pub struct LocaleParseError {
    input: String,
    reason: &'static str,
}

impl LocaleParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_owned(),
            reason,
        }
    }

    /// Returns the input that failed to parse.
    #[must_use]
    pub fn input(&self) -> &str {
        self.input.as_str()
    }
}

fn parse_language(input: &str) -> Result<String, LocaleParseError> {
    let valid = (2..=8).contains(&input.len()) && input.bytes().all(|b| b.is_ascii_alphabetic());
    if !valid {
        return Err(LocaleParseError::new(input, "language must be 2-8 letters"));
    }
    Ok(input.to_ascii_lowercase())
}

fn parse_region(input: &str) -> Option<String> {
    let alpha = input.len() == 2 && input.bytes().all(|b| b.is_ascii_alphabetic());
    let numeric = input.len() == 3 && input.bytes().all(|b| b.is_ascii_digit());
    (alpha || numeric).then(|| input.to_ascii_uppercase())
}

impl FromStr for Locale {
    type Err = LocaleParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LocaleParseError::new(input, "tag is empty"));
        }
        let mut parts = trimmed.split(['-', '_']);
        let language = parse_language(parts.next().unwrap_or_default())
            .map_err(|error| LocaleParseError::new(input, error.reason))?;

        let rest: Vec<&str> = parts.collect();
        let region = rest.first().and_then(|first| parse_region(first));
        let variant_parts = if region.is_some() {
            rest.get(1..).unwrap_or_default()
        } else {
            rest.as_slice()
        };
        if variant_parts.iter().any(|part| part.is_empty()) {
            return Err(LocaleParseError::new(input, "empty subtag"));
        }
        let variant = (!variant_parts.is_empty()).then(|| variant_parts.join("-"));

        Ok(Self {
            language,
            region,
            variant,
        })
    }
}

impl TryFrom<String> for Locale {
    type Error = LocaleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.to_string()
    }
}

/// Ranks candidate locales for matching providers against `system`.
///
/// The most specific tag comes first. English system locales fall back
/// through `en-US`, `en-GB`, and `en`; other languages fall back to their
/// bare language and then to `extra`, in order. Duplicates are dropped.
#[must_use]
pub fn suitable_locales(system: &Locale, extra: &[Locale]) -> Vec<Locale> {
    let mut ladder: Vec<Locale> = Vec::new();
    let mut push = |locale: Locale| {
        if !ladder.contains(&locale) {
            ladder.push(locale);
        }
    };

    if system.region.is_some() && system.variant.is_some() {
        push(system.clone());
    }
    let language_region = system.language_region();
    let en_us = Locale::with_region(ENGLISH, "US");
    let en_gb = Locale::with_region(ENGLISH, "GB");

    if system.is_english() {
        push(language_region.unwrap_or_else(|| system.language_only()));
        push(en_us);
        push(en_gb);
        push(system.language_only());
    } else {
        if let Some(exact) = language_region {
            push(exact);
        }
        push(system.language_only());
        for locale in extra {
            push(locale.clone());
        }
    }
    ladder
}
