//! Spell checker providers, their subtypes, and raw discovery descriptors.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::locale::{Locale, LocaleParseError};

/// Permission a provider must declare before the broker will bind to it.
pub const BIND_PERMISSION: &str = "speller.permission.BIND_TEXT_SERVICE";

/// Stable identifier of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Wraps a provider identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrowed identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

/// Hash identifying a subtype across registry rebuilds.
///
/// Two values are reserved: [`SubtypeHash::NONE`] marks "nothing stored" and
/// [`SubtypeHash::AUTO`] marks "follow the input or system locale". Derived
/// subtype hashes never take either value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubtypeHash(i32);

impl SubtypeHash {
    /// Sentinel meaning no subtype was ever stored.
    pub const NONE: Self = Self(i32::MIN);
    /// Reserved value selecting the subtype from the current locale.
    pub const AUTO: Self = Self(0);

    /// Wraps a raw stored value.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw value as persisted by the settings store.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Derives the hash for a subtype from its locale tag and extra value.
    #[must_use]
    pub fn derive(locale: &str, extra_value: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(locale.as_bytes());
        hasher.update([0_u8]);
        hasher.update(extra_value.as_bytes());
        let prefix = hasher
            .finalize()
            .iter()
            .take(4)
            .fold(0_u32, |acc, byte| (acc << 8) | u32::from(*byte));
        match prefix.cast_signed() {
            0 => Self(1),
            i32::MIN => Self(i32::MIN + 1),
            raw => Self(raw),
        }
    }
}

impl fmt::Display for SubtypeHash {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A language variant a provider declares support for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtype {
    locale: Locale,
    extra_value: String,
    hash: SubtypeHash,
}

impl Subtype {
    /// Builds a subtype, deriving its stable hash.
    #[must_use]
    pub fn new(locale: Locale, extra: impl Into<String>) -> Self {
        let extra_value = extra.into();
        let hash = SubtypeHash::derive(&locale.to_string(), &extra_value);
        Self {
            locale,
            extra_value,
            hash,
        }
    }

    /// Declared locale.
    #[must_use]
    pub const fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Provider-specific extra value.
    #[must_use]
    pub fn extra_value(&self) -> &str {
        self.extra_value.as_str()
    }

    /// Stable identity of the subtype.
    #[must_use]
    pub const fn hash(&self) -> SubtypeHash {
        self.hash
    }
}

/// A discovered spell checker backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    id: ProviderId,
    package: String,
    system: bool,
    subtypes: Vec<Subtype>,
}

impl Provider {
    /// Stable identifier.
    #[must_use]
    pub const fn id(&self) -> &ProviderId {
        &self.id
    }

    /// Package that ships the provider.
    #[must_use]
    pub fn package(&self) -> &str {
        self.package.as_str()
    }

    /// Whether the provider ships with the host system image.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        self.system
    }

    /// Declared subtypes in declaration order.
    #[must_use]
    pub fn subtypes(&self) -> &[Subtype] {
        self.subtypes.as_slice()
    }

    /// Looks up a subtype by its stable hash.
    #[must_use]
    pub fn subtype(&self, hash: SubtypeHash) -> Option<&Subtype> {
        self.subtypes.iter().find(|subtype| subtype.hash == hash)
    }
}

/// Subtype as declared by a provider's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubtypeDescriptor {
    /// Locale tag, e.g. `en_US`.
    pub locale: String,
    /// Provider-specific extra value.
    #[serde(default)]
    pub extra_value: String,
}

impl SubtypeDescriptor {
    /// Builds a descriptor with an empty extra value.
    #[must_use]
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            extra_value: String::new(),
        }
    }
}

/// Raw provider description supplied by the discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderDescriptor {
    /// Stable provider identifier.
    pub id: String,
    /// Package shipping the provider.
    pub package: String,
    /// Permission the provider requires from its binder.
    #[serde(default)]
    pub permission: Option<String>,
    /// Whether the provider is part of the system image.
    #[serde(default)]
    pub system: bool,
    /// Declared subtypes.
    #[serde(default)]
    pub subtypes: Vec<SubtypeDescriptor>,
}

impl ProviderDescriptor {
    /// Builds a descriptor that requires [`BIND_PERMISSION`].
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        package: impl Into<String>,
        subtypes: Vec<SubtypeDescriptor>,
    ) -> Self {
        Self {
            id: id.into(),
            package: package.into(),
            permission: Some(BIND_PERMISSION.to_owned()),
            system: false,
            subtypes,
        }
    }
}

/// Reasons a descriptor is rejected during a registry rebuild.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The descriptor has no identifier.
    #[error("descriptor from package '{package}' has an empty id")]
    EmptyId {
        /// Package that shipped the descriptor.
        package: String,
    },
    /// The provider does not require the bind permission.
    #[error("provider '{id}' does not require the bind permission")]
    MissingPermission {
        /// Offending provider.
        id: String,
    },
    /// The provider declares no subtypes.
    #[error("provider '{id}' declares no subtypes")]
    NoSubtypes {
        /// Offending provider.
        id: String,
    },
    /// A subtype locale tag failed to parse.
    #[error("provider '{id}' declares an invalid subtype: {source}")]
    InvalidSubtype {
        /// Offending provider.
        id: String,
        /// Parse failure.
        #[source]
        source: LocaleParseError,
    },
}

impl TryFrom<ProviderDescriptor> for Provider {
    type Error = DescriptorError;

    fn try_from(descriptor: ProviderDescriptor) -> Result<Self, Self::Error> {
        let ProviderDescriptor {
            id,
            package,
            permission,
            system,
            subtypes,
        } = descriptor;

        if id.trim().is_empty() {
            return Err(DescriptorError::EmptyId { package });
        }
        if permission.as_deref() != Some(BIND_PERMISSION) {
            return Err(DescriptorError::MissingPermission { id });
        }
        if subtypes.is_empty() {
            return Err(DescriptorError::NoSubtypes { id });
        }

        let declared = subtypes
            .into_iter()
            .map(|subtype| {
                subtype
                    .locale
                    .parse::<Locale>()
                    .map(|locale| Subtype::new(locale, subtype.extra_value))
            })
            .collect::<Result<Vec<_>, LocaleParseError>>()
            .map_err(|source| DescriptorError::InvalidSubtype {
                id: id.clone(),
                source,
            })?;

        Ok(Self {
            id: ProviderId::new(id),
            package,
            system,
            subtypes: declared,
        })
    }
}
