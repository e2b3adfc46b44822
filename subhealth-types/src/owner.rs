//! Subscription owners.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Identity of the team or service owning a subscription.
///
/// Each variant is one owner source; the payload is the identifier within
/// that source. Two owners are equal only if both source and identifier
/// match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "source", content = "id"))]
pub enum OwnerId {
    /// Free-form owner name.
    Plaintext(String),
    /// Group from the Crowd directory.
    Crowd(String),
    /// Service registered in the service catalog.
    #[cfg_attr(feature = "serde", serde(rename = "Service Catalog"))]
    ServiceCatalog(String),
}

impl OwnerId {
    /// Build an owner from a source name and identifier.
    ///
    /// ```rust
    /// use subhealth_types::OwnerId;
    ///
    /// let owner = OwnerId::new("Plaintext", "Team A").unwrap();
    /// assert_eq!(owner, OwnerId::Plaintext("Team A".into()));
    /// assert!(OwnerId::new("LDAP", "Team A").is_err());
    /// ```
    pub fn new(source: &str, id: impl Into<String>) -> Result<Self, UnknownOwnerSource> {
        Ok(source.parse::<OwnerSource>()?.owner(id))
    }

    /// The source this owner comes from.
    pub fn source(&self) -> OwnerSource {
        match self {
            OwnerId::Plaintext(_) => OwnerSource::Plaintext,
            OwnerId::Crowd(_) => OwnerSource::Crowd,
            OwnerId::ServiceCatalog(_) => OwnerSource::ServiceCatalog,
        }
    }

    /// The identifier within the source.
    pub fn id(&self) -> &str {
        match self {
            OwnerId::Plaintext(id) | OwnerId::Crowd(id) | OwnerId::ServiceCatalog(id) => id,
        }
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source(), self.id())
    }
}

/// Kind of owner source, without an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OwnerSource {
    Plaintext,
    Crowd,
    ServiceCatalog,
}

impl OwnerSource {
    /// The name used for this source on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            OwnerSource::Plaintext => "Plaintext",
            OwnerSource::Crowd => "Crowd",
            OwnerSource::ServiceCatalog => "Service Catalog",
        }
    }

    /// Attach an identifier to this source.
    pub fn owner(self, id: impl Into<String>) -> OwnerId {
        let id = id.into();
        match self {
            OwnerSource::Plaintext => OwnerId::Plaintext(id),
            OwnerSource::Crowd => OwnerId::Crowd(id),
            OwnerSource::ServiceCatalog => OwnerId::ServiceCatalog(id),
        }
    }
}

impl fmt::Display for OwnerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OwnerSource {
    type Err = UnknownOwnerSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            OwnerSource::Plaintext,
            OwnerSource::Crowd,
            OwnerSource::ServiceCatalog,
        ]
        .into_iter()
        .find(|source| source.name() == s)
        .ok_or_else(|| UnknownOwnerSource(s.to_string()))
    }
}

/// The owner source name is not one this system knows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown owner source: {0}")]
pub struct UnknownOwnerSource(pub String);
