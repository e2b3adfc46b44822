//! Topic identity.

use std::fmt;

/// Name of a topic: a group plus the topic name within that group.
///
/// The qualified form joins both with a dot (`"group.topic"`). Groups may
/// themselves contain dots, so parsing a qualified name splits on the last
/// one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopicName {
    /// Group the topic belongs to.
    pub group: String,
    /// Topic name, unique within the group.
    pub name: String,
}

impl TopicName {
    /// Create a topic name from its group and name.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Parse a qualified name such as `"pl.allegro.orders"`.
    ///
    /// Returns `None` if there is no dot or either side is empty.
    pub fn from_qualified(qualified: &str) -> Option<Self> {
        let (group, name) = qualified.rsplit_once('.')?;
        if group.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(group, name))
    }

    /// The qualified `"group.name"` form.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.group, self.name)
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// A topic registered in the broker.
///
/// Subscriptions are held by the registry, keyed by this topic's name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Topic {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub name: TopicName,
}

impl Topic {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: TopicName::new(group, name),
        }
    }
}

impl From<TopicName> for Topic {
    fn from(name: TopicName) -> Self {
        Self { name }
    }
}
