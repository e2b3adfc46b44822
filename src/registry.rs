//! Read access to the topic and subscription registry.
//!
//! The registry itself lives elsewhere (the broker's management store).
//! Health evaluation only reads it, through the [`Registry`] trait.
//! [`InMemoryRegistry`] is a snapshot that can be built in code or loaded
//! from a JSON file.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use subhealth_types::{
    MonitoringDetails, OwnerId, Subscription, SubscriptionState, Topic, TopicName,
};
use thiserror::Error;

use crate::ownership::OwnershipIndex;

/// Errors from registry reads.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Topic not found: {0}")]
    TopicNotFound(TopicName),

    #[error("Subscription already exists: {0}")]
    DuplicateSubscription(String),

    /// The backing store could not be reached.
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read registry: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse registry: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Trait for reading topics and subscriptions.
#[async_trait]
pub trait Registry: Send + Sync + Debug {
    /// Every subscription of `topic`.
    async fn subscriptions_of(&self, topic: &TopicName)
        -> Result<Vec<Subscription>, RegistryError>;

    /// Every subscription owned by exactly `owner`, across all topics.
    async fn subscriptions_owned_by(
        &self,
        owner: &OwnerId,
    ) -> Result<Vec<Subscription>, RegistryError>;
}

#[derive(Debug, Default)]
struct RegistryState {
    topics: BTreeMap<TopicName, BTreeMap<String, Subscription>>,
    ownership: OwnershipIndex,
}

/// A registry held in memory.
///
/// # Example
///
/// ```
/// use subhealth::{InMemoryRegistry, Registry};
/// use subhealth_types::{OwnerId, Subscription, Topic, TopicName};
///
/// # tokio_test::block_on(async {
/// let registry = InMemoryRegistry::new();
/// let topic = Topic::new("group", "topic");
/// registry.add_topic(topic.clone());
/// registry
///     .add_subscription(
///         Subscription::builder(topic.name.clone(), "s1")
///             .owner(OwnerId::Plaintext("Team A".into()))
///             .build(),
///     )
///     .unwrap();
///
/// let owned = registry
///     .subscriptions_owned_by(&OwnerId::Plaintext("Team A".into()))
///     .await
///     .unwrap();
/// assert_eq!(owned.len(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a JSON file.
    ///
    /// ```json
    /// {
    ///   "topics": [{
    ///     "group": "group", "name": "topic",
    ///     "subscriptions": [{
    ///       "name": "s1",
    ///       "endpoint": "http://localhost:8080/",
    ///       "owner": { "source": "Plaintext", "id": "Team A" },
    ///       "monitoring": { "severity": "IMPORTANT", "reaction": "" }
    ///     }]
    ///   }]
    /// }
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a registry from a JSON string in the [`load`](Self::load) format.
    pub fn from_json(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(content)?;

        let registry = Self::new();
        for entry in file.topics {
            let topic = TopicName::new(entry.group, entry.name);
            registry.add_topic(Topic::from(topic.clone()));
            for sub in entry.subscriptions {
                registry.add_subscription(
                    Subscription::builder(topic.clone(), sub.name)
                        .endpoint(sub.endpoint)
                        .owner(sub.owner)
                        .monitoring(sub.monitoring)
                        .state(sub.state)
                        .build(),
                )?;
            }
        }
        Ok(registry)
    }

    /// Register a topic. Registering an existing topic is a no-op.
    pub fn add_topic(&self, topic: Topic) {
        self.state.write().topics.entry(topic.name).or_default();
    }

    /// Register a subscription of an already registered topic.
    pub fn add_subscription(&self, subscription: Subscription) -> Result<(), RegistryError> {
        let mut state = self.state.write();

        let subscriptions = state
            .topics
            .get_mut(&subscription.topic)
            .ok_or_else(|| RegistryError::TopicNotFound(subscription.topic.clone()))?;
        if subscriptions.contains_key(&subscription.name) {
            return Err(RegistryError::DuplicateSubscription(
                subscription.qualified_name(),
            ));
        }
        subscriptions.insert(subscription.name.clone(), subscription.clone());

        state.ownership.insert(subscription);
        Ok(())
    }

    /// Remove a subscription, returning it if it existed.
    pub fn remove_subscription(&self, topic: &TopicName, name: &str) -> Option<Subscription> {
        let mut state = self.state.write();
        let removed = state.topics.get_mut(topic)?.remove(name)?;
        state.ownership.remove(topic, name);
        Some(removed)
    }

    /// Names of all registered topics.
    pub fn topics(&self) -> Vec<TopicName> {
        self.state.read().topics.keys().cloned().collect()
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn subscriptions_of(
        &self,
        topic: &TopicName,
    ) -> Result<Vec<Subscription>, RegistryError> {
        self.state
            .read()
            .topics
            .get(topic)
            .map(|subscriptions| subscriptions.values().cloned().collect())
            .ok_or_else(|| RegistryError::TopicNotFound(topic.clone()))
    }

    async fn subscriptions_owned_by(
        &self,
        owner: &OwnerId,
    ) -> Result<Vec<Subscription>, RegistryError> {
        Ok(self.state.read().ownership.owned_by(owner))
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    topics: Vec<TopicEntry>,
}

#[derive(Debug, Deserialize)]
struct TopicEntry {
    group: String,
    name: String,
    #[serde(default)]
    subscriptions: Vec<SubscriptionEntry>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionEntry {
    name: String,
    #[serde(default)]
    endpoint: String,
    owner: OwnerId,
    #[serde(default)]
    monitoring: MonitoringDetails,
    #[serde(default)]
    state: SubscriptionState,
}
