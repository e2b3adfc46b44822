//! Owner to subscription index.

use std::collections::{BTreeMap, HashMap};

use subhealth_types::{OwnerId, Subscription, TopicName, UnknownOwnerSource};

type SubscriptionKey = (TopicName, String);

/// Maps each owner to the subscriptions it owns.
///
/// Subscriptions are keyed by topic and name, so an index never holds the
/// same subscription twice, and re-inserting a subscription under a new
/// owner moves it. Lookups are exact matches on the owner; owners with
/// nothing indexed get an empty list.
#[derive(Debug, Clone, Default)]
pub struct OwnershipIndex {
    owners: BTreeMap<OwnerId, BTreeMap<SubscriptionKey, Subscription>>,
    owner_of: HashMap<SubscriptionKey, OwnerId>,
}

impl OwnershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every subscription in `subscriptions`.
    ///
    /// ```
    /// use subhealth::OwnershipIndex;
    /// use subhealth_types::{OwnerId, Subscription, TopicName};
    ///
    /// let topic = TopicName::new("group", "topic");
    /// let team_a = OwnerId::Plaintext("Team A".into());
    /// let index = OwnershipIndex::build([
    ///     Subscription::builder(topic.clone(), "s1").owner(team_a.clone()).build(),
    ///     Subscription::builder(topic, "s2").owner(OwnerId::Plaintext("Team B".into())).build(),
    /// ]);
    ///
    /// assert_eq!(index.owned_by(&team_a).len(), 1);
    /// assert!(index.owned_by(&OwnerId::Crowd("Team A".into())).is_empty());
    /// ```
    pub fn build(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let mut index = Self::new();
        for subscription in subscriptions {
            index.insert(subscription);
        }
        index
    }

    /// Add or replace a subscription.
    pub fn insert(&mut self, subscription: Subscription) {
        let key = (subscription.topic.clone(), subscription.name.clone());
        self.remove(&key.0, &key.1);

        self.owner_of
            .insert(key.clone(), subscription.owner.clone());
        self.owners
            .entry(subscription.owner.clone())
            .or_default()
            .insert(key, subscription);
    }

    /// Remove a subscription, returning it if it was indexed.
    pub fn remove(&mut self, topic: &TopicName, name: &str) -> Option<Subscription> {
        let key = (topic.clone(), name.to_string());
        let owner = self.owner_of.remove(&key)?;

        let owned = self.owners.get_mut(&owner)?;
        let removed = owned.remove(&key);
        if owned.is_empty() {
            self.owners.remove(&owner);
        }
        removed
    }

    /// Subscriptions owned by `owner`, sorted by topic then name.
    pub fn owned_by(&self, owner: &OwnerId) -> Vec<Subscription> {
        self.owners
            .get(owner)
            .map(|owned| owned.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Like [`owned_by`](Self::owned_by), with the owner given as
    /// source name and identifier.
    pub fn lookup(&self, source: &str, id: &str) -> Result<Vec<Subscription>, UnknownOwnerSource> {
        Ok(self.owned_by(&OwnerId::new(source, id)?))
    }

    /// Owners with at least one subscription.
    pub fn owners(&self) -> impl Iterator<Item = &OwnerId> {
        self.owners.keys()
    }

    /// Number of indexed subscriptions.
    pub fn len(&self) -> usize {
        self.owner_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owner_of.is_empty()
    }
}
