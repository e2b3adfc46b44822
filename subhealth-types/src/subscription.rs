//! Subscriptions and their declared monitoring details.

use crate::{OwnerId, TopicName};

/// Declared importance of a subscription.
///
/// Ordered from least to most important. Health evaluation never changes
/// it; it is carried into health reports as declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Severity {
    NonImportant,
    #[default]
    Important,
    Critical,
}

/// Monitoring metadata attached to a subscription by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitoringDetails {
    pub severity: Severity,

    /// Free text telling on-call what to do when the subscription is unhealthy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub reaction: String,
}

impl MonitoringDetails {
    pub fn new(severity: Severity, reaction: impl Into<String>) -> Self {
        Self {
            severity,
            reaction: reaction.into(),
        }
    }
}

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum SubscriptionState {
    /// Created, consumers not yet started.
    Pending,
    /// Consuming messages.
    #[default]
    Active,
    /// Consumption paused by the owner.
    Suspended,
}

/// A named consumer of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Topic this subscription consumes.
    pub topic: TopicName,
    /// Name, unique within the topic.
    pub name: String,
    /// Where messages are delivered.
    pub endpoint: String,
    pub owner: OwnerId,
    pub monitoring: MonitoringDetails,
    pub state: SubscriptionState,
}

impl Subscription {
    /// Create a builder for a subscription of `topic`.
    pub fn builder(topic: TopicName, name: impl Into<String>) -> SubscriptionBuilder {
        SubscriptionBuilder::new(topic, name)
    }

    /// Declared severity.
    pub fn severity(&self) -> Severity {
        self.monitoring.severity
    }

    pub fn is_active(&self) -> bool {
        self.state == SubscriptionState::Active
    }

    /// `"group.topic.name"`, unique across the broker.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.topic, self.name)
    }
}

/// Builder for `Subscription`.
///
/// Unless set, a subscription is active, has `Important` severity and is
/// owned by an empty plaintext owner.
#[derive(Debug)]
pub struct SubscriptionBuilder {
    topic: TopicName,
    name: String,
    endpoint: String,
    owner: OwnerId,
    monitoring: MonitoringDetails,
    state: SubscriptionState,
}

impl SubscriptionBuilder {
    /// Create a new builder.
    pub fn new(topic: TopicName, name: impl Into<String>) -> Self {
        Self {
            topic,
            name: name.into(),
            endpoint: String::new(),
            owner: OwnerId::Plaintext(String::new()),
            monitoring: MonitoringDetails::default(),
            state: SubscriptionState::default(),
        }
    }

    /// Set the delivery endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the owner.
    pub fn owner(mut self, owner: OwnerId) -> Self {
        self.owner = owner;
        self
    }

    /// Set the full monitoring details.
    pub fn monitoring(mut self, monitoring: MonitoringDetails) -> Self {
        self.monitoring = monitoring;
        self
    }

    /// Set only the severity, keeping the reaction text.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.monitoring.severity = severity;
        self
    }

    /// Set the lifecycle state.
    pub fn state(mut self, state: SubscriptionState) -> Self {
        self.state = state;
        self
    }

    /// Build the subscription.
    pub fn build(self) -> Subscription {
        Subscription {
            topic: self.topic,
            name: self.name,
            endpoint: self.endpoint,
            owner: self.owner,
            monitoring: self.monitoring,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let subscription = Subscription::builder(TopicName::new("group", "topic"), "s1").build();

        assert_eq!(subscription.name, "s1");
        assert_eq!(subscription.severity(), Severity::Important);
        assert_eq!(subscription.state, SubscriptionState::Active);
        assert!(subscription.is_active());
        assert_eq!(subscription.qualified_name(), "group.topic.s1");
    }

    #[test]
    fn test_builder_custom() {
        let subscription = Subscription::builder(TopicName::new("group", "topic"), "s1")
            .endpoint("http://localhost:8080/")
            .owner(OwnerId::Crowd("team-b".into()))
            .monitoring(MonitoringDetails::new(Severity::Critical, "page the team"))
            .state(SubscriptionState::Suspended)
            .build();

        assert_eq!(subscription.endpoint, "http://localhost:8080/");
        assert_eq!(subscription.owner, OwnerId::Crowd("team-b".into()));
        assert_eq!(subscription.severity(), Severity::Critical);
        assert_eq!(subscription.monitoring.reaction, "page the team");
        assert!(!subscription.is_active());
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::Important);
        assert!(Severity::Important > Severity::NonImportant);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_severity_wire_names() {
        assert_eq!(
            serde_json::to_string(&Severity::NonImportant).unwrap(),
            r#""NON_IMPORTANT""#
        );
        let state: SubscriptionState = serde_json::from_str(r#""SUSPENDED""#).unwrap();
        assert_eq!(state, SubscriptionState::Suspended);
    }
}
