//! In-memory metrics source.
//!
//! Holds fixed rates set by the caller. Useful in tests, where it stands
//! in for a live backend, and for offline evaluation against a metrics
//! file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use subhealth_types::{SubscriptionMetrics, TopicName};

use crate::{MetricsError, MetricsSource};

/// A metrics source backed by maps of fixed values.
///
/// Values are the same for every window. Reads of anything not set fail
/// with [`MetricsError::Unavailable`], the same way a backend without data
/// would.
#[derive(Debug)]
pub struct StaticMetrics {
    topics: RwLock<BTreeMap<TopicName, f64>>,
    subscriptions: RwLock<BTreeMap<(TopicName, String), SubscriptionMetrics>>,
    topic_reads: AtomicU64,
    subscription_reads: AtomicU64,
    description: String,
}

impl StaticMetrics {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::with_description("static")
    }

    fn with_description(description: impl Into<String>) -> Self {
        Self {
            topics: RwLock::new(BTreeMap::new()),
            subscriptions: RwLock::new(BTreeMap::new()),
            topic_reads: AtomicU64::new(0),
            subscription_reads: AtomicU64::new(0),
            description: description.into(),
        }
    }

    /// Load values from a JSON file.
    ///
    /// ```json
    /// {
    ///   "topics": { "group.topic": 100.0 },
    ///   "subscriptions": { "group.topic": { "s1": { "rate": 100.0, "lag": 10 } } }
    /// }
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MetricsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| MetricsError::Parse(format!("{}: {}", path.display(), e)))?;
        let source = Self::from_json(&content)?;
        Ok(Self {
            description: format!("file: {}", path.display()),
            ..source
        })
    }

    /// Parse values from a JSON string in the [`load`](Self::load) format.
    pub fn from_json(content: &str) -> Result<Self, MetricsError> {
        let file: MetricsFile =
            serde_json::from_str(content).map_err(|e| MetricsError::Parse(e.to_string()))?;

        let source = Self::new();
        for (qualified, rate) in file.topics {
            source.set_topic_rate(&parse_topic(&qualified)?, rate);
        }
        for (qualified, subscriptions) in file.subscriptions {
            let topic = parse_topic(&qualified)?;
            for (name, metrics) in subscriptions {
                source.set_subscription_metrics(&topic, &name, metrics);
            }
        }
        Ok(source)
    }

    /// Set the publishing rate of a topic.
    pub fn set_topic_rate(&self, topic: &TopicName, rate: f64) {
        self.topics.write().insert(topic.clone(), rate);
    }

    /// Set only the delivery rate of a subscription.
    pub fn set_subscription_rate(&self, topic: &TopicName, subscription: &str, rate: f64) {
        self.set_subscription_metrics(topic, subscription, SubscriptionMetrics::with_rate(rate));
    }

    /// Set every metric of a subscription.
    pub fn set_subscription_metrics(
        &self,
        topic: &TopicName,
        subscription: &str,
        metrics: SubscriptionMetrics,
    ) {
        self.subscriptions
            .write()
            .insert((topic.clone(), subscription.to_string()), metrics);
    }

    /// Forget the rate of a topic, making reads of it unavailable.
    pub fn clear_topic(&self, topic: &TopicName) {
        self.topics.write().remove(topic);
    }

    /// Forget the metrics of a subscription.
    pub fn clear_subscription(&self, topic: &TopicName, subscription: &str) {
        self.subscriptions
            .write()
            .remove(&(topic.clone(), subscription.to_string()));
    }

    /// Number of topic rate reads served so far, successful or not.
    pub fn topic_reads(&self) -> u64 {
        self.topic_reads.load(Ordering::Relaxed)
    }

    /// Number of subscription reads served so far, successful or not.
    pub fn subscription_reads(&self) -> u64 {
        self.subscription_reads.load(Ordering::Relaxed)
    }

    fn lookup_subscription(
        &self,
        topic: &TopicName,
        subscription: &str,
    ) -> Result<SubscriptionMetrics, MetricsError> {
        self.subscription_reads.fetch_add(1, Ordering::Relaxed);
        self.subscriptions
            .read()
            .get(&(topic.clone(), subscription.to_string()))
            .cloned()
            .ok_or_else(|| MetricsError::Unavailable(format!("{}.{}", topic, subscription)))
    }
}

impl Default for StaticMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for StaticMetrics {
    async fn rate_for_topic(
        &self,
        topic: &TopicName,
        _window: Duration,
    ) -> Result<f64, MetricsError> {
        self.topic_reads.fetch_add(1, Ordering::Relaxed);
        self.topics
            .read()
            .get(topic)
            .copied()
            .ok_or_else(|| MetricsError::Unavailable(topic.qualified()))
    }

    async fn rate_for_subscription(
        &self,
        topic: &TopicName,
        subscription: &str,
        _window: Duration,
    ) -> Result<f64, MetricsError> {
        self.lookup_subscription(topic, subscription).map(|m| m.rate)
    }

    async fn subscription_metrics(
        &self,
        topic: &TopicName,
        subscription: &str,
        _window: Duration,
    ) -> Result<SubscriptionMetrics, MetricsError> {
        self.lookup_subscription(topic, subscription)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[derive(Debug, Deserialize)]
struct MetricsFile {
    #[serde(default)]
    topics: BTreeMap<String, f64>,
    #[serde(default)]
    subscriptions: BTreeMap<String, BTreeMap<String, SubscriptionMetrics>>,
}

fn parse_topic(qualified: &str) -> Result<TopicName, MetricsError> {
    TopicName::from_qualified(qualified)
        .ok_or_else(|| MetricsError::Parse(format!("Invalid topic name: {}", qualified)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const WINDOW: Duration = Duration::from_secs(60);

    fn topic() -> TopicName {
        TopicName::new("group", "topic")
    }

    #[tokio::test]
    async fn test_unset_values_are_unavailable() {
        let metrics = StaticMetrics::new();

        let err = metrics.rate_for_topic(&topic(), WINDOW).await.unwrap_err();
        assert!(err.is_missing_data());

        let err = metrics
            .rate_for_subscription(&topic(), "s1", WINDOW)
            .await
            .unwrap_err();
        assert!(err.is_missing_data());
    }

    #[tokio::test]
    async fn test_set_and_clear() {
        let metrics = StaticMetrics::new();
        metrics.set_topic_rate(&topic(), 100.0);
        metrics.set_subscription_rate(&topic(), "s1", 50.0);

        assert_eq!(metrics.rate_for_topic(&topic(), WINDOW).await.unwrap(), 100.0);
        assert_eq!(
            metrics
                .rate_for_subscription(&topic(), "s1", WINDOW)
                .await
                .unwrap(),
            50.0
        );

        metrics.clear_topic(&topic());
        metrics.clear_subscription(&topic(), "s1");
        assert!(metrics.rate_for_topic(&topic(), WINDOW).await.is_err());
        assert!(metrics
            .rate_for_subscription(&topic(), "s1", WINDOW)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_counts_reads() {
        let metrics = StaticMetrics::new();
        metrics.set_topic_rate(&topic(), 1.0);

        let _ = metrics.rate_for_topic(&topic(), WINDOW).await;
        let _ = metrics.rate_for_topic(&topic(), WINDOW).await;
        let _ = metrics.subscription_metrics(&topic(), "s1", WINDOW).await;

        assert_eq!(metrics.topic_reads(), 2);
        assert_eq!(metrics.subscription_reads(), 1);
    }

    #[tokio::test]
    async fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "topics": {{ "pl.allegro.orders": 100.0 }},
                "subscriptions": {{
                    "pl.allegro.orders": {{
                        "mailer": {{ "rate": 40.0, "code_5xx_rate": 12.0, "lag": 300 }}
                    }}
                }}
            }}"#
        )
        .unwrap();

        let metrics = StaticMetrics::load(file.path()).unwrap();
        let topic = TopicName::new("pl.allegro", "orders");

        assert!(metrics.description().starts_with("file: "));
        assert_eq!(metrics.rate_for_topic(&topic, WINDOW).await.unwrap(), 100.0);

        let mailer = metrics
            .subscription_metrics(&topic, "mailer", WINDOW)
            .await
            .unwrap();
        assert_eq!(mailer.rate, 40.0);
        assert_eq!(mailer.code_5xx_rate, Some(12.0));
        assert_eq!(mailer.lag, Some(300));
    }

    #[test]
    fn test_rejects_unqualified_topic() {
        let err = StaticMetrics::from_json(r#"{"topics": {"orders": 1.0}}"#).unwrap_err();
        assert!(matches!(err, MetricsError::Parse(_)));
    }
}
