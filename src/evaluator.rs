//! Per-topic health evaluation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use subhealth_adapters::MetricsSource;
use subhealth_types::{Problem, Subscription, SubscriptionHealth, TopicName};
use tracing::{debug, warn};

use crate::detect::ProblemDetector;
use crate::registry::{Registry, RegistryError};

/// Health of each subscription of a topic, keyed by subscription name.
pub type TopicHealth = BTreeMap<String, SubscriptionHealth>;

/// What to report for a subscription whose metrics could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingMetricsPolicy {
    /// Leave it out of judgement (`NoData`, never reported unhealthy).
    #[default]
    Exclude,
    /// Report it unhealthy with the `Unknown` problem.
    ReportUnknown,
}

/// Evaluates the health of a topic's subscriptions.
///
/// The topic's publishing rate is read once per evaluation; subscription
/// metrics are read concurrently, at most `max_concurrent_fetches` at a
/// time. Subscriptions that are not active are healthy without reading
/// anything.
#[derive(Debug, Clone)]
pub struct HealthEvaluator {
    metrics: Arc<dyn MetricsSource>,
    detector: ProblemDetector,
    window: Duration,
    missing_metrics: MissingMetricsPolicy,
    max_concurrent_fetches: usize,
}

impl HealthEvaluator {
    /// Create an evaluator with a 2 minute window, excluding subscriptions
    /// without metrics and reading up to 16 subscriptions at once.
    pub fn new(metrics: Arc<dyn MetricsSource>, detector: ProblemDetector) -> Self {
        Self {
            metrics,
            detector,
            window: Duration::from_secs(120),
            missing_metrics: MissingMetricsPolicy::default(),
            max_concurrent_fetches: 16,
        }
    }

    /// Set the trailing window rates are averaged over.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set how subscriptions without metrics are reported.
    pub fn missing_metrics(mut self, policy: MissingMetricsPolicy) -> Self {
        self.missing_metrics = policy;
        self
    }

    /// Set how many subscription reads may be in flight at once.
    pub fn max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    pub fn detector(&self) -> &ProblemDetector {
        &self.detector
    }

    /// Evaluate every subscription the registry has for `topic`.
    pub async fn evaluate_topic(
        &self,
        registry: &dyn Registry,
        topic: &TopicName,
    ) -> Result<TopicHealth, RegistryError> {
        let subscriptions = registry.subscriptions_of(topic).await?;
        Ok(self.evaluate(topic, &subscriptions).await)
    }

    /// Evaluate `subscriptions`, all of which belong to `topic`.
    ///
    /// The result has an entry for every given subscription, healthy or not.
    pub async fn evaluate(&self, topic: &TopicName, subscriptions: &[Subscription]) -> TopicHealth {
        let (active, inactive): (Vec<&Subscription>, Vec<&Subscription>) =
            subscriptions.iter().partition(|s| s.is_active());

        let mut health: TopicHealth = inactive
            .into_iter()
            .map(|s| (s.name.clone(), SubscriptionHealth::healthy()))
            .collect();
        if active.is_empty() {
            return health;
        }

        let topic_rate = match self.metrics.rate_for_topic(topic, self.window).await {
            Ok(rate) => rate,
            Err(e) => {
                warn!(%topic, error = %e, "topic rate unavailable");
                let verdict = self.missing_metrics_health();
                health.extend(active.into_iter().map(|s| (s.name.clone(), verdict.clone())));
                return health;
            }
        };

        let verdicts: Vec<(String, SubscriptionHealth)> = stream::iter(active)
            .map(|subscription| async move {
                let verdict = self.evaluate_one(topic, topic_rate, subscription).await;
                (subscription.name.clone(), verdict)
            })
            .buffer_unordered(self.max_concurrent_fetches)
            .collect()
            .await;
        health.extend(verdicts);

        debug!(
            %topic,
            topic_rate,
            subscriptions = health.len(),
            unhealthy = health.values().filter(|h| !h.is_healthy()).count(),
            "evaluated topic"
        );
        health
    }

    async fn evaluate_one(
        &self,
        topic: &TopicName,
        topic_rate: f64,
        subscription: &Subscription,
    ) -> SubscriptionHealth {
        match self
            .metrics
            .subscription_metrics(topic, &subscription.name, self.window)
            .await
        {
            Ok(metrics) => SubscriptionHealth::of(self.detector.detect_metrics(topic_rate, &metrics)),
            Err(e) => {
                warn!(
                    subscription = %subscription.qualified_name(),
                    error = %e,
                    "subscription metrics unavailable"
                );
                self.missing_metrics_health()
            }
        }
    }

    fn missing_metrics_health(&self) -> SubscriptionHealth {
        match self.missing_metrics {
            MissingMetricsPolicy::Exclude => SubscriptionHealth::no_data(),
            MissingMetricsPolicy::ReportUnknown => {
                SubscriptionHealth::of(BTreeSet::from([Problem::Unknown]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use subhealth_adapters::StaticMetrics;
    use subhealth_types::{HealthStatus, SubscriptionState, Topic};

    fn topic() -> TopicName {
        TopicName::new("group", "topic")
    }

    fn subscription(name: &str) -> Subscription {
        Subscription::builder(topic(), name).build()
    }

    fn evaluator(metrics: &Arc<StaticMetrics>) -> HealthEvaluator {
        HealthEvaluator::new(metrics.clone(), ProblemDetector::default())
    }

    #[tokio::test]
    async fn test_covers_every_subscription() {
        let metrics = Arc::new(StaticMetrics::new());
        metrics.set_topic_rate(&topic(), 100.0);
        metrics.set_subscription_rate(&topic(), "s1", 100.0);
        metrics.set_subscription_rate(&topic(), "s2", 50.0);

        let health = evaluator(&metrics)
            .evaluate(&topic(), &[subscription("s1"), subscription("s2")])
            .await;

        assert_eq!(health.len(), 2);
        assert!(health["s1"].is_healthy());
        assert_eq!(health["s2"].problems(), &BTreeSet::from([Problem::Slow]));
    }

    #[tokio::test]
    async fn test_topic_rate_read_once() {
        let metrics = Arc::new(StaticMetrics::new());
        metrics.set_topic_rate(&topic(), 10.0);
        let subscriptions: Vec<_> = (0..20)
            .map(|i| {
                let name = format!("s{}", i);
                metrics.set_subscription_rate(&topic(), &name, 10.0);
                subscription(&name)
            })
            .collect();

        let health = evaluator(&metrics)
            .max_concurrent_fetches(4)
            .evaluate(&topic(), &subscriptions)
            .await;

        assert_eq!(health.len(), 20);
        assert_eq!(metrics.topic_reads(), 1);
        assert_eq!(metrics.subscription_reads(), 20);
    }

    #[tokio::test]
    async fn test_inactive_subscriptions_are_not_read() {
        let metrics = Arc::new(StaticMetrics::new());
        let suspended = Subscription::builder(topic(), "paused")
            .state(SubscriptionState::Suspended)
            .build();

        let health = evaluator(&metrics).evaluate(&topic(), &[suspended]).await;

        assert_eq!(health["paused"].status(), HealthStatus::Healthy);
        assert_eq!(metrics.topic_reads(), 0);
        assert_eq!(metrics.subscription_reads(), 0);
    }

    #[tokio::test]
    async fn test_missing_subscription_metrics_excluded_by_default() {
        let metrics = Arc::new(StaticMetrics::new());
        metrics.set_topic_rate(&topic(), 100.0);

        let health = evaluator(&metrics)
            .evaluate(&topic(), &[subscription("s1")])
            .await;

        assert_eq!(health["s1"].status(), HealthStatus::NoData);
        assert!(health["s1"].is_healthy());
    }

    #[tokio::test]
    async fn test_missing_topic_rate_reported_unknown() {
        let metrics = Arc::new(StaticMetrics::new());
        metrics.set_subscription_rate(&topic(), "s1", 1.0);

        let health = evaluator(&metrics)
            .missing_metrics(MissingMetricsPolicy::ReportUnknown)
            .evaluate(&topic(), &[subscription("s1"), subscription("s2")])
            .await;

        for name in ["s1", "s2"] {
            assert_eq!(health[name].problems(), &BTreeSet::from([Problem::Unknown]));
        }
        assert_eq!(metrics.subscription_reads(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_topic_from_registry() {
        let metrics = Arc::new(StaticMetrics::new());
        metrics.set_topic_rate(&topic(), 100.0);
        metrics.set_subscription_rate(&topic(), "s1", 10.0);

        let registry = InMemoryRegistry::new();
        registry.add_topic(Topic::from(topic()));
        registry.add_subscription(subscription("s1")).unwrap();

        let health = evaluator(&metrics)
            .evaluate_topic(&registry, &topic())
            .await
            .unwrap();
        assert_eq!(health["s1"].problems(), &BTreeSet::from([Problem::Slow]));

        let missing = evaluator(&metrics)
            .evaluate_topic(&registry, &TopicName::new("group", "missing"))
            .await;
        assert!(matches!(missing, Err(RegistryError::TopicNotFound(_))));
    }

    #[test]
    fn test_policy_names() {
        let policy: MissingMetricsPolicy = serde_json::from_str(r#""report-unknown""#).unwrap();
        assert_eq!(policy, MissingMetricsPolicy::ReportUnknown);
    }
}
