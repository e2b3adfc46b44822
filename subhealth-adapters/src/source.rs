//! The metrics source abstraction.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use subhealth_types::{SubscriptionMetrics, TopicName};

use crate::MetricsError;

/// Trait for reading current rate metrics from a time-series backend.
///
/// Rates are non-negative messages per second averaged over the trailing
/// `window`. Implementations may cache, but two reads with different
/// windows must never share a cached value.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use subhealth_adapters::{MetricsSource, StaticMetrics};
/// use subhealth_types::TopicName;
///
/// # tokio_test::block_on(async {
/// let metrics = StaticMetrics::new();
/// let topic = TopicName::new("group", "topic");
/// metrics.set_topic_rate(&topic, 100.0);
///
/// let rate = metrics.rate_for_topic(&topic, Duration::from_secs(60)).await.unwrap();
/// assert_eq!(rate, 100.0);
/// # });
/// ```
#[async_trait]
pub trait MetricsSource: Send + Sync + Debug {
    /// Publishing rate of a topic.
    async fn rate_for_topic(&self, topic: &TopicName, window: Duration)
        -> Result<f64, MetricsError>;

    /// Delivery rate of one subscription.
    async fn rate_for_subscription(
        &self,
        topic: &TopicName,
        subscription: &str,
        window: Duration,
    ) -> Result<f64, MetricsError>;

    /// Every metric the source knows for a subscription.
    ///
    /// Sources that only track delivery rates can rely on the default,
    /// which returns the rate alone.
    async fn subscription_metrics(
        &self,
        topic: &TopicName,
        subscription: &str,
        window: Duration,
    ) -> Result<SubscriptionMetrics, MetricsError> {
        let rate = self.rate_for_subscription(topic, subscription, window).await?;
        Ok(SubscriptionMetrics::with_rate(rate))
    }

    /// Returns a human-readable description of the source, for logs.
    fn description(&self) -> &str;
}

#[async_trait]
impl<S: MetricsSource + ?Sized> MetricsSource for Arc<S> {
    async fn rate_for_topic(
        &self,
        topic: &TopicName,
        window: Duration,
    ) -> Result<f64, MetricsError> {
        (**self).rate_for_topic(topic, window).await
    }

    async fn rate_for_subscription(
        &self,
        topic: &TopicName,
        subscription: &str,
        window: Duration,
    ) -> Result<f64, MetricsError> {
        (**self).rate_for_subscription(topic, subscription, window).await
    }

    async fn subscription_metrics(
        &self,
        topic: &TopicName,
        subscription: &str,
        window: Duration,
    ) -> Result<SubscriptionMetrics, MetricsError> {
        (**self).subscription_metrics(topic, subscription, window).await
    }

    fn description(&self) -> &str {
        (**self).description()
    }
}
