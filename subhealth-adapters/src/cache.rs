//! Time-bounded caching around another metrics source.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use subhealth_types::{SubscriptionMetrics, TopicName};
use tokio::time::Instant;
use tracing::trace;

use crate::{MetricsError, MetricsSource};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    TopicRate {
        topic: TopicName,
        window: Duration,
    },
    SubscriptionRate {
        topic: TopicName,
        subscription: String,
        window: Duration,
    },
    SubscriptionMetrics {
        topic: TopicName,
        subscription: String,
        window: Duration,
    },
}

#[derive(Debug, Clone)]
enum CachedValue {
    Rate(f64),
    Metrics(SubscriptionMetrics),
}

/// Caches successful reads of an inner source for a fixed time-to-live.
///
/// The window is part of every cache key. Failed reads are never cached,
/// so a backend that recovers is seen on the next read. A zero TTL turns
/// the cache off.
///
/// ```
/// use std::time::Duration;
/// use subhealth_adapters::{CachingSource, StaticMetrics};
///
/// let source = CachingSource::new(StaticMetrics::new(), Duration::from_secs(30));
/// assert!(source.is_empty());
/// ```
#[derive(Debug)]
pub struct CachingSource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (Instant, CachedValue)>>,
    description: String,
}

impl<S: MetricsSource> CachingSource<S> {
    /// Wrap `inner`, keeping values for `ttl`.
    pub fn new(inner: S, ttl: Duration) -> Self {
        let description = format!("cached({:?}): {}", ttl, inner.description());
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
            description,
        }
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of entries currently held, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every cached value.
    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: CacheKey, value: CachedValue) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.lock().insert(key, (Instant::now(), value));
    }
}

#[async_trait]
impl<S: MetricsSource> MetricsSource for CachingSource<S> {
    async fn rate_for_topic(
        &self,
        topic: &TopicName,
        window: Duration,
    ) -> Result<f64, MetricsError> {
        let key = CacheKey::TopicRate {
            topic: topic.clone(),
            window,
        };
        if let Some(CachedValue::Rate(rate)) = self.get(&key) {
            trace!(%topic, "topic rate served from cache");
            return Ok(rate);
        }

        let rate = self.inner.rate_for_topic(topic, window).await?;
        self.put(key, CachedValue::Rate(rate));
        Ok(rate)
    }

    async fn rate_for_subscription(
        &self,
        topic: &TopicName,
        subscription: &str,
        window: Duration,
    ) -> Result<f64, MetricsError> {
        let key = CacheKey::SubscriptionRate {
            topic: topic.clone(),
            subscription: subscription.to_string(),
            window,
        };
        if let Some(CachedValue::Rate(rate)) = self.get(&key) {
            trace!(%topic, subscription, "subscription rate served from cache");
            return Ok(rate);
        }

        let rate = self
            .inner
            .rate_for_subscription(topic, subscription, window)
            .await?;
        self.put(key, CachedValue::Rate(rate));
        Ok(rate)
    }

    async fn subscription_metrics(
        &self,
        topic: &TopicName,
        subscription: &str,
        window: Duration,
    ) -> Result<SubscriptionMetrics, MetricsError> {
        let key = CacheKey::SubscriptionMetrics {
            topic: topic.clone(),
            subscription: subscription.to_string(),
            window,
        };
        if let Some(CachedValue::Metrics(metrics)) = self.get(&key) {
            trace!(%topic, subscription, "subscription metrics served from cache");
            return Ok(metrics);
        }

        let metrics = self
            .inner
            .subscription_metrics(topic, subscription, window)
            .await?;
        self.put(key, CachedValue::Metrics(metrics.clone()));
        Ok(metrics)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticMetrics;

    const WINDOW: Duration = Duration::from_secs(60);

    fn topic() -> TopicName {
        TopicName::new("group", "topic")
    }

    fn cached(ttl: Duration) -> CachingSource<StaticMetrics> {
        let inner = StaticMetrics::new();
        inner.set_topic_rate(&topic(), 100.0);
        inner.set_subscription_rate(&topic(), "s1", 80.0);
        CachingSource::new(inner, ttl)
    }

    #[tokio::test(start_paused = true)]
    async fn test_serves_from_cache_within_ttl() {
        let source = cached(Duration::from_secs(30));

        assert_eq!(source.rate_for_topic(&topic(), WINDOW).await.unwrap(), 100.0);
        source.inner().set_topic_rate(&topic(), 10.0);
        assert_eq!(source.rate_for_topic(&topic(), WINDOW).await.unwrap(), 100.0);
        assert_eq!(source.inner().topic_reads(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(source.rate_for_topic(&topic(), WINDOW).await.unwrap(), 10.0);
        assert_eq!(source.inner().topic_reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_is_part_of_key() {
        let source = cached(Duration::from_secs(30));

        source.rate_for_topic(&topic(), WINDOW).await.unwrap();
        source
            .rate_for_topic(&topic(), Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(source.inner().topic_reads(), 2);
        assert_eq!(source.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_not_cached() {
        let source = cached(Duration::from_secs(30));
        let other = TopicName::new("group", "other");

        assert!(source.rate_for_topic(&other, WINDOW).await.is_err());
        source.inner().set_topic_rate(&other, 5.0);
        assert_eq!(source.rate_for_topic(&other, WINDOW).await.unwrap(), 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_disables_cache() {
        let source = cached(Duration::ZERO);

        source
            .subscription_metrics(&topic(), "s1", WINDOW)
            .await
            .unwrap();
        source
            .subscription_metrics(&topic(), "s1", WINDOW)
            .await
            .unwrap();

        assert_eq!(source.inner().subscription_reads(), 2);
        assert!(source.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_all() {
        let source = cached(Duration::from_secs(30));

        source
            .rate_for_subscription(&topic(), "s1", WINDOW)
            .await
            .unwrap();
        source.invalidate_all();
        source
            .rate_for_subscription(&topic(), "s1", WINDOW)
            .await
            .unwrap();

        assert_eq!(source.inner().subscription_reads(), 2);
    }
}
