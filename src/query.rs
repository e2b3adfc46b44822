//! Owner-scoped queries over unhealthy subscriptions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use subhealth_types::{OwnerId, Subscription, TopicName, UnhealthySubscription};
use tracing::info;

use crate::duration::format_duration;
use crate::error::QueryError;
use crate::evaluator::HealthEvaluator;
use crate::registry::Registry;

/// Lists the unhealthy subscriptions of an owner.
///
/// Each query reads the owner's subscriptions from the registry once,
/// evaluates every topic they span concurrently (one topic-rate read per
/// topic), and returns the unhealthy ones sorted by subscription name.
/// Queries keep no state between calls.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use subhealth::{HealthEvaluator, InMemoryRegistry, ProblemDetector, UnhealthyQueryService};
/// use subhealth_adapters::StaticMetrics;
/// use subhealth_types::{OwnerId, Problem, Subscription, Topic, TopicName};
///
/// # tokio_test::block_on(async {
/// let topic = TopicName::new("group", "topic");
/// let registry = Arc::new(InMemoryRegistry::new());
/// registry.add_topic(Topic::from(topic.clone()));
/// registry
///     .add_subscription(
///         Subscription::builder(topic.clone(), "s1")
///             .owner(OwnerId::Plaintext("Team A".into()))
///             .build(),
///     )
///     .unwrap();
///
/// let metrics = Arc::new(StaticMetrics::new());
/// metrics.set_topic_rate(&topic, 100.0);
/// metrics.set_subscription_rate(&topic, "s1", 10.0);
///
/// let service = UnhealthyQueryService::new(
///     registry,
///     HealthEvaluator::new(metrics, ProblemDetector::default()),
/// );
///
/// let unhealthy = service.list_unhealthy_for_owner("Plaintext", "Team A").await.unwrap();
/// assert_eq!(unhealthy.len(), 1);
/// assert!(unhealthy[0].problems.contains(&Problem::Slow));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct UnhealthyQueryService {
    registry: Arc<dyn Registry>,
    evaluator: HealthEvaluator,
    timeout: Option<Duration>,
}

impl UnhealthyQueryService {
    /// Create a service without a query timeout.
    pub fn new(registry: Arc<dyn Registry>, evaluator: HealthEvaluator) -> Self {
        Self {
            registry,
            evaluator,
            timeout: None,
        }
    }

    /// Abandon queries that take longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Unhealthy subscriptions of the owner given by source name and id.
    pub async fn list_unhealthy_for_owner(
        &self,
        owner_source: &str,
        owner_id: &str,
    ) -> Result<Vec<UnhealthySubscription>, QueryError> {
        let owner = OwnerId::new(owner_source, owner_id)?;
        self.unhealthy_for(&owner).await
    }

    /// Unhealthy subscriptions of `owner`, sorted by name.
    pub async fn unhealthy_for(
        &self,
        owner: &OwnerId,
    ) -> Result<Vec<UnhealthySubscription>, QueryError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.collect_unhealthy(owner))
                .await
                .map_err(|_| QueryError::TimedOut(limit))?,
            None => self.collect_unhealthy(owner).await,
        }
    }

    async fn collect_unhealthy(
        &self,
        owner: &OwnerId,
    ) -> Result<Vec<UnhealthySubscription>, QueryError> {
        let started = Instant::now();
        let owned = self.registry.subscriptions_owned_by(owner).await?;
        let by_topic = group_by_topic(owner, owned);

        let evaluations = join_all(by_topic.iter().map(|(topic, subscriptions)| async move {
            let health = self.evaluator.evaluate(topic, subscriptions).await;
            (subscriptions, health)
        }))
        .await;

        let mut unhealthy: Vec<UnhealthySubscription> = evaluations
            .into_iter()
            .flat_map(|(subscriptions, health)| {
                subscriptions
                    .iter()
                    .filter_map(move |s| health.get(&s.name)?.to_unhealthy(s))
            })
            .collect();
        unhealthy.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.qualified_topic_name.cmp(&b.qualified_topic_name))
        });

        info!(
            %owner,
            topics = by_topic.len(),
            unhealthy = unhealthy.len(),
            elapsed = %format_duration(started.elapsed()),
            "listed unhealthy subscriptions"
        );
        Ok(unhealthy)
    }
}

/// Group `owner`'s subscriptions by topic, dropping duplicates and any
/// subscription of another owner.
fn group_by_topic(
    owner: &OwnerId,
    subscriptions: Vec<Subscription>,
) -> BTreeMap<TopicName, Vec<Subscription>> {
    let mut seen = BTreeSet::new();
    let mut by_topic: BTreeMap<TopicName, Vec<Subscription>> = BTreeMap::new();

    for subscription in subscriptions {
        if subscription.owner != *owner
            || !seen.insert((subscription.topic.clone(), subscription.name.clone()))
        {
            continue;
        }
        by_topic
            .entry(subscription.topic.clone())
            .or_default()
            .push(subscription);
    }
    by_topic
}
