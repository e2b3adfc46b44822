//! Graphite metrics source using the render HTTP API.
//!
//! Broker frontends publish per-topic meters and consumers publish
//! per-subscription meters and delivery status counters. This source sums
//! them across hosts with `sumSeries` and reads the latest datapoint in the
//! requested window.
//!
//! ## Series Read
//!
//! - **Topic rate**: `<prefix>.producer.*.meter.<group>.<topic>.m1_rate`
//! - **Subscription rate**: `<prefix>.consumer.*.meter.<group>.<topic>.<subscription>.m1_rate`
//! - **Delivery errors**: `<prefix>.consumer.*.status.<group>.<topic>.<subscription>.{timeouts,errors.other,4xx,5xx}.m1_rate`
//! - **Lag**: `<prefix>.consumer.*.subscription.<group>.<topic>.<subscription>.lag`
//!
//! Dots inside names are escaped to underscores, as the broker does when
//! it reports them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use subhealth_adapters::graphite::GraphiteSource;
//! use subhealth_adapters::MetricsSource;
//! use subhealth_types::TopicName;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = GraphiteSource::builder()
//!         .endpoint("http://graphite.local:8080")
//!         .prefix("stats.tech.hermes")
//!         .build()?;
//!
//!     let topic = TopicName::new("pl.allegro", "orders");
//!     let rate = source.rate_for_topic(&topic, Duration::from_secs(120)).await?;
//!     println!("{} publishes {:.1} msg/s", topic, rate);
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use subhealth_types::{SubscriptionMetrics, TopicName};
use tracing::debug;

use crate::{MetricsError, MetricsSource};

const RATE: &str = "rate";
const TIMEOUTS: &str = "timeouts";
const OTHER_ERRORS: &str = "other_errors";
const CODE_4XX: &str = "code_4xx";
const CODE_5XX: &str = "code_5xx";
const LAG: &str = "lag";

/// Graphite source for topic and subscription rates.
#[derive(Debug, Clone)]
pub struct GraphiteSource {
    client: Client,
    endpoint: String,
    prefix: String,
    description: String,
}

impl GraphiteSource {
    /// Create a new builder for configuring the source.
    pub fn builder() -> GraphiteSourceBuilder {
        GraphiteSourceBuilder::default()
    }

    fn topic_path(&self, topic: &TopicName) -> String {
        format!(
            "{}.producer.*.meter.{}.{}.m1_rate",
            self.prefix,
            escape(&topic.group),
            escape(&topic.name)
        )
    }

    fn subscription_path(&self, kind: &str, topic: &TopicName, subscription: &str) -> String {
        format!(
            "{}.consumer.*.{}.{}.{}.{}",
            self.prefix,
            kind,
            escape(&topic.group),
            escape(&topic.name),
            escape(subscription)
        )
    }

    fn subscription_targets(&self, topic: &TopicName, subscription: &str) -> Vec<String> {
        let meter = |kind: &str, suffix: &str, alias: &str| {
            aliased(
                &format!("{}.{}", self.subscription_path(kind, topic, subscription), suffix),
                alias,
            )
        };
        vec![
            meter("meter", "m1_rate", RATE),
            meter("status", "timeouts.m1_rate", TIMEOUTS),
            meter("status", "errors.other.m1_rate", OTHER_ERRORS),
            meter("status", "4xx.m1_rate", CODE_4XX),
            meter("status", "5xx.m1_rate", CODE_5XX),
            meter("subscription", "lag", LAG),
        ]
    }

    /// Render `targets` over `window`, returning the latest value per alias.
    async fn render(
        &self,
        targets: &[String],
        window: Duration,
    ) -> Result<BTreeMap<String, f64>, MetricsError> {
        let url = format!("{}/render", self.endpoint);
        let from = format!("-{}s", window.as_secs().max(1));

        let mut query: Vec<(&str, &str)> = vec![
            ("format", "json"),
            ("from", from.as_str()),
            ("until", "now"),
        ];
        query.extend(targets.iter().map(|t| ("target", t.as_str())));

        debug!(%url, ?targets, "rendering graphite targets");

        let response = self.client.get(&url).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(MetricsError::Http(format!(
                "Graphite returned status {}",
                response.status()
            )));
        }

        let series: Vec<Series> = response
            .json()
            .await
            .map_err(|e| MetricsError::Parse(e.to_string()))?;

        Ok(latest_values(series))
    }
}

#[async_trait]
impl MetricsSource for GraphiteSource {
    async fn rate_for_topic(
        &self,
        topic: &TopicName,
        window: Duration,
    ) -> Result<f64, MetricsError> {
        let targets = [aliased(&self.topic_path(topic), RATE)];
        self.render(&targets, window)
            .await?
            .remove(RATE)
            .ok_or_else(|| MetricsError::Unavailable(topic.qualified()))
    }

    async fn rate_for_subscription(
        &self,
        topic: &TopicName,
        subscription: &str,
        window: Duration,
    ) -> Result<f64, MetricsError> {
        let path = format!(
            "{}.m1_rate",
            self.subscription_path("meter", topic, subscription)
        );
        self.render(&[aliased(&path, RATE)], window)
            .await?
            .remove(RATE)
            .ok_or_else(|| MetricsError::Unavailable(format!("{}.{}", topic, subscription)))
    }

    async fn subscription_metrics(
        &self,
        topic: &TopicName,
        subscription: &str,
        window: Duration,
    ) -> Result<SubscriptionMetrics, MetricsError> {
        let targets = self.subscription_targets(topic, subscription);
        let values = self.render(&targets, window).await?;
        metrics_from_values(values)
            .ok_or_else(|| MetricsError::Unavailable(format!("{}.{}", topic, subscription)))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for GraphiteSource.
#[derive(Debug, Default)]
pub struct GraphiteSourceBuilder {
    endpoint: Option<String>,
    prefix: Option<String>,
    timeout: Option<Duration>,
}

impl GraphiteSourceBuilder {
    /// Set the Graphite web endpoint (e.g., "http://localhost:8080").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the metric path prefix (default: "stats.tech.hermes").
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the source.
    pub fn build(self) -> Result<GraphiteSource, MetricsError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MetricsError::Connection(e.to_string()))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GraphiteSource {
            client,
            description: format!("graphite: {}", endpoint),
            endpoint,
            prefix: self
                .prefix
                .unwrap_or_else(|| "stats.tech.hermes".to_string()),
        })
    }
}

// Graphite uses dots as path separators
fn escape(segment: &str) -> String {
    segment.replace('.', "_")
}

fn aliased(path: &str, alias: &str) -> String {
    format!("alias(sumSeries({}),'{}')", path, alias)
}

fn latest_values(series: Vec<Series>) -> BTreeMap<String, f64> {
    series
        .into_iter()
        .filter_map(|s| {
            let value = s.datapoints.iter().rev().find_map(|(value, _)| *value)?;
            Some((s.target, value.max(0.0)))
        })
        .collect()
}

fn metrics_from_values(mut values: BTreeMap<String, f64>) -> Option<SubscriptionMetrics> {
    Some(SubscriptionMetrics {
        rate: values.remove(RATE)?,
        timeouts_rate: values.remove(TIMEOUTS),
        other_errors_rate: values.remove(OTHER_ERRORS),
        code_4xx_rate: values.remove(CODE_4XX),
        code_5xx_rate: values.remove(CODE_5XX),
        lag: values.remove(LAG).map(|lag| lag.round() as u64),
    })
}

/// One rendered series from the Graphite API.
#[derive(Debug, Deserialize)]
struct Series {
    target: String,
    /// `[value, timestamp]` pairs, oldest first; values may be null.
    datapoints: Vec<(Option<f64>, Option<f64>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> GraphiteSource {
        GraphiteSource::builder().build().unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let source = source();
        assert_eq!(source.endpoint, "http://localhost:8080");
        assert_eq!(source.prefix, "stats.tech.hermes");
        assert_eq!(source.description(), "graphite: http://localhost:8080");
    }

    #[test]
    fn test_builder_custom() {
        let source = GraphiteSource::builder()
            .endpoint("http://graphite.local/")
            .prefix("metrics.broker")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        assert_eq!(source.endpoint, "http://graphite.local");
        assert_eq!(source.prefix, "metrics.broker");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("pl.allegro"), "pl_allegro");
        assert_eq!(escape("simple"), "simple");
    }

    #[test]
    fn test_topic_target() {
        let topic = TopicName::new("pl.allegro", "orders");
        assert_eq!(
            aliased(&source().topic_path(&topic), RATE),
            "alias(sumSeries(stats.tech.hermes.producer.*.meter.pl_allegro.orders.m1_rate),'rate')"
        );
    }

    #[test]
    fn test_subscription_targets() {
        let topic = TopicName::new("group", "topic");
        let targets = source().subscription_targets(&topic, "s1");

        assert_eq!(targets.len(), 6);
        assert_eq!(
            targets[0],
            "alias(sumSeries(stats.tech.hermes.consumer.*.meter.group.topic.s1.m1_rate),'rate')"
        );
        assert_eq!(
            targets[4],
            "alias(sumSeries(stats.tech.hermes.consumer.*.status.group.topic.s1.5xx.m1_rate),'code_5xx')"
        );
        assert_eq!(
            targets[5],
            "alias(sumSeries(stats.tech.hermes.consumer.*.subscription.group.topic.s1.lag),'lag')"
        );
    }

    #[test]
    fn test_latest_non_null_datapoint() {
        let series: Vec<Series> = serde_json::from_str(
            r#"[
                {"target": "rate", "datapoints": [[100.0, 1700000000], [50.0, 1700000060], [null, 1700000120]]},
                {"target": "lag", "datapoints": [[null, 1700000000]]}
            ]"#,
        )
        .unwrap();

        let values = latest_values(series);
        assert_eq!(values.get(RATE), Some(&50.0));
        assert!(!values.contains_key(LAG));
    }

    #[test]
    fn test_metrics_from_values() {
        let values = BTreeMap::from([
            (RATE.to_string(), 20.0),
            (CODE_4XX.to_string(), 3.0),
            (LAG.to_string(), 41.6),
        ]);

        let metrics = metrics_from_values(values).unwrap();
        assert_eq!(metrics.rate, 20.0);
        assert_eq!(metrics.code_4xx_rate, Some(3.0));
        assert_eq!(metrics.timeouts_rate, None);
        assert_eq!(metrics.lag, Some(42));
    }

    #[test]
    fn test_metrics_require_rate() {
        let values = BTreeMap::from([(TIMEOUTS.to_string(), 1.0)]);
        assert!(metrics_from_values(values).is_none());
    }
}
