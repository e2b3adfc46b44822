//! Problem detection from observed rates.
//!
//! Detection is a pure function of a topic's publishing rate and one
//! subscription's metrics. Each problem kind has its own indicator; the
//! verdict is the set of problems whose indicators fire. Indicators never
//! look at each other, so the order they run in does not matter.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;
use subhealth_types::{Problem, SubscriptionMetrics};

/// Thresholds for problem detection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// A subscription consuming below `topic_rate * slow_ratio` is slow.
    pub slow_ratio: f64,
    /// Longest acceptable time to drain the lag at the topic's rate.
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub max_lag: Duration,
    /// Delivery rate below which error ratios are too noisy to judge.
    pub min_reliable_rate: f64,
    pub max_timeouts_ratio: f64,
    pub max_other_errors_ratio: f64,
    pub max_4xx_ratio: f64,
    pub max_5xx_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            slow_ratio: 0.75,
            max_lag: Duration::from_secs(600),
            min_reliable_rate: 2.0,
            max_timeouts_ratio: 0.1,
            max_other_errors_ratio: 0.5,
            max_4xx_ratio: 0.1,
            max_5xx_ratio: 0.1,
        }
    }
}

/// What an indicator gets to look at.
#[derive(Debug, Clone, Copy)]
struct Observation<'a> {
    topic_rate: f64,
    subscription: &'a SubscriptionMetrics,
}

impl Observation<'_> {
    fn subscription_rate(&self) -> f64 {
        sanitize(self.subscription.rate)
    }

    /// Whether the delivery rate is high enough for error ratios to mean anything.
    fn has_reliable_rate(&self, thresholds: &Thresholds) -> bool {
        self.subscription_rate() >= thresholds.min_reliable_rate
    }

    /// `errors` exceeds `max_ratio` of the delivery rate.
    fn error_ratio_exceeds(&self, errors: Option<f64>, max_ratio: f64) -> bool {
        errors.is_some_and(|errors| sanitize(errors) > self.subscription_rate() * max_ratio)
    }
}

type Indicator = fn(&Thresholds, &Observation<'_>) -> Option<Problem>;

/// Every indicator, each contributing at most one problem.
const INDICATORS: &[Indicator] = &[
    lagging,
    slow,
    unreachable,
    timing_out,
    malfunctioning,
    receiving_malformed_messages,
];

fn lagging(thresholds: &Thresholds, obs: &Observation<'_>) -> Option<Problem> {
    let lag = obs.subscription.lag? as f64;
    let fires = obs.topic_rate > 0.0 && lag / obs.topic_rate > thresholds.max_lag.as_secs_f64();
    fires.then_some(Problem::Lagging)
}

fn slow(thresholds: &Thresholds, obs: &Observation<'_>) -> Option<Problem> {
    let fires =
        obs.topic_rate > 0.0 && obs.subscription_rate() < obs.topic_rate * thresholds.slow_ratio;
    fires.then_some(Problem::Slow)
}

fn unreachable(thresholds: &Thresholds, obs: &Observation<'_>) -> Option<Problem> {
    let fires = obs.has_reliable_rate(thresholds)
        && obs.error_ratio_exceeds(
            obs.subscription.other_errors_rate,
            thresholds.max_other_errors_ratio,
        );
    fires.then_some(Problem::Unreachable)
}

fn timing_out(thresholds: &Thresholds, obs: &Observation<'_>) -> Option<Problem> {
    let fires = obs.has_reliable_rate(thresholds)
        && obs.error_ratio_exceeds(obs.subscription.timeouts_rate, thresholds.max_timeouts_ratio);
    fires.then_some(Problem::TimingOut)
}

fn malfunctioning(thresholds: &Thresholds, obs: &Observation<'_>) -> Option<Problem> {
    let fires = obs.has_reliable_rate(thresholds)
        && obs.error_ratio_exceeds(obs.subscription.code_5xx_rate, thresholds.max_5xx_ratio);
    fires.then_some(Problem::Malfunctioning)
}

fn receiving_malformed_messages(thresholds: &Thresholds, obs: &Observation<'_>) -> Option<Problem> {
    let fires = obs.has_reliable_rate(thresholds)
        && obs.error_ratio_exceeds(obs.subscription.code_4xx_rate, thresholds.max_4xx_ratio);
    fires.then_some(Problem::ReceivingMalformedMessages)
}

// Rates from a backend can be NaN or slightly negative after aggregation.
fn sanitize(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        0.0
    }
}

/// Classifies observed metrics into health problems.
#[derive(Debug, Clone, Default)]
pub struct ProblemDetector {
    thresholds: Thresholds,
}

impl ProblemDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Problems given only the topic and subscription rates.
    ///
    /// ```
    /// use subhealth::ProblemDetector;
    /// use subhealth_types::Problem;
    ///
    /// let detector = ProblemDetector::default();
    /// assert!(detector.detect(100.0, 100.0).is_empty());
    /// assert!(detector.detect(100.0, 50.0).contains(&Problem::Slow));
    /// assert!(detector.detect(0.0, 0.0).is_empty());
    /// ```
    pub fn detect(&self, topic_rate: f64, subscription_rate: f64) -> BTreeSet<Problem> {
        self.detect_metrics(topic_rate, &SubscriptionMetrics::with_rate(subscription_rate))
    }

    /// Problems given the topic rate and every known subscription metric.
    pub fn detect_metrics(
        &self,
        topic_rate: f64,
        subscription: &SubscriptionMetrics,
    ) -> BTreeSet<Problem> {
        let obs = Observation {
            topic_rate: sanitize(topic_rate),
            subscription,
        };
        INDICATORS
            .iter()
            .filter_map(|indicator| indicator(&self.thresholds, &obs))
            .collect()
    }
}
