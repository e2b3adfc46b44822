//! Health verdicts for subscriptions.

use std::collections::BTreeSet;

use crate::{Severity, Subscription};

/// A detected health issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Problem {
    /// Backlog would take too long to drain at the current publishing rate.
    Lagging,
    /// Most deliveries fail without reaching the endpoint.
    Unreachable,
    /// Many deliveries time out.
    TimingOut,
    /// The endpoint answers with server errors.
    Malfunctioning,
    /// The endpoint rejects messages with client errors.
    ReceivingMalformedMessages,
    /// Consuming markedly slower than the topic is published to.
    Slow,
    /// Metrics could not be read, so health is uncertain.
    Unknown,
}

/// Overall status of a health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// Metrics were missing and the subscription was left out of judgement.
    NoData,
}

/// Problems detected for one subscription at evaluation time.
///
/// A subscription is healthy iff the problem set is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubscriptionHealth {
    status: HealthStatus,
    problems: BTreeSet<Problem>,
}

impl SubscriptionHealth {
    /// Verdict for a set of detected problems.
    pub fn of(problems: BTreeSet<Problem>) -> Self {
        let status = if problems.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        Self { status, problems }
    }

    pub fn healthy() -> Self {
        Self::of(BTreeSet::new())
    }

    /// Verdict for a subscription whose metrics were unavailable.
    pub fn no_data() -> Self {
        Self {
            status: HealthStatus::NoData,
            problems: BTreeSet::new(),
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn problems(&self) -> &BTreeSet<Problem> {
        &self.problems
    }

    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }

    /// Report this verdict for `subscription`, or `None` when healthy.
    pub fn to_unhealthy(&self, subscription: &Subscription) -> Option<UnhealthySubscription> {
        if self.is_healthy() {
            return None;
        }
        Some(UnhealthySubscription {
            name: subscription.name.clone(),
            qualified_topic_name: subscription.topic.qualified(),
            severity: subscription.severity(),
            problems: self.problems.clone(),
        })
    }
}

/// A subscription with at least one detected problem.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct UnhealthySubscription {
    pub name: String,
    /// `"group.topic"` of the subscription's topic.
    pub qualified_topic_name: String,
    /// Severity as declared on the subscription.
    pub severity: Severity,
    pub problems: BTreeSet<Problem>,
}
