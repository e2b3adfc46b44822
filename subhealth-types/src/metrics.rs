//! Rate metrics observed for a subscription.

/// Metrics for one subscription over a trailing window.
///
/// All rates are messages per second. Only `rate` is required; the other
/// fields are filled in when the metrics backend has them.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubscriptionMetrics {
    /// Messages delivered per second.
    pub rate: f64,

    /// Deliveries timing out per second.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub timeouts_rate: Option<f64>,

    /// Deliveries failing for reasons other than an HTTP status, per second.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub other_errors_rate: Option<f64>,

    /// Deliveries answered with a 4xx status, per second.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub code_4xx_rate: Option<f64>,

    /// Deliveries answered with a 5xx status, per second.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub code_5xx_rate: Option<f64>,

    /// Messages published to the topic but not yet delivered.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub lag: Option<u64>,
}

impl SubscriptionMetrics {
    /// Metrics carrying only a delivery rate.
    pub fn with_rate(rate: f64) -> Self {
        Self {
            rate,
            ..Default::default()
        }
    }

    /// Create a builder for subscription metrics.
    pub fn builder() -> SubscriptionMetricsBuilder {
        SubscriptionMetricsBuilder::new()
    }
}

/// Builder for `SubscriptionMetrics`.
#[derive(Debug, Default)]
pub struct SubscriptionMetricsBuilder {
    metrics: SubscriptionMetrics,
}

impl SubscriptionMetricsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delivery rate.
    pub fn rate(mut self, rate: f64) -> Self {
        self.metrics.rate = rate;
        self
    }

    /// Set the timeout rate.
    pub fn timeouts(mut self, rate: f64) -> Self {
        self.metrics.timeouts_rate = Some(rate);
        self
    }

    /// Set the rate of non-HTTP delivery errors.
    pub fn other_errors(mut self, rate: f64) -> Self {
        self.metrics.other_errors_rate = Some(rate);
        self
    }

    /// Set the 4xx response rate.
    pub fn code_4xx(mut self, rate: f64) -> Self {
        self.metrics.code_4xx_rate = Some(rate);
        self
    }

    /// Set the 5xx response rate.
    pub fn code_5xx(mut self, rate: f64) -> Self {
        self.metrics.code_5xx_rate = Some(rate);
        self
    }

    /// Set the undelivered message count.
    pub fn lag(mut self, lag: u64) -> Self {
        self.metrics.lag = Some(lag);
        self
    }

    /// Build the metrics.
    pub fn build(self) -> SubscriptionMetrics {
        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let metrics = SubscriptionMetrics::builder()
            .rate(100.0)
            .timeouts(1.5)
            .code_5xx(3.0)
            .lag(250)
            .build();

        assert_eq!(metrics.rate, 100.0);
        assert_eq!(metrics.timeouts_rate, Some(1.5));
        assert_eq!(metrics.other_errors_rate, None);
        assert_eq!(metrics.code_4xx_rate, None);
        assert_eq!(metrics.code_5xx_rate, Some(3.0));
        assert_eq!(metrics.lag, Some(250));
    }

    #[test]
    fn test_with_rate() {
        assert_eq!(
            SubscriptionMetrics::with_rate(42.0),
            SubscriptionMetrics::builder().rate(42.0).build()
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_optional_fields_default() {
        let metrics: SubscriptionMetrics = serde_json::from_str(r#"{"rate": 12.5}"#).unwrap();
        assert_eq!(metrics, SubscriptionMetrics::with_rate(12.5));

        let json = serde_json::to_string(&metrics).unwrap();
        assert_eq!(json, r#"{"rate":12.5}"#);
    }
}
