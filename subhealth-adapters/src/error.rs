//! Error types for metrics sources.

use thiserror::Error;

/// Errors that can occur when reading metrics.
///
/// Every variant means "no usable value for this read"; callers decide how
/// to treat the affected subscription.
#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    /// The backend has no datapoints for the requested series.
    #[error("No metrics available for {0}")]
    Unavailable(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,
}

impl MetricsError {
    /// True when the backend answered but had no data, as opposed to
    /// being unreachable.
    pub fn is_missing_data(&self) -> bool {
        matches!(self, MetricsError::Unavailable(_))
    }
}

#[cfg(feature = "graphite")]
impl From<reqwest::Error> for MetricsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MetricsError::Timeout
        } else if err.is_connect() {
            MetricsError::Connection(err.to_string())
        } else if err.is_decode() {
            MetricsError::Parse(err.to_string())
        } else {
            MetricsError::Http(err.to_string())
        }
    }
}
