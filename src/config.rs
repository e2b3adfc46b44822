//! Runtime settings.
//!
//! Settings come from an optional TOML file and `SUBHEALTH__` environment
//! variables, the latter taking precedence:
//!
//! ```toml
//! [metrics]
//! graphite_url = "http://graphite.local:8080"
//! prefix = "stats.tech.hermes"
//! window = "2m"
//! cache_ttl = "30s"
//!
//! [health]
//! slow_ratio = 0.75
//! max_lag = "10m"
//!
//! [query]
//! timeout = "30s"
//! missing_metrics = "report-unknown"
//! ```
//!
//! e.g. `SUBHEALTH__QUERY__TIMEOUT=5s` overrides `query.timeout`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use subhealth_adapters::graphite::GraphiteSource;
use subhealth_adapters::{CachingSource, MetricsSource};

use crate::detect::{ProblemDetector, Thresholds};
use crate::evaluator::{HealthEvaluator, MissingMetricsPolicy};
use crate::query::UnhealthyQueryService;
use crate::registry::Registry;

const ENV_PREFIX: &str = "SUBHEALTH";

/// All runtime settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub metrics: MetricsSettings,
    pub health: Thresholds,
    pub query: QuerySettings,
}

/// Where metrics come from and how they are read.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Base URL of the Graphite render API.
    pub graphite_url: Option<String>,
    /// Metric path prefix the broker reports under.
    pub prefix: String,
    /// Trailing window rates are averaged over.
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub window: Duration,
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub request_timeout: Duration,
    /// How long successful reads are reused. Zero disables caching.
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub cache_ttl: Duration,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            graphite_url: None,
            prefix: "stats.tech.hermes".to_string(),
            window: Duration::from_secs(120),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Deadline for a whole query. Zero means no deadline.
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub missing_metrics: MissingMetricsPolicy,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_concurrent_fetches: 16,
            missing_metrics: MissingMetricsPolicy::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_sources(path, Environment::with_prefix(ENV_PREFIX).separator("__"))
    }

    fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(env)
            .build()
            .context("Failed to load settings")?;

        config
            .try_deserialize()
            .context("Invalid settings")
    }

    /// Graphite source for the configured endpoint, behind a cache.
    pub fn graphite_source(&self) -> Result<Arc<dyn MetricsSource>> {
        let url = self
            .metrics
            .graphite_url
            .as_deref()
            .context("metrics.graphite_url is not set")?;

        let graphite = GraphiteSource::builder()
            .endpoint(url)
            .prefix(self.metrics.prefix.as_str())
            .timeout(self.metrics.request_timeout)
            .build()?;
        Ok(Arc::new(CachingSource::new(graphite, self.metrics.cache_ttl)))
    }

    /// An evaluator reading from `metrics` with these settings.
    pub fn evaluator(&self, metrics: Arc<dyn MetricsSource>) -> HealthEvaluator {
        HealthEvaluator::new(metrics, ProblemDetector::new(self.health.clone()))
            .window(self.metrics.window)
            .missing_metrics(self.query.missing_metrics)
            .max_concurrent_fetches(self.query.max_concurrent_fetches)
    }

    /// A query service over `registry` and `metrics` with these settings.
    pub fn query_service(
        &self,
        registry: Arc<dyn Registry>,
        metrics: Arc<dyn MetricsSource>,
    ) -> UnhealthyQueryService {
        let service = UnhealthyQueryService::new(registry, self.evaluator(metrics));
        if self.query.timeout.is_zero() {
            service
        } else {
            service.timeout(self.query.timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .source(Some(HashMap::new()))
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .source(Some(vars))
    }

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_sources(None, no_env()).unwrap();

        assert_eq!(settings.metrics.graphite_url, None);
        assert_eq!(settings.metrics.prefix, "stats.tech.hermes");
        assert_eq!(settings.metrics.window, Duration::from_secs(120));
        assert_eq!(settings.metrics.cache_ttl, Duration::from_secs(30));
        assert_eq!(settings.health, Thresholds::default());
        assert_eq!(settings.query.timeout, Duration::from_secs(30));
        assert_eq!(settings.query.max_concurrent_fetches, 16);
        assert_eq!(settings.query.missing_metrics, MissingMetricsPolicy::Exclude);
    }

    #[test]
    fn test_load_file() {
        let file = toml_file(
            r#"
            [metrics]
            graphite_url = "http://graphite:8080"
            window = "5m"
            cache_ttl = "0s"

            [health]
            slow_ratio = 0.5
            max_lag = "1h"

            [query]
            missing_metrics = "report-unknown"
            "#,
        );

        let settings = Settings::from_sources(Some(file.path()), no_env()).unwrap();

        assert_eq!(
            settings.metrics.graphite_url.as_deref(),
            Some("http://graphite:8080")
        );
        assert_eq!(settings.metrics.window, Duration::from_secs(300));
        assert!(settings.metrics.cache_ttl.is_zero());
        assert_eq!(settings.health.slow_ratio, 0.5);
        assert_eq!(settings.health.max_lag, Duration::from_secs(3600));
        assert_eq!(settings.health.min_reliable_rate, 2.0);
        assert_eq!(
            settings.query.missing_metrics,
            MissingMetricsPolicy::ReportUnknown
        );
        assert_eq!(settings.query.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file("[query]\ntimeout = \"30s\"\n");

        let settings = Settings::from_sources(
            Some(file.path()),
            env(&[
                ("SUBHEALTH__QUERY__TIMEOUT", "5s"),
                ("SUBHEALTH__METRICS__PREFIX", "stats.hermes"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.query.timeout, Duration::from_secs(5));
        assert_eq!(settings.metrics.prefix, "stats.hermes");
    }

    #[test]
    fn test_bad_duration() {
        let file = toml_file("[metrics]\nwindow = \"two minutes\"\n");
        assert!(Settings::from_sources(Some(file.path()), no_env()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("/nonexistent/subhealth.toml");
        assert!(Settings::from_sources(Some(path), no_env()).is_err());
    }

    #[test]
    fn test_graphite_needs_url() {
        let settings = Settings::default();
        assert!(settings.graphite_source().is_err());

        let mut settings = Settings::default();
        settings.metrics.graphite_url = Some("http://graphite:8080".into());
        let source = settings.graphite_source().unwrap();
        assert!(source.description().starts_with("cached("));
    }
}
