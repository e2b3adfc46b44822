//! # subhealth
//!
//! Subscription health reporting for a publish/subscribe broker.
//!
//! Given the broker's registry of topics and subscriptions and a source of
//! delivery metrics, this crate answers one question: which subscriptions
//! owned by a given team are unhealthy right now, and why.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   owned subscriptions   ┌────────────────────────┐
//! │   Registry   │────────────────────────▶│ UnhealthyQueryService  │
//! │ (ownership)  │                         │  group by topic, sort  │
//! └──────────────┘                         └───────────┬────────────┘
//!                                                      │ per topic
//!                                                      ▼
//! ┌──────────────┐   topic + sub rates     ┌────────────────────────┐
//! │MetricsSource │────────────────────────▶│    HealthEvaluator     │
//! │  (Graphite)  │                         │   ProblemDetector      │
//! └──────────────┘                         └────────────────────────┘
//! ```
//!
//! - **[`registry`]**: Read access to topics and subscriptions, with an
//!   in-memory implementation backed by an [`OwnershipIndex`]
//! - **[`detect`]**: Pure problem detection from rates and error counters
//! - **[`evaluator`]**: Per-topic evaluation with one topic-rate read and
//!   bounded concurrent subscription reads
//! - **[`query`]**: Owner-scoped listing of unhealthy subscriptions
//! - **[`config`]**: Settings from a TOML file and the environment
//!
//! Metrics sources live in `subhealth-adapters`; shared data types in
//! `subhealth-types`.
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Against Graphite
//! subhealth --registry registry.json --graphite http://graphite:8080 --owner "Team A"
//!
//! # Against a static metrics snapshot
//! subhealth --registry registry.json --metrics metrics.json --owner "Team A" --pretty
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use subhealth::{InMemoryRegistry, Settings};
//! use subhealth_adapters::StaticMetrics;
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(InMemoryRegistry::new());
//! let metrics = Arc::new(StaticMetrics::new());
//!
//! let service = Settings::default().query_service(registry, metrics);
//! let unhealthy = service
//!     .list_unhealthy_for_owner("Plaintext", "Team A")
//!     .await
//!     .unwrap();
//! assert!(unhealthy.is_empty());
//! # });
//! ```

pub mod config;
pub mod detect;
pub mod duration;
pub mod error;
pub mod evaluator;
pub mod ownership;
pub mod query;
pub mod registry;

// Re-export main types for convenience
pub use config::Settings;
pub use detect::{ProblemDetector, Thresholds};
pub use error::QueryError;
pub use evaluator::{HealthEvaluator, MissingMetricsPolicy, TopicHealth};
pub use ownership::OwnershipIndex;
pub use query::UnhealthyQueryService;
pub use registry::{InMemoryRegistry, Registry, RegistryError};
