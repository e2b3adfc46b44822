//! # subhealth-adapters
//!
//! Metrics sources feeding subscription health evaluation.
//!
//! The health engine only needs two numbers to judge a subscription: how
//! fast its topic is published to and how fast the subscription consumes.
//! This crate defines the [`MetricsSource`] trait that supplies them and
//! ships ready-to-use implementations.
//!
//! ## Sources
//!
//! - **Graphite** (`graphite` feature) - Reads broker meters through the
//!   Graphite render API
//! - **Static** - Fixed in-memory values, settable at runtime or loaded
//!   from a JSON file
//! - **Caching** - Wraps any source and keeps successful reads for a TTL
//!
//! ## Quick Start (Graphite)
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use subhealth_adapters::graphite::GraphiteSource;
//! use subhealth_adapters::{CachingSource, MetricsSource};
//! use subhealth_types::TopicName;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let graphite = GraphiteSource::builder()
//!         .endpoint("http://localhost:8080")
//!         .build()?;
//!     let source = CachingSource::new(graphite, Duration::from_secs(30));
//!
//!     let topic = TopicName::new("group", "topic");
//!     let metrics = source
//!         .subscription_metrics(&topic, "s1", Duration::from_secs(120))
//!         .await?;
//!
//!     println!("s1 consumes {:.1} msg/s", metrics.rate);
//!     Ok(())
//! }
//! ```

pub mod error;

mod cache;
mod memory;
mod source;

#[cfg(feature = "graphite")]
pub mod graphite;

pub use cache::CachingSource;
pub use error::MetricsError;
pub use memory::StaticMetrics;
pub use source::MetricsSource;

// Re-export types for convenience
pub use subhealth_types::{SubscriptionMetrics, TopicName};
