//! # subhealth-types
//!
//! Core types for evaluating the health of broker subscriptions. This crate
//! defines the domain model shared by the metrics adapters and the health
//! engine: topics, subscriptions, their owners and declared severities, the
//! problems a subscription can have, and the records reported for unhealthy
//! subscriptions.
//!
//! ## Design Goals
//!
//! - **Minimal dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for JSON and friends
//! - **Typed identities**: Owners are an enum over their source, never a loose string pair
//! - **Ergonomic builders**: Fluent API for constructing subscriptions and metrics
//!
//! ## Features
//!
//! - `serde`: Serialization via serde, using the broker's wire names
//!
//! ## Example
//!
//! ```rust
//! use subhealth_types::{OwnerId, Severity, Subscription, TopicName};
//!
//! let topic = TopicName::new("pl.allegro", "orders");
//! let subscription = Subscription::builder(topic, "order-mailer")
//!     .endpoint("http://mailer.local/orders")
//!     .owner(OwnerId::Plaintext("Team A".into()))
//!     .severity(Severity::Critical)
//!     .build();
//!
//! assert_eq!(subscription.topic.qualified(), "pl.allegro.orders");
//! assert_eq!(subscription.severity(), Severity::Critical);
//! ```

mod health;
mod metrics;
mod owner;
mod subscription;
mod topic;

pub use health::*;
pub use metrics::*;
pub use owner::*;
pub use subscription::*;
pub use topic::*;
