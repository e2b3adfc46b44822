//! Error types for health queries.

use std::time::Duration;

use subhealth_types::UnknownOwnerSource;
use thiserror::Error;

use crate::registry::RegistryError;

/// Errors that fail a whole query.
///
/// Metrics problems never show up here: they only affect the subscriptions
/// whose metrics are missing.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The owner source name was not recognised.
    #[error(transparent)]
    UnknownOwnerSource(#[from] UnknownOwnerSource),

    /// The registry could not answer.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The query did not finish in time; nothing was reported.
    #[error("Query timed out after {0:?}")]
    TimedOut(Duration),
}
