//! Introspection capability of a live data source.
//!
//! The aggregator talks to a connection only through [`MetadataSource`]:
//! one call for the source's identity and one call per [`CategoryId`]. Rows
//! come back untyped (label → JSON value) and are bound onto records by
//! [`crate::binding`].
//!
//! # Module Structure
//! - `scripted`: in-memory fake with per-category scripts, for tests and demos
//! - `sqlite`: real implementation on top of `sqlx` (feature `sqlite`)
//!
//! # Object Safety
//! The trait is object-safe; the collector holds a `Box<dyn MetadataSource>`.

use crate::category::CategoryId;
use crate::fingerprint::Fingerprint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod scripted;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use scripted::{Script, ScriptedSource};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSource;

/// One raw row of an introspection result, keyed by column label.
pub type MetadataRow = serde_json::Map<String, serde_json::Value>;

/// Result type of source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Failure reported by a source call.
///
/// The distinction matters to the aggregator: `Unsupported` is recorded and
/// collection continues, `Failed` aborts the run.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source does not implement this operation
    #[error("Operation not supported by this source: {operation}")]
    Unsupported { operation: String },

    /// The operation was attempted and failed
    #[error("Source operation failed: {context}")]
    Failed {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SourceError {
    /// Creates an unsupported-operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Creates a failure without an underlying cause
    pub fn failed(context: impl Into<String>) -> Self {
        Self::Failed {
            context: context.into(),
            source: None,
        }
    }

    /// Creates a failure wrapping the underlying driver error
    pub fn failed_with<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed {
            context: context.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Checks whether this is a soft "not supported" outcome.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// What a source reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentity {
    pub product_name: String,
    pub product_version: String,
    pub driver_name: Option<String>,
    pub driver_version: Option<String>,
}

impl SourceIdentity {
    /// Creates an identity without driver information.
    pub fn new(product_name: impl Into<String>, product_version: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            product_version: product_version.into(),
            driver_name: None,
            driver_version: None,
        }
    }

    /// Adds driver name and version.
    pub fn with_driver(
        mut self,
        driver_name: impl Into<String>,
        driver_version: impl Into<String>,
    ) -> Self {
        self.driver_name = Some(driver_name.into());
        self.driver_version = Some(driver_version.into());
        self
    }

    /// Computes the fingerprint of this identity.
    ///
    /// # Errors
    /// Returns `InvalidFingerprint` if the product name is empty.
    pub fn fingerprint(&self) -> crate::Result<Fingerprint> {
        Fingerprint::compute(
            &self.product_name,
            &self.product_version,
            self.driver_version.as_deref(),
        )
    }
}

/// Read-only metadata introspection over one open connection.
///
/// Implementations never close the connection they are given; the caller
/// owns it. Calls are issued one at a time and awaited in order.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Reports product and driver identity.
    ///
    /// # Errors
    /// Returns error if the source cannot be queried at all
    async fn identity(&self) -> SourceResult<SourceIdentity>;

    /// Runs the introspection query for one category.
    ///
    /// # Errors
    /// Returns `SourceError::Unsupported` when the source has no such query,
    /// `SourceError::Failed` for every other failure
    async fn fetch(&self, category: CategoryId) -> SourceResult<Vec<MetadataRow>>;
}
