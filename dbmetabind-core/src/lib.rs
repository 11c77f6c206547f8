//! Core types and collection logic for dbmetabind.
//!
//! This crate collects the metadata a relational data source reports about
//! itself into one strongly typed [`MetadataSnapshot`], applying per-vendor
//! suppressions keyed by the source's identity fingerprint.
//!
//! # Flow
//! - A [`MetadataSource`] reports its identity; a [`Fingerprint`] is derived
//! - The [`SuppressionTable`] resolves the categories and fields to skip
//! - The [`Aggregator`] walks every category in a fixed order
//! - [`verify`] checks the finished snapshot for structural consistency
//! - The snapshot serializes to JSON checked by [`validation`]
//!
//! # Security Guarantees
//! - Sources are only read, never written
//! - Connection URLs are redacted before they reach logs or errors

pub mod aggregator;
pub mod binding;
pub mod category;
pub mod config;
pub mod constants;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod models;
pub mod source;
pub mod suppression;
pub mod validation;
pub mod verifier;

// Re-export commonly used types
pub use aggregator::{AggregationPhase, Aggregator, Collected, CollectionWarning, collect};
pub use category::CategoryId;
pub use config::{CollectionConfig, OutputFormat};
pub use constants::{
    ApiConstant, BestRowScope, ColumnNullability, KeyDeferrability, KeyRule, PseudoColumnKind,
    ResultSetConcurrency, ResultSetHoldability, ResultSetType, TransactionIsolation,
};
pub use error::{MetabindError, Result};
pub use fingerprint::{Fingerprint, FingerprintPattern};
pub use models::{MetadataSnapshot, Table};
pub use source::{MetadataRow, MetadataSource, SourceError, SourceIdentity};
pub use suppression::{SuppressionRule, SuppressionTable, Suppressions};
pub use verifier::{Violation, ViolationKind, ViolationSeverity, verify};

pub use validation::{
    ValidationError, initialize_schema_validator, validate_and_parse_snapshot,
    validate_snapshot_output,
};
