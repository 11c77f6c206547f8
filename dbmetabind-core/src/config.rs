//! Collection run configuration.
//!
//! This module provides the `CollectionConfig` struct that decides which
//! suppressions apply to a run, whether the finished snapshot is verified,
//! and how it is written out.

use crate::aggregator::Aggregator;
use crate::category::CategoryId;
use crate::error::MetabindError;
use crate::suppression::SuppressionTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Output format options for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Standard JSON format (.dbmetabind.json)
    #[default]
    Json,
    /// Compressed JSON format (.dbmetabind.json.zst)
    CompressedJson,
}

impl OutputFormat {
    /// File extension conventionally used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "dbmetabind.json",
            OutputFormat::CompressedJson => "dbmetabind.json.zst",
        }
    }
}

/// Configuration for a metadata collection run.
///
/// # Example
/// ```rust
/// use dbmetabind_core::category::CategoryId;
/// use dbmetabind_core::config::CollectionConfig;
///
/// let config = CollectionConfig::new()
///     .skip_category(CategoryId::Privileges)
///     .with_fail_on_violations(true);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Whether to start from the built-in suppression table
    pub use_builtin_suppressions: bool,
    /// Additional suppression tables merged over the built-in one
    pub suppression_files: Vec<PathBuf>,
    /// Categories skipped for every source
    pub skip_categories: BTreeSet<CategoryId>,
    /// Whether to verify the snapshot after collection
    pub verify: bool,
    /// Whether error-severity violations fail the run
    pub fail_on_violations: bool,
    /// Output format for the snapshot
    pub output_format: OutputFormat,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            use_builtin_suppressions: true,
            suppression_files: Vec::new(),
            skip_categories: BTreeSet::new(),
            verify: true,
            fail_on_violations: false,
            output_format: OutputFormat::Json,
        }
    }
}

impl CollectionConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if a suppression file path is empty, or if violations
    /// are meant to fail the run without verification enabled
    pub fn validate(&self) -> crate::Result<()> {
        if self
            .suppression_files
            .iter()
            .any(|path| path.as_os_str().is_empty())
        {
            return Err(MetabindError::configuration(
                "suppression file paths cannot be empty",
            ));
        }

        if self.fail_on_violations && !self.verify {
            return Err(MetabindError::configuration(
                "fail_on_violations requires verification to be enabled",
            ));
        }

        Ok(())
    }

    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to enable/disable the built-in suppression table.
    pub fn with_builtin_suppressions(mut self, enabled: bool) -> Self {
        self.use_builtin_suppressions = enabled;
        self
    }

    /// Builder method to add a suppression table file.
    pub fn with_suppression_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.suppression_files.push(path.into());
        self
    }

    /// Builder method to skip a category for every source.
    pub fn skip_category(mut self, category: CategoryId) -> Self {
        self.skip_categories.insert(category);
        self
    }

    /// Builder method to enable/disable verification.
    pub fn with_verify(mut self, enabled: bool) -> Self {
        self.verify = enabled;
        self
    }

    /// Builder method to make error violations fail the run.
    pub fn with_fail_on_violations(mut self, enabled: bool) -> Self {
        self.fail_on_violations = enabled;
        self
    }

    /// Builder method to set output format.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Loads the suppression table this configuration describes.
    ///
    /// # Errors
    /// Returns error if a file cannot be read, is malformed, or conflicts
    /// with a rule already loaded
    pub fn suppressions(&self) -> crate::Result<SuppressionTable> {
        let mut table = if self.use_builtin_suppressions {
            SuppressionTable::builtin()?
        } else {
            SuppressionTable::empty()
        };

        for path in &self.suppression_files {
            tracing::debug!("Loading suppressions from {}", path.display());
            table = table.merge(SuppressionTable::from_path(path)?)?;
        }

        tracing::debug!("Loaded {} suppression rules", table.len());
        Ok(table)
    }

    /// Builds the aggregator for this configuration.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the suppressions
    /// cannot be loaded
    pub fn aggregator(&self) -> crate::Result<Aggregator> {
        self.validate()?;
        Ok(self
            .skip_categories
            .iter()
            .fold(Aggregator::new(self.suppressions()?), |aggregator, category| {
                aggregator.skip_category(*category)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_collection_config_default() {
        let config = CollectionConfig::default();
        assert!(config.use_builtin_suppressions);
        assert!(config.suppression_files.is_empty());
        assert!(config.skip_categories.is_empty());
        assert!(config.verify);
        assert!(!config.fail_on_violations);
        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_collection_config_validation() {
        assert!(CollectionConfig::new().validate().is_ok());

        let config = CollectionConfig::new()
            .with_verify(false)
            .with_fail_on_violations(true);
        assert!(config.validate().is_err());

        let config = CollectionConfig::new().with_suppression_file("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_suppressions_merge_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"version": 1, "rules": [{{"pattern": {{"product_name": "ExampleDB"}}, "categories": ["functions"]}}]}}"#
        )
        .unwrap();

        let config = CollectionConfig::new().with_suppression_file(file.path());
        let table = config.suppressions().unwrap();
        let builtin = SuppressionTable::builtin().unwrap();
        assert_eq!(table.len(), builtin.len() + 1);

        let config = config.with_builtin_suppressions(false);
        assert_eq!(config.suppressions().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_suppression_file_fails() {
        let config = CollectionConfig::new().with_suppression_file("/nonexistent/rules.json");
        assert!(matches!(
            config.aggregator().unwrap_err(),
            MetabindError::Io { .. }
        ));
    }

    #[test]
    fn test_output_format() {
        assert_eq!(OutputFormat::default(), OutputFormat::Json);
        assert_eq!(OutputFormat::CompressedJson.extension(), "dbmetabind.json.zst");
    }
}
