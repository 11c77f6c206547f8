//! Identity fingerprint of a connected data source.
//!
//! A [`Fingerprint`] is derived once per connection from the product name,
//! product version and (optional) driver version the source reports. It is
//! the key that [`crate::suppression::SuppressionTable`] uses to select
//! vendor quirk rules.

use crate::{Result, error::MetabindError};
use serde::{Deserialize, Serialize};

/// Identity of a connected data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    product_name: String,
    product_version: String,
    driver_version: Option<String>,
}

impl Fingerprint {
    /// Computes a fingerprint from the values a source reports about itself.
    ///
    /// Inputs are trimmed. An empty or whitespace-only driver version is
    /// treated as absent.
    ///
    /// # Errors
    /// Returns [`MetabindError::InvalidFingerprint`] when the product name is
    /// empty after trimming.
    pub fn compute(
        product_name: &str,
        product_version: &str,
        driver_version: Option<&str>,
    ) -> Result<Self> {
        let product_name = product_name.trim();
        if product_name.is_empty() {
            return Err(MetabindError::invalid_fingerprint(
                "product name must not be empty",
            ));
        }

        let driver_version = driver_version
            .map(str::trim)
            .filter(|version| !version.is_empty())
            .map(str::to_string);

        Ok(Self {
            product_name: product_name.to_string(),
            product_version: product_version.trim().to_string(),
            driver_version,
        })
    }

    /// Product name as reported by the source.
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    /// Product version as reported by the source (may be empty).
    pub fn product_version(&self) -> &str {
        &self.product_version
    }

    /// Driver version, when the source reports one.
    pub fn driver_version(&self) -> Option<&str> {
        self.driver_version.as_deref()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.product_name, self.product_version)?;
        if let Some(driver) = &self.driver_version {
            write!(f, " (driver {})", driver)?;
        }
        Ok(())
    }
}

/// Pattern selecting the fingerprints a suppression rule applies to.
///
/// The product name must match exactly (case-sensitive). Both versions are
/// optional prefix filters; an absent or empty filter matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerprintPattern {
    /// Exact product name
    pub product_name: String,
    /// Prefix the product version must start with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_version: Option<String>,
    /// Prefix the driver version must start with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_version: Option<String>,
}

impl FingerprintPattern {
    /// Creates a pattern matching every version of a product.
    pub fn product(product_name: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            product_version: None,
            driver_version: None,
        }
    }

    /// Restricts the pattern to product versions starting with `prefix`.
    pub fn with_product_version(mut self, prefix: impl Into<String>) -> Self {
        self.product_version = Some(prefix.into());
        self
    }

    /// Restricts the pattern to driver versions starting with `prefix`.
    pub fn with_driver_version(mut self, prefix: impl Into<String>) -> Self {
        self.driver_version = Some(prefix.into());
        self
    }

    /// Trims every part and drops empty version filters.
    ///
    /// Fingerprints are trimmed when computed, so two patterns that differ
    /// only in surrounding whitespace or an empty filter select the same
    /// sources.
    pub fn normalized(self) -> Self {
        let filter = |prefix: Option<String>| {
            prefix
                .map(|prefix| prefix.trim().to_string())
                .filter(|prefix| !prefix.is_empty())
        };
        Self {
            product_name: self.product_name.trim().to_string(),
            product_version: filter(self.product_version),
            driver_version: filter(self.driver_version),
        }
    }

    /// Checks whether the fingerprint satisfies this pattern.
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        if self.product_name != fingerprint.product_name {
            return false;
        }

        if let Some(prefix) = &self.product_version
            && !fingerprint.product_version.starts_with(prefix.as_str())
        {
            return false;
        }

        let driver_filter = self.driver_version.as_deref().filter(|prefix| !prefix.is_empty());
        match (driver_filter, &fingerprint.driver_version) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(prefix), Some(driver)) => driver.starts_with(prefix),
        }
    }
}

impl std::fmt::Display for FingerprintPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}*",
            self.product_name,
            self.product_version.as_deref().unwrap_or("")
        )?;
        if let Some(driver) = &self.driver_version {
            write!(f, " (driver {}*)", driver)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> Fingerprint {
        Fingerprint::compute("ExampleDB", "5.0", Some("1.2")).unwrap()
    }

    #[test]
    fn test_compute_trims_inputs() {
        let fp = Fingerprint::compute("  ExampleDB ", " 5.0.1\n", Some(" 1.2 ")).unwrap();
        assert_eq!(fp.product_name(), "ExampleDB");
        assert_eq!(fp.product_version(), "5.0.1");
        assert_eq!(fp.driver_version(), Some("1.2"));
    }

    #[test]
    fn test_compute_rejects_empty_name() {
        for name in ["", "   ", "\t\n"] {
            let result = Fingerprint::compute(name, "1.0", None);
            assert!(matches!(
                result,
                Err(MetabindError::InvalidFingerprint { .. })
            ));
        }
    }

    #[test]
    fn test_blank_driver_version_is_absent() {
        let fp = Fingerprint::compute("SQLite", "3.45.0", Some("  ")).unwrap();
        assert_eq!(fp.driver_version(), None);
    }

    #[test]
    fn test_pattern_without_filters_matches_any_version() {
        let pattern = FingerprintPattern::product("ExampleDB");
        assert!(pattern.matches(&example()));
        assert!(pattern.matches(&Fingerprint::compute("ExampleDB", "", None).unwrap()));
    }

    #[test]
    fn test_pattern_product_name_is_case_sensitive() {
        let pattern = FingerprintPattern::product("exampledb");
        assert!(!pattern.matches(&example()));
    }

    #[test]
    fn test_pattern_version_prefixes() {
        let fp = example();
        assert!(FingerprintPattern::product("ExampleDB")
            .with_product_version("5")
            .matches(&fp));
        assert!(!FingerprintPattern::product("ExampleDB")
            .with_product_version("4")
            .matches(&fp));
        assert!(FingerprintPattern::product("ExampleDB")
            .with_driver_version("1.")
            .matches(&fp));
        assert!(!FingerprintPattern::product("ExampleDB")
            .with_driver_version("2")
            .matches(&fp));
    }

    #[test]
    fn test_driver_filter_requires_driver_version() {
        let fp = Fingerprint::compute("ExampleDB", "5.0", None).unwrap();
        let pattern = FingerprintPattern::product("ExampleDB").with_driver_version("1");
        assert!(!pattern.matches(&fp));

        let empty = FingerprintPattern::product("ExampleDB").with_driver_version("");
        assert!(empty.matches(&fp));
    }

    #[test]
    fn test_normalized_drops_empty_filters() {
        let pattern = FingerprintPattern::product(" ExampleDB ")
            .with_product_version("")
            .with_driver_version(" 1. ")
            .normalized();
        assert_eq!(
            pattern,
            FingerprintPattern::product("ExampleDB").with_driver_version("1.")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(example().to_string(), "ExampleDB/5.0 (driver 1.2)");
        assert_eq!(
            Fingerprint::compute("SQLite", "3.45", None)
                .unwrap()
                .to_string(),
            "SQLite/3.45"
        );
    }
}
