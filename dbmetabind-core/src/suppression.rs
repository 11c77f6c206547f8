//! Per-vendor suppression rules keyed by fingerprint patterns.
//!
//! A suppression table is an ordered list of rules. Each rule names a
//! [`FingerprintPattern`] and the categories (skipped entirely) and fields
//! (left unset) to suppress for sources matching it. Rules are loaded once
//! and never change afterwards.
//!
//! Resolution is a union over every matching rule, so suppression is
//! monotonic: adding a rule can only suppress more.
//!
//! # Source Format
//! ```json
//! {
//!   "version": 1,
//!   "rules": [
//!     {
//!       "pattern": { "product_name": "Mckoi" },
//!       "categories": ["functions"],
//!       "fields": { "properties": ["database_major_version"] },
//!       "reason": "driver rejects the query"
//!     }
//!   ]
//! }
//! ```

use crate::category::CategoryId;
use crate::error::MetabindError;
use crate::fingerprint::{Fingerprint, FingerprintPattern};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const BUILTIN_SUPPRESSIONS: &str = include_str!("../resources/suppressions.json");

static NO_FIELDS: BTreeSet<String> = BTreeSet::new();

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTable {
    #[serde(default)]
    #[allow(dead_code)]
    version: Option<u32>,
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    pattern: FingerprintPattern,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    fields: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    reason: Option<String>,
}

/// One suppression rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuppressionRule {
    /// Fingerprints this rule applies to
    pub pattern: FingerprintPattern,
    /// Categories skipped entirely
    pub categories: BTreeSet<CategoryId>,
    /// Fields left unset, per category
    pub fields: BTreeMap<CategoryId, BTreeSet<String>>,
    /// Free-text justification, used in logs and skip reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SuppressionRule {
    /// Creates a rule that suppresses nothing yet.
    pub fn new(pattern: FingerprintPattern) -> Self {
        Self {
            pattern,
            categories: BTreeSet::new(),
            fields: BTreeMap::new(),
            reason: None,
        }
    }

    /// Adds a suppressed category.
    pub fn suppress_category(mut self, category: CategoryId) -> Self {
        self.categories.insert(category);
        self
    }

    /// Adds a suppressed field.
    pub fn suppress_field(mut self, category: CategoryId, field: impl Into<String>) -> Self {
        self.fields.entry(category).or_default().insert(field.into());
        self
    }

    /// Sets the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    fn same_effect(&self, other: &SuppressionRule) -> bool {
        self.categories == other.categories && self.fields == other.fields
    }

    fn from_raw(raw: RawRule) -> Result<Self> {
        let mut rule = SuppressionRule::new(raw.pattern);
        rule.reason = raw.reason;

        for name in raw.categories {
            rule.categories.insert(parse_category(&name, &rule.pattern)?);
        }

        for (name, fields) in raw.fields {
            let category = parse_category(&name, &rule.pattern)?;
            for field in fields {
                rule = rule.suppress_field(category, field);
            }
        }

        rule.check_fields()?;
        Ok(rule)
    }

    fn check_fields(&self) -> Result<()> {
        for (category, fields) in &self.fields {
            if let Some(unknown) = fields.iter().find(|field| !category.has_field(field)) {
                return Err(MetabindError::malformed_suppressions(format!(
                    "rule for {} names unknown field '{}' of category {}",
                    self.pattern, unknown, category
                )));
            }
        }
        Ok(())
    }
}

fn parse_category(name: &str, pattern: &FingerprintPattern) -> Result<CategoryId> {
    name.parse().map_err(|_| {
        MetabindError::malformed_suppressions(format!(
            "rule for {} names unknown category '{}'",
            pattern, name
        ))
    })
}

/// Ordered, immutable list of suppression rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuppressionTable {
    rules: Vec<SuppressionRule>,
}

impl SuppressionTable {
    /// Creates a table with no rules.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a JSON rule list.
    ///
    /// # Errors
    /// Returns [`MetabindError::MalformedSuppressionSource`] if the document
    /// is not valid JSON of the expected shape, has a rule with an empty
    /// product name, names an unknown category or field, or repeats a pattern
    /// with a different suppression set. Exact duplicates are accepted.
    pub fn load(source: &str) -> Result<Self> {
        let raw: RawTable = serde_json::from_str(source)
            .map_err(|e| MetabindError::malformed_suppressions(e.to_string()))?;

        let rules = raw
            .rules
            .into_iter()
            .map(SuppressionRule::from_raw)
            .collect::<Result<Vec<_>>>()?;

        Self::from_rules(rules)
    }

    /// Builds a table from rules constructed in code.
    ///
    /// # Errors
    /// Same structural checks as [`SuppressionTable::load`], plus an empty
    /// product name. Patterns are normalized first, so an empty version
    /// filter counts as no filter when looking for duplicates.
    pub fn from_rules(rules: Vec<SuppressionRule>) -> Result<Self> {
        let mut accepted: Vec<SuppressionRule> = Vec::with_capacity(rules.len());
        for mut rule in rules {
            rule.pattern = rule.pattern.normalized();
            if rule.pattern.product_name.is_empty() {
                return Err(MetabindError::malformed_suppressions(
                    "rule pattern has an empty product name",
                ));
            }
            rule.check_fields()?;
            match accepted.iter().find(|seen| seen.pattern == rule.pattern) {
                Some(seen) if seen.same_effect(&rule) => {
                    tracing::debug!("Ignoring duplicate suppression rule for {}", rule.pattern);
                }
                Some(_) => {
                    return Err(MetabindError::malformed_suppressions(format!(
                        "pattern {} appears twice with conflicting suppressions",
                        rule.pattern
                    )));
                }
                None => accepted.push(rule),
            }
        }
        Ok(Self { rules: accepted })
    }

    /// Loads the rule set bundled with the library.
    ///
    /// # Errors
    /// Only fails if the bundled resource itself is malformed.
    pub fn builtin() -> Result<Self> {
        Self::load(BUILTIN_SUPPRESSIONS)
    }

    /// Loads a rule file from disk.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, or the errors of
    /// [`SuppressionTable::load`].
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| MetabindError::Io {
            context: format!("Failed to read suppression file {}", path.display()),
            source: e,
        })?;
        Self::load(&source)
    }

    /// Appends the rules of `other` after the rules of `self`.
    ///
    /// # Errors
    /// Fails if the combined list has conflicting duplicate patterns.
    pub fn merge(self, other: SuppressionTable) -> Result<Self> {
        let mut rules = self.rules;
        rules.extend(other.rules);
        Self::from_rules(rules)
    }

    /// All rules, in table order.
    pub fn rules(&self) -> &[SuppressionRule] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Checks whether the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule whose pattern matches `fingerprint`, in table order.
    pub fn rules_for(&self, fingerprint: &Fingerprint) -> Vec<&SuppressionRule> {
        self.rules
            .iter()
            .filter(|rule| rule.pattern.matches(fingerprint))
            .collect()
    }

    /// Union of the suppressions of every matching rule.
    pub fn resolve(&self, fingerprint: &Fingerprint) -> Suppressions {
        self.rules_for(fingerprint)
            .into_iter()
            .fold(Suppressions::default(), |mut acc, rule| {
                acc.absorb(rule);
                acc
            })
    }
}

/// Resolved suppressions for one fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Suppressions {
    categories: BTreeMap<CategoryId, String>,
    fields: BTreeMap<CategoryId, BTreeSet<String>>,
}

impl Suppressions {
    /// Suppresses a category outside any rule (e.g. from the command line).
    pub fn with_category(mut self, category: CategoryId, reason: impl Into<String>) -> Self {
        self.categories.entry(category).or_insert_with(|| reason.into());
        self
    }

    fn absorb(&mut self, rule: &SuppressionRule) {
        let reason = rule
            .reason
            .clone()
            .unwrap_or_else(|| format!("suppressed for {}", rule.pattern));
        for category in &rule.categories {
            self.categories
                .entry(*category)
                .or_insert_with(|| reason.clone());
        }
        for (category, fields) in &rule.fields {
            self.fields
                .entry(*category)
                .or_default()
                .extend(fields.iter().cloned());
        }
    }

    /// Checks whether a category is skipped.
    pub fn is_category_suppressed(&self, category: CategoryId) -> bool {
        self.categories.contains_key(&category)
    }

    /// Reason recorded for a skipped category.
    pub fn reason(&self, category: CategoryId) -> Option<&str> {
        self.categories.get(&category).map(String::as_str)
    }

    /// Suppressed categories, in collection order.
    pub fn categories(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.categories.keys().copied()
    }

    /// Suppressed fields of a category (empty if none).
    pub fn fields(&self, category: CategoryId) -> &BTreeSet<String> {
        self.fields.get(&category).unwrap_or(&NO_FIELDS)
    }

    /// Checks whether a field of a category is left unset.
    pub fn is_field_suppressed(&self, category: CategoryId, field: &str) -> bool {
        self.fields(category).contains(field)
    }

    /// Checks whether nothing is suppressed.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.fields.values().all(BTreeSet::is_empty)
    }
}
