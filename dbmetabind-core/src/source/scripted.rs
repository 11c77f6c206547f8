//! Scripted in-memory source.
//!
//! Each category is answered from a script configured up front: a fixed row
//! list, "unsupported", or a failure. Categories without a script answer with
//! no rows. Every `fetch` is recorded so tests can check which categories
//! were queried, and in which order.

use super::{MetadataRow, MetadataSource, SourceError, SourceIdentity, SourceResult};
use crate::category::CategoryId;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Scripted answer for one category.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Answer with these rows
    Rows(Vec<MetadataRow>),
    /// Answer with `SourceError::Unsupported`
    Unsupported,
    /// Answer with `SourceError::Failed` carrying this message
    Failure(String),
}

/// In-memory [`MetadataSource`] driven by per-category scripts.
#[derive(Debug)]
pub struct ScriptedSource {
    identity: SourceIdentity,
    scripts: BTreeMap<CategoryId, Script>,
    calls: Mutex<Vec<CategoryId>>,
}

impl ScriptedSource {
    /// Creates a source reporting `identity` and no rows for any category.
    pub fn new(identity: SourceIdentity) -> Self {
        Self {
            identity,
            scripts: BTreeMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the script for a category, replacing any previous one.
    pub fn with_script(mut self, category: CategoryId, script: Script) -> Self {
        self.scripts.insert(category, script);
        self
    }

    /// Answers `category` with the given JSON objects.
    ///
    /// Values that are not JSON objects are not rows and are dropped.
    pub fn with_rows(self, category: CategoryId, rows: impl IntoIterator<Item = Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(row) => Some(row),
                other => {
                    tracing::warn!("Dropping non-object scripted row for {}: {}", category, other);
                    None
                }
            })
            .collect();
        self.with_script(category, Script::Rows(rows))
    }

    /// Answers `category` with `SourceError::Unsupported`.
    pub fn unsupported(self, category: CategoryId) -> Self {
        self.with_script(category, Script::Unsupported)
    }

    /// Answers `category` with `SourceError::Failed`.
    pub fn failing(self, category: CategoryId, message: impl Into<String>) -> Self {
        self.with_script(category, Script::Failure(message.into()))
    }

    /// Categories fetched so far, in call order.
    pub fn calls(&self) -> Vec<CategoryId> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Checks whether `category` has been fetched.
    pub fn was_queried(&self, category: CategoryId) -> bool {
        self.calls().contains(&category)
    }
}

#[async_trait]
impl MetadataSource for ScriptedSource {
    async fn identity(&self) -> SourceResult<SourceIdentity> {
        Ok(self.identity.clone())
    }

    async fn fetch(&self, category: CategoryId) -> SourceResult<Vec<MetadataRow>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(category);

        match self.scripts.get(&category) {
            None => Ok(Vec::new()),
            Some(Script::Rows(rows)) => Ok(rows.clone()),
            Some(Script::Unsupported) => Err(SourceError::unsupported(category.as_str())),
            Some(Script::Failure(message)) => Err(SourceError::failed(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> ScriptedSource {
        ScriptedSource::new(SourceIdentity::new("ExampleDB", "5.0"))
            .with_rows(CategoryId::Tables, [json!({"TABLE_NAME": "T1"}), json!(42)])
            .unsupported(CategoryId::Privileges)
            .failing(CategoryId::Indices, "index query failed")
    }

    #[tokio::test]
    async fn test_scripts_answer_per_category() {
        let source = source();

        let tables = source.fetch(CategoryId::Tables).await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].get("TABLE_NAME"), Some(&json!("T1")));

        assert!(source.fetch(CategoryId::Columns).await.unwrap().is_empty());
        assert!(
            source
                .fetch(CategoryId::Privileges)
                .await
                .unwrap_err()
                .is_unsupported()
        );
        assert!(
            !source
                .fetch(CategoryId::Indices)
                .await
                .unwrap_err()
                .is_unsupported()
        );
    }

    #[tokio::test]
    async fn test_calls_are_recorded_in_order() {
        let source = source();
        let _ = source.fetch(CategoryId::Columns).await;
        let _ = source.fetch(CategoryId::Tables).await;

        assert_eq!(source.calls(), vec![CategoryId::Columns, CategoryId::Tables]);
        assert!(source.was_queried(CategoryId::Tables));
        assert!(!source.was_queried(CategoryId::Functions));
    }
}
