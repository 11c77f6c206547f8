//! Category-by-category metadata collection.
//!
//! The aggregator walks [`CategoryId::ORDER`] exactly once per run:
//!
//! ```text
//! NotStarted -> Collecting(Catalogs) -> ... -> Collecting(Properties) -> Complete
//! ```
//!
//! For each category it either records a skip (suppressed for the source's
//! fingerprint, the source is not called), binds the returned rows, records
//! an "unsupported" outcome and moves on, or aborts the whole run with
//! [`MetabindError::CategoryFailed`]. Children are linked to parents
//! collected earlier in the same run; children without a parent are kept in
//! the snapshot's unattached bucket.

use crate::binding::{MetadataRecord, bind_row};
use crate::category::CategoryId;
use crate::error::MetabindError;
use crate::fingerprint::Fingerprint;
use crate::models::{
    BestRowIdentifier, Catalog, CategoryReport, CategoryStatus, ClientInfoProperty, Column,
    ColumnPrivilege, DatabaseProperties, ForeignKey, Function, FunctionColumn, IndexInfo,
    MetadataSnapshot, PrimaryKey, Procedure, ProcedureColumn, PseudoColumn, RoutineKey, Schema,
    Table, TableKey, TablePrivilege, TableType, TypeInfo, VersionColumn,
};
use crate::source::{MetadataRow, MetadataSource};
use crate::suppression::{SuppressionTable, Suppressions};
use crate::Result;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

/// Position of a run in the category sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AggregationPhase {
    NotStarted,
    Collecting(CategoryId),
    Complete,
}

impl AggregationPhase {
    /// The only transition: moves to the next category, or to `Complete`.
    pub fn advance(self) -> Self {
        match self {
            AggregationPhase::NotStarted => AggregationPhase::Collecting(CategoryId::ORDER[0]),
            AggregationPhase::Collecting(category) => category
                .next()
                .map_or(AggregationPhase::Complete, AggregationPhase::Collecting),
            AggregationPhase::Complete => AggregationPhase::Complete,
        }
    }

    /// Category being collected, if any.
    pub fn category(self) -> Option<CategoryId> {
        match self {
            AggregationPhase::Collecting(category) => Some(category),
            _ => None,
        }
    }

    /// Checks whether the run has finished.
    pub fn is_complete(self) -> bool {
        self == AggregationPhase::Complete
    }
}

/// Soft outcome recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectionWarning {
    /// The source reported the category as not supported
    CategoryUnsupported { category: CategoryId, reason: String },
    /// A child record whose parent was not found
    UnattachedChild { category: CategoryId, parent: String },
    /// A value that could not be coerced into its declared field
    UnboundValue { category: CategoryId, label: String },
}

impl std::fmt::Display for CollectionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionWarning::CategoryUnsupported { category, reason } => {
                write!(f, "Category {} unsupported: {}", category, reason)
            }
            CollectionWarning::UnattachedChild { category, parent } => {
                write!(f, "Unattached {} record: no parent {}", category, parent)
            }
            CollectionWarning::UnboundValue { category, label } => {
                write!(f, "Value of {} label {} could not be bound", category, label)
            }
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct Collected {
    /// The complete snapshot
    pub snapshot: MetadataSnapshot,
    /// Soft outcomes, in the order they occurred
    pub warnings: Vec<CollectionWarning>,
    /// Suppressions that were applied
    pub suppressions: Suppressions,
}

/// Runs collection against a source with a given suppression table.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    table: SuppressionTable,
    skipped: BTreeSet<CategoryId>,
}

impl Aggregator {
    /// Creates an aggregator using `table` to resolve suppressions.
    pub fn new(table: SuppressionTable) -> Self {
        Self {
            table,
            skipped: BTreeSet::new(),
        }
    }

    /// Additionally skips a category for every source.
    pub fn skip_category(mut self, category: CategoryId) -> Self {
        self.skipped.insert(category);
        self
    }

    /// Suppressions that apply to a fingerprint.
    pub fn suppressions_for(&self, fingerprint: &Fingerprint) -> Suppressions {
        self.skipped
            .iter()
            .fold(self.table.resolve(fingerprint), |acc, category| {
                acc.with_category(*category, "skipped by configuration")
            })
    }

    /// Collects a complete snapshot from `source`.
    ///
    /// The source is borrowed and never closed. Calls are issued one at a
    /// time in category order.
    ///
    /// # Errors
    /// - `Connection` if the source identity cannot be read
    /// - `InvalidFingerprint` if the identity has no product name
    /// - `CategoryFailed` if a category fails with anything but "unsupported";
    ///   the partial snapshot is discarded
    pub async fn collect<S>(&self, source: &S) -> Result<Collected>
    where
        S: MetadataSource + ?Sized,
    {
        let start_time = std::time::Instant::now();

        let identity = source
            .identity()
            .await
            .map_err(MetabindError::connection_failed)?;
        let fingerprint = identity.fingerprint()?;
        let suppressions = self.suppressions_for(&fingerprint);

        tracing::info!("Collecting metadata from {}", fingerprint);
        for category in suppressions.categories() {
            tracing::debug!(
                "Suppressed for this source: {} ({})",
                category,
                suppressions.reason(category).unwrap_or_default()
            );
        }

        let mut run = Run::new(MetadataSnapshot::new(fingerprint), &suppressions);
        let mut phase = AggregationPhase::NotStarted.advance();
        while let Some(category) = phase.category() {
            run.step(source, category).await?;
            phase = phase.advance();
        }

        let Run {
            mut snapshot,
            warnings,
            ..
        } = run;
        snapshot.collection_metadata.collection_duration_ms =
            u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        for warning in &warnings {
            snapshot.add_warning(warning.to_string());
        }

        tracing::info!(
            "Metadata collection completed in {:.2}s - {} tables, {} functions, {} procedures, {} warnings",
            start_time.elapsed().as_secs_f64(),
            snapshot.tables.len(),
            snapshot.functions.len(),
            snapshot.procedures.len(),
            warnings.len()
        );

        Ok(Collected {
            snapshot,
            warnings,
            suppressions,
        })
    }
}

/// Collects with the built-in suppression table.
///
/// # Errors
/// See [`Aggregator::collect`].
pub async fn collect<S>(source: &S) -> Result<Collected>
where
    S: MetadataSource + ?Sized,
{
    Aggregator::new(SuppressionTable::builtin()?)
        .collect(source)
        .await
}

/// State of one run.
struct Run<'a> {
    snapshot: MetadataSnapshot,
    warnings: Vec<CollectionWarning>,
    suppressions: &'a Suppressions,
    table_index: HashMap<TableKey, usize>,
}

impl<'a> Run<'a> {
    fn new(snapshot: MetadataSnapshot, suppressions: &'a Suppressions) -> Self {
        Self {
            snapshot,
            warnings: Vec::new(),
            suppressions,
            table_index: HashMap::new(),
        }
    }

    fn report(&mut self, category: CategoryId, status: CategoryStatus) {
        self.snapshot.reports.push(CategoryReport { category, status });
    }

    async fn step<S>(&mut self, source: &S, category: CategoryId) -> Result<()>
    where
        S: MetadataSource + ?Sized,
    {
        if self.suppressions.is_category_suppressed(category) {
            let reason = self
                .suppressions
                .reason(category)
                .unwrap_or("suppressed")
                .to_string();
            tracing::info!("Skipping {}: {}", category, reason);
            self.report(category, CategoryStatus::Skipped { reason });
            return Ok(());
        }

        tracing::debug!("Collecting {}", category);
        match source.fetch(category).await {
            Ok(rows) => {
                let records = rows.len();
                self.absorb(category, rows);
                tracing::debug!("Collected {} {} rows", records, category);
                self.report(category, CategoryStatus::Collected { records });
                Ok(())
            }
            Err(e) if e.is_unsupported() => {
                let reason = e.to_string();
                tracing::warn!("Category {} unsupported: {}", category, reason);
                self.warnings.push(CollectionWarning::CategoryUnsupported {
                    category,
                    reason: reason.clone(),
                });
                self.report(category, CategoryStatus::Unsupported { reason });
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to collect {}: {}", category, e);
                Err(MetabindError::category_failed(category, e))
            }
        }
    }

    fn bind_all<R: MetadataRecord>(&mut self, rows: Vec<MetadataRow>) -> Vec<R> {
        let suppressed = self.suppressions.fields(R::CATEGORY);
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let bound = bind_row::<R>(row, suppressed);
            for label in bound.unbound {
                tracing::warn!("Could not bind {} value for label {}", R::CATEGORY, label);
                self.warnings.push(CollectionWarning::UnboundValue {
                    category: R::CATEGORY,
                    label,
                });
            }
            records.push(bound.record);
        }
        records
    }

    fn absorb(&mut self, category: CategoryId, rows: Vec<MetadataRow>) {
        match category {
            CategoryId::Catalogs => self.snapshot.catalogs = self.bind_all::<Catalog>(rows),
            CategoryId::Schemas => self.snapshot.schemas = self.bind_all::<Schema>(rows),
            CategoryId::TableTypes => {
                self.snapshot.table_types = self.bind_all::<TableType>(rows);
            }
            CategoryId::Tables => {
                let tables = self.bind_all::<Table>(rows);
                self.table_index.clear();
                for (position, table) in tables.iter().enumerate() {
                    self.table_index.entry(table.key()).or_insert(position);
                }
                self.snapshot.tables = tables;
            }
            CategoryId::Columns => {
                let records = self.bind_all::<Column>(rows);
                let index = &self.table_index;
                attach_children(
                    &mut self.snapshot.tables,
                    records,
                    |column: &Column| locate_table(index, column.table_key()),
                    |table: &mut Table| &mut table.columns,
                    &mut self.snapshot.unattached.columns,
                    &mut self.warnings,
                );
            }
            CategoryId::ColumnPrivileges => {
                let records = self.bind_all::<ColumnPrivilege>(rows);
                let index = &self.table_index;
                attach_children(
                    &mut self.snapshot.tables,
                    records,
                    |privilege: &ColumnPrivilege| locate_table(index, privilege.table_key()),
                    |table: &mut Table| &mut table.column_privileges,
                    &mut self.snapshot.unattached.column_privileges,
                    &mut self.warnings,
                );
            }
            CategoryId::PrimaryKeys => {
                let records = self.bind_all::<PrimaryKey>(rows);
                let index = &self.table_index;
                attach_children(
                    &mut self.snapshot.tables,
                    records,
                    |key: &PrimaryKey| locate_table(index, key.table_key()),
                    |table: &mut Table| &mut table.primary_keys,
                    &mut self.snapshot.unattached.primary_keys,
                    &mut self.warnings,
                );
            }
            CategoryId::ForeignKeys => {
                let records = self.bind_all::<ForeignKey>(rows);
                let index = &self.table_index;
                attach_children(
                    &mut self.snapshot.tables,
                    records,
                    |key: &ForeignKey| locate_table(index, key.table_key()),
                    |table: &mut Table| &mut table.foreign_keys,
                    &mut self.snapshot.unattached.foreign_keys,
                    &mut self.warnings,
                );
            }
            CategoryId::Indices => {
                let records = self.bind_all::<IndexInfo>(rows);
                let index = &self.table_index;
                attach_children(
                    &mut self.snapshot.tables,
                    records,
                    |info: &IndexInfo| locate_table(index, info.table_key()),
                    |table: &mut Table| &mut table.indices,
                    &mut self.snapshot.unattached.indices,
                    &mut self.warnings,
                );
            }
            CategoryId::Privileges => {
                let records = self.bind_all::<TablePrivilege>(rows);
                let index = &self.table_index;
                attach_children(
                    &mut self.snapshot.tables,
                    records,
                    |privilege: &TablePrivilege| locate_table(index, privilege.table_key()),
                    |table: &mut Table| &mut table.privileges,
                    &mut self.snapshot.unattached.privileges,
                    &mut self.warnings,
                );
            }
            CategoryId::BestRowIdentifiers => {
                let records = self.bind_all::<BestRowIdentifier>(rows);
                let index = &self.table_index;
                attach_children(
                    &mut self.snapshot.tables,
                    records,
                    |identifier: &BestRowIdentifier| locate_table(index, identifier.table_key()),
                    |table: &mut Table| &mut table.best_row_identifiers,
                    &mut self.snapshot.unattached.best_row_identifiers,
                    &mut self.warnings,
                );
            }
            CategoryId::VersionColumns => {
                let records = self.bind_all::<VersionColumn>(rows);
                let index = &self.table_index;
                attach_children(
                    &mut self.snapshot.tables,
                    records,
                    |column: &VersionColumn| locate_table(index, column.table_key()),
                    |table: &mut Table| &mut table.version_columns,
                    &mut self.snapshot.unattached.version_columns,
                    &mut self.warnings,
                );
            }
            CategoryId::PseudoColumns => {
                let records = self.bind_all::<PseudoColumn>(rows);
                let index = &self.table_index;
                attach_children(
                    &mut self.snapshot.tables,
                    records,
                    |column: &PseudoColumn| locate_table(index, column.table_key()),
                    |table: &mut Table| &mut table.pseudo_columns,
                    &mut self.snapshot.unattached.pseudo_columns,
                    &mut self.warnings,
                );
            }
            CategoryId::Functions => self.snapshot.functions = self.bind_all::<Function>(rows),
            CategoryId::FunctionColumns => {
                let records = self.bind_all::<FunctionColumn>(rows);
                let keys: Vec<RoutineKey> =
                    self.snapshot.functions.iter().map(Function::key).collect();
                attach_children(
                    &mut self.snapshot.functions,
                    records,
                    |column: &FunctionColumn| locate_routine(&keys, column.function_key()),
                    |function: &mut Function| &mut function.columns,
                    &mut self.snapshot.unattached.function_columns,
                    &mut self.warnings,
                );
            }
            CategoryId::Procedures => {
                self.snapshot.procedures = self.bind_all::<Procedure>(rows);
            }
            CategoryId::ProcedureColumns => {
                let records = self.bind_all::<ProcedureColumn>(rows);
                let keys: Vec<RoutineKey> =
                    self.snapshot.procedures.iter().map(Procedure::key).collect();
                attach_children(
                    &mut self.snapshot.procedures,
                    records,
                    |column: &ProcedureColumn| locate_routine(&keys, column.procedure_key()),
                    |procedure: &mut Procedure| &mut procedure.columns,
                    &mut self.snapshot.unattached.procedure_columns,
                    &mut self.warnings,
                );
            }
            CategoryId::TypeInfo => self.snapshot.type_info = self.bind_all::<TypeInfo>(rows),
            CategoryId::ClientInfoProperties => {
                self.snapshot.client_info_properties = self.bind_all::<ClientInfoProperty>(rows);
            }
            CategoryId::Properties => {
                let mut records = self.bind_all::<DatabaseProperties>(rows).into_iter();
                self.snapshot.properties = records.next();
                let extra = records.count();
                if extra > 0 {
                    tracing::warn!("Ignoring {} extra properties rows", extra);
                }
            }
        }
    }
}

fn locate_table(index: &HashMap<TableKey, usize>, key: TableKey) -> (TableKey, Option<usize>) {
    let position = index.get(&key).copied();
    (key, position)
}

/// Exact key first, then a unique match on catalog, schema and name.
fn locate_routine(keys: &[RoutineKey], key: RoutineKey) -> (RoutineKey, Option<usize>) {
    let position = keys.iter().position(|candidate| *candidate == key).or_else(|| {
        let mut same_name = keys
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.same_name(&key));
        match (same_name.next(), same_name.next()) {
            (Some((position, _)), None) => Some(position),
            _ => None,
        }
    });
    (key, position)
}

fn attach_children<P, R, K>(
    parents: &mut [P],
    records: Vec<R>,
    locate: impl Fn(&R) -> (K, Option<usize>),
    slot: fn(&mut P) -> &mut Vec<R>,
    orphans: &mut Vec<R>,
    warnings: &mut Vec<CollectionWarning>,
) where
    R: MetadataRecord,
    K: Display,
{
    for record in records {
        let (key, position) = locate(&record);
        match position.and_then(|position| parents.get_mut(position)) {
            Some(parent) => slot(parent).push(record),
            None => {
                tracing::warn!("No parent {} for {} record", key, R::CATEGORY);
                warnings.push(CollectionWarning::UnattachedChild {
                    category: R::CATEGORY,
                    parent: key.to_string(),
                });
                orphans.push(record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ScriptedSource, SourceIdentity};
    use serde_json::json;

    fn identity() -> SourceIdentity {
        SourceIdentity::new("ExampleDB", "5.0").with_driver("exdb", "1.2")
    }

    #[test]
    fn test_phase_walks_every_category_once() {
        let mut phase = AggregationPhase::NotStarted;
        let mut visited = Vec::new();
        loop {
            phase = phase.advance();
            match phase.category() {
                Some(category) => visited.push(category),
                None => break,
            }
        }
        assert!(phase.is_complete());
        assert_eq!(visited, CategoryId::ORDER.to_vec());
        assert_eq!(phase.advance(), AggregationPhase::Complete);
    }

    #[tokio::test]
    async fn test_children_attach_to_parents() {
        let source = ScriptedSource::new(identity())
            .with_rows(
                CategoryId::Tables,
                [
                    json!({"TABLE_SCHEM": "app", "TABLE_NAME": "orders"}),
                    json!({"TABLE_SCHEM": "app", "TABLE_NAME": "users"}),
                ],
            )
            .with_rows(
                CategoryId::Columns,
                [
                    json!({"TABLE_SCHEM": "app", "TABLE_NAME": "orders", "COLUMN_NAME": "id"}),
                    json!({"TABLE_SCHEM": "app", "TABLE_NAME": "users", "COLUMN_NAME": "id"}),
                    json!({"TABLE_SCHEM": "app", "TABLE_NAME": "users", "COLUMN_NAME": "name"}),
                ],
            )
            .with_rows(
                CategoryId::ForeignKeys,
                [json!({
                    "PKTABLE_SCHEM": "app", "PKTABLE_NAME": "users",
                    "FKTABLE_SCHEM": "app", "FKTABLE_NAME": "orders",
                    "FKCOLUMN_NAME": "user_id", "KEY_SEQ": 1
                })],
            );

        let collected = Aggregator::default().collect(&source).await.unwrap();
        let snapshot = &collected.snapshot;

        assert_eq!(snapshot.tables[0].columns.len(), 1);
        assert_eq!(snapshot.tables[1].columns.len(), 2);
        assert_eq!(snapshot.tables[0].foreign_keys.len(), 1);
        assert!(snapshot.unattached.is_empty());
        assert!(collected.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_table_scoped_categories_attach_to_tables() {
        let source = ScriptedSource::new(identity())
            .with_rows(
                CategoryId::TableTypes,
                [json!({"TABLE_TYPE": "TABLE"}), json!({"TABLE_TYPE": "VIEW"})],
            )
            .with_rows(
                CategoryId::Tables,
                [json!({"TABLE_SCHEM": "app", "TABLE_NAME": "users", "TABLE_TYPE": "TABLE"})],
            )
            .with_rows(
                CategoryId::ColumnPrivileges,
                [json!({
                    "TABLE_SCHEM": "app", "TABLE_NAME": "users", "COLUMN_NAME": "email",
                    "GRANTEE": "report", "PRIVILEGE": "SELECT", "IS_GRANTABLE": "NO"
                })],
            )
            .with_rows(
                CategoryId::BestRowIdentifiers,
                [json!({
                    "TABLE_SCHEM": "app", "TABLE_NAME": "users",
                    "SCOPE": 2, "COLUMN_NAME": "id", "DATA_TYPE": 4, "PSEUDO_COLUMN": 1
                })],
            )
            .with_rows(
                CategoryId::VersionColumns,
                [json!({
                    "TABLE_SCHEM": "app", "TABLE_NAME": "users",
                    "COLUMN_NAME": "updated_at", "PSEUDO_COLUMN": "1"
                })],
            )
            .with_rows(
                CategoryId::PseudoColumns,
                [
                    json!({
                        "TABLE_SCHEM": "app", "TABLE_NAME": "users",
                        "COLUMN_NAME": "rowid", "COLUMN_USAGE": "NO_USAGE_RESTRICTIONS"
                    }),
                    json!({"TABLE_SCHEM": "app", "TABLE_NAME": "audit", "COLUMN_NAME": "rowid"}),
                ],
            )
            .with_rows(
                CategoryId::ClientInfoProperties,
                [json!({
                    "NAME": "ApplicationName", "MAX_LEN": 64,
                    "DESCRIPTION": "Client application"
                })],
            );

        let collected = Aggregator::default().collect(&source).await.unwrap();
        let snapshot = &collected.snapshot;
        let users = &snapshot.tables[0];

        assert_eq!(snapshot.table_types.len(), 2);
        assert_eq!(snapshot.table_types[1].table_type.as_deref(), Some("VIEW"));
        assert_eq!(users.column_privileges[0].grantee.as_deref(), Some("report"));
        assert_eq!(
            users.best_row_identifiers[0].best_row_scope().unwrap(),
            Some(crate::constants::BestRowScope::Session)
        );
        assert_eq!(users.version_columns[0].pseudo_column, Some(1));
        assert_eq!(users.pseudo_columns.len(), 1);
        assert_eq!(snapshot.unattached.pseudo_columns.len(), 1);
        assert_eq!(snapshot.client_info_properties[0].max_len, Some(64));
        assert_eq!(
            collected.warnings,
            vec![CollectionWarning::UnattachedChild {
                category: CategoryId::PseudoColumns,
                parent: "app.audit".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_routine_columns_fall_back_to_unique_name() {
        let source = ScriptedSource::new(identity())
            .with_rows(
                CategoryId::Functions,
                [
                    json!({"FUNCTION_NAME": "f", "SPECIFIC_NAME": "f_1"}),
                    json!({"FUNCTION_NAME": "g", "SPECIFIC_NAME": "g_1"}),
                    json!({"FUNCTION_NAME": "g", "SPECIFIC_NAME": "g_2"}),
                ],
            )
            .with_rows(
                CategoryId::FunctionColumns,
                [
                    json!({"FUNCTION_NAME": "f", "COLUMN_NAME": "x"}),
                    json!({"FUNCTION_NAME": "g", "SPECIFIC_NAME": "g_2", "COLUMN_NAME": "y"}),
                    json!({"FUNCTION_NAME": "g", "COLUMN_NAME": "z"}),
                ],
            );

        let collected = Aggregator::default().collect(&source).await.unwrap();
        let functions = &collected.snapshot.functions;

        assert_eq!(functions[0].columns.len(), 1);
        assert_eq!(functions[1].columns.len(), 0);
        assert_eq!(functions[2].columns.len(), 1);
        // "g" is ambiguous without a specific name
        assert_eq!(collected.snapshot.unattached.function_columns.len(), 1);
        assert_eq!(
            collected.warnings,
            vec![CollectionWarning::UnattachedChild {
                category: CategoryId::FunctionColumns,
                parent: "g".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_unsupported_is_soft_and_failure_is_fatal() {
        let source = ScriptedSource::new(identity()).unsupported(CategoryId::Privileges);
        let collected = Aggregator::default().collect(&source).await.unwrap();
        assert!(matches!(
            collected.snapshot.report(CategoryId::Privileges).unwrap().status,
            CategoryStatus::Unsupported { .. }
        ));
        assert_eq!(collected.snapshot.reports.len(), CategoryId::ORDER.len());
        assert_eq!(collected.snapshot.collection_metadata.warnings.len(), 1);

        let source = ScriptedSource::new(identity()).failing(CategoryId::Indices, "boom");
        let err = Aggregator::default().collect(&source).await.unwrap_err();
        assert_eq!(err.failed_category(), Some(CategoryId::Indices));
        // Nothing after the failed category is attempted
        assert!(!source.was_queried(CategoryId::Privileges));
    }

    #[tokio::test]
    async fn test_field_suppression_and_config_skip() {
        let table = SuppressionTable::from_rules(vec![
            crate::suppression::SuppressionRule::new(
                crate::fingerprint::FingerprintPattern::product("ExampleDB"),
            )
            .suppress_field(CategoryId::Tables, "remarks"),
        ])
        .unwrap();
        let source = ScriptedSource::new(identity()).with_rows(
            CategoryId::Tables,
            [json!({"TABLE_NAME": "T1", "REMARKS": "wrong"})],
        );

        let collected = Aggregator::new(table)
            .skip_category(CategoryId::TypeInfo)
            .collect(&source)
            .await
            .unwrap();

        let table = &collected.snapshot.tables[0];
        assert_eq!(table.remarks, None);
        assert!(table.unknown.is_empty());
        assert!(!source.was_queried(CategoryId::TypeInfo));
        assert_eq!(
            collected.snapshot.report(CategoryId::TypeInfo).unwrap().status,
            CategoryStatus::Skipped {
                reason: "skipped by configuration".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unbound_values_are_warned() {
        let source = ScriptedSource::new(identity()).with_rows(
            CategoryId::TypeInfo,
            [json!({"TYPE_NAME": "INT", "DATA_TYPE": "integer"})],
        );
        let collected = Aggregator::default().collect(&source).await.unwrap();

        assert_eq!(collected.snapshot.type_info[0].data_type, None);
        assert_eq!(
            collected.warnings,
            vec![CollectionWarning::UnboundValue {
                category: CategoryId::TypeInfo,
                label: "DATA_TYPE".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_invalid_identity_aborts_before_collection() {
        let source = ScriptedSource::new(SourceIdentity::new("  ", "1.0"));
        let err = Aggregator::default().collect(&source).await.unwrap_err();
        assert!(matches!(err, MetabindError::InvalidFingerprint { .. }));
        assert!(source.calls().is_empty());
    }
}
