//! Structural consistency checks over a finished snapshot.

use crate::category::CategoryId;
use crate::models::{CategoryStatus, MetadataSnapshot, TableKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How serious a violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Warning,
    Error,
}

/// Kind of structural inconsistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A child record kept in the unattached bucket
    UnattachedChild,
    /// A reference to a table or schema missing from the snapshot
    DanglingReference,
    /// A skipped or unsupported category that still holds records
    InconsistentSkip,
    /// A category without exactly one report
    MissingReport,
}

impl ViolationKind {
    /// Default severity of this kind.
    pub fn severity(self) -> ViolationSeverity {
        match self {
            ViolationKind::UnattachedChild => ViolationSeverity::Warning,
            ViolationKind::DanglingReference
            | ViolationKind::InconsistentSkip
            | ViolationKind::MissingReport => ViolationSeverity::Error,
        }
    }
}

/// One finding of [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: ViolationSeverity,
    pub category: CategoryId,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, category: CategoryId, message: String) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            category,
            message,
        }
    }

    /// Checks whether this violation is an error.
    pub fn is_error(&self) -> bool {
        self.severity == ViolationSeverity::Error
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            ViolationSeverity::Warning => "warning",
            ViolationSeverity::Error => "error",
        };
        write!(f, "[{}] {}: {}", severity, self.category, self.message)
    }
}

/// Checks a snapshot for structural consistency.
///
/// Returns an empty list for a healthy snapshot. Violations are ordered by
/// check, then by category order.
pub fn verify(snapshot: &MetadataSnapshot) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_reports(snapshot, &mut violations);
    check_unattached(snapshot, &mut violations);
    check_foreign_keys(snapshot, &mut violations);
    check_table_schemas(snapshot, &mut violations);
    check_skips(snapshot, &mut violations);

    if violations.is_empty() {
        tracing::debug!("Snapshot of {} verified clean", snapshot.fingerprint);
    } else {
        tracing::debug!(
            "Snapshot of {} has {} violations",
            snapshot.fingerprint,
            violations.len()
        );
    }
    violations
}

fn check_reports(snapshot: &MetadataSnapshot, violations: &mut Vec<Violation>) {
    for category in CategoryId::ORDER {
        let reports = snapshot
            .reports
            .iter()
            .filter(|report| report.category == category)
            .count();
        if reports != 1 {
            violations.push(Violation::new(
                ViolationKind::MissingReport,
                category,
                format!("expected exactly one report, found {}", reports),
            ));
        }
    }
}

fn check_unattached(snapshot: &MetadataSnapshot, violations: &mut Vec<Violation>) {
    let unattached = &snapshot.unattached;
    let mut push = |category: CategoryId, parent: String| {
        violations.push(Violation::new(
            ViolationKind::UnattachedChild,
            category,
            format!("record has no parent {}", parent),
        ));
    };

    for column in &unattached.columns {
        push(CategoryId::Columns, column.table_key().to_string());
    }
    for privilege in &unattached.column_privileges {
        push(CategoryId::ColumnPrivileges, privilege.table_key().to_string());
    }
    for key in &unattached.primary_keys {
        push(CategoryId::PrimaryKeys, key.table_key().to_string());
    }
    for key in &unattached.foreign_keys {
        push(CategoryId::ForeignKeys, key.table_key().to_string());
    }
    for index in &unattached.indices {
        push(CategoryId::Indices, index.table_key().to_string());
    }
    for privilege in &unattached.privileges {
        push(CategoryId::Privileges, privilege.table_key().to_string());
    }
    for identifier in &unattached.best_row_identifiers {
        push(CategoryId::BestRowIdentifiers, identifier.table_key().to_string());
    }
    for column in &unattached.version_columns {
        push(CategoryId::VersionColumns, column.table_key().to_string());
    }
    for column in &unattached.pseudo_columns {
        push(CategoryId::PseudoColumns, column.table_key().to_string());
    }
    for column in &unattached.function_columns {
        push(CategoryId::FunctionColumns, column.function_key().to_string());
    }
    for column in &unattached.procedure_columns {
        push(CategoryId::ProcedureColumns, column.procedure_key().to_string());
    }
}

fn was_collected(snapshot: &MetadataSnapshot, category: CategoryId) -> bool {
    snapshot
        .report(category)
        .is_some_and(|report| matches!(report.status, CategoryStatus::Collected { .. }))
}

fn check_foreign_keys(snapshot: &MetadataSnapshot, violations: &mut Vec<Violation>) {
    if !was_collected(snapshot, CategoryId::Tables) {
        return;
    }

    let tables: HashSet<TableKey> = snapshot.tables.iter().map(|table| table.key()).collect();
    for key in snapshot.foreign_keys() {
        let referenced = key.referenced_table_key();
        if !tables.contains(&referenced) {
            violations.push(Violation::new(
                ViolationKind::DanglingReference,
                CategoryId::ForeignKeys,
                format!(
                    "foreign key {} on {} references missing table {}",
                    key.fk_name.as_deref().unwrap_or("<unnamed>"),
                    key.table_key(),
                    referenced
                ),
            ));
        }
    }
}

fn check_table_schemas(snapshot: &MetadataSnapshot, violations: &mut Vec<Violation>) {
    if !was_collected(snapshot, CategoryId::Schemas) || snapshot.schemas.is_empty() {
        return;
    }

    let schemas: Vec<(String, String)> = snapshot.schemas.iter().map(|schema| schema.key()).collect();
    for table in &snapshot.tables {
        let Some(schema) = table.table_schem.as_deref().filter(|s| !s.is_empty()) else {
            continue;
        };
        let catalog = table.table_cat.as_deref().unwrap_or_default();
        // Schemas without a catalog match tables in any catalog
        let resolved = schemas.iter().any(|(schema_catalog, schema_name)| {
            schema_name == schema && (schema_catalog.is_empty() || schema_catalog == catalog)
        });
        if !resolved {
            violations.push(Violation::new(
                ViolationKind::DanglingReference,
                CategoryId::Tables,
                format!("table {} references missing schema {}", table.key(), schema),
            ));
        }
    }
}

fn check_skips(snapshot: &MetadataSnapshot, violations: &mut Vec<Violation>) {
    for report in snapshot.reports.iter().filter(|report| report.is_absent()) {
        let records = snapshot.record_count(report.category)
            + snapshot.unattached.count(report.category);
        if records > 0 {
            violations.push(Violation::new(
                ViolationKind::InconsistentSkip,
                report.category,
                format!("category was not collected but holds {} records", records),
            ));
        }
    }
}
