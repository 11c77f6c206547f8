//! Metadata categories and their fixed collection order.
//!
//! A category is one kind of metadata and corresponds to exactly one
//! introspection call against the source. Categories are collected in
//! [`CategoryId::ORDER`]; children always come after their parents so that
//! parent linking can rely on parents being present already.

use crate::binding::MetadataRecord;
use crate::models::{
    BestRowIdentifier, Catalog, ClientInfoProperty, Column, ColumnPrivilege, DatabaseProperties,
    ForeignKey, Function, FunctionColumn, IndexInfo, PrimaryKey, Procedure, ProcedureColumn,
    PseudoColumn, Schema, Table, TablePrivilege, TableType, TypeInfo, VersionColumn,
};
use serde::{Deserialize, Serialize};

/// One distinct kind of metadata collected by the aggregator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CategoryId {
    Catalogs,
    Schemas,
    TableTypes,
    Tables,
    Columns,
    ColumnPrivileges,
    PrimaryKeys,
    ForeignKeys,
    Indices,
    Privileges,
    BestRowIdentifiers,
    VersionColumns,
    PseudoColumns,
    Functions,
    FunctionColumns,
    Procedures,
    ProcedureColumns,
    TypeInfo,
    ClientInfoProperties,
    Properties,
}

impl CategoryId {
    /// Fixed dependency order in which categories are collected.
    pub const ORDER: [CategoryId; 20] = [
        CategoryId::Catalogs,
        CategoryId::Schemas,
        CategoryId::TableTypes,
        CategoryId::Tables,
        CategoryId::Columns,
        CategoryId::ColumnPrivileges,
        CategoryId::PrimaryKeys,
        CategoryId::ForeignKeys,
        CategoryId::Indices,
        CategoryId::Privileges,
        CategoryId::BestRowIdentifiers,
        CategoryId::VersionColumns,
        CategoryId::PseudoColumns,
        CategoryId::Functions,
        CategoryId::FunctionColumns,
        CategoryId::Procedures,
        CategoryId::ProcedureColumns,
        CategoryId::TypeInfo,
        CategoryId::ClientInfoProperties,
        CategoryId::Properties,
    ];

    /// Stable snake_case name, as used in suppression sources and output.
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryId::Catalogs => "catalogs",
            CategoryId::Schemas => "schemas",
            CategoryId::TableTypes => "table_types",
            CategoryId::Tables => "tables",
            CategoryId::Columns => "columns",
            CategoryId::ColumnPrivileges => "column_privileges",
            CategoryId::PrimaryKeys => "primary_keys",
            CategoryId::ForeignKeys => "foreign_keys",
            CategoryId::Indices => "indices",
            CategoryId::Privileges => "privileges",
            CategoryId::BestRowIdentifiers => "best_row_identifiers",
            CategoryId::VersionColumns => "version_columns",
            CategoryId::PseudoColumns => "pseudo_columns",
            CategoryId::Functions => "functions",
            CategoryId::FunctionColumns => "function_columns",
            CategoryId::Procedures => "procedures",
            CategoryId::ProcedureColumns => "procedure_columns",
            CategoryId::TypeInfo => "type_info",
            CategoryId::ClientInfoProperties => "client_info_properties",
            CategoryId::Properties => "properties",
        }
    }

    /// Position of this category in [`CategoryId::ORDER`].
    pub fn position(self) -> usize {
        Self::ORDER
            .iter()
            .position(|candidate| *candidate == self)
            .unwrap_or(Self::ORDER.len())
    }

    /// The category collected right after this one, if any.
    pub fn next(self) -> Option<CategoryId> {
        Self::ORDER.get(self.position().saturating_add(1)).copied()
    }

    /// Parent category whose records own records of this category.
    pub fn parent(self) -> Option<CategoryId> {
        match self {
            CategoryId::Columns
            | CategoryId::ColumnPrivileges
            | CategoryId::PrimaryKeys
            | CategoryId::ForeignKeys
            | CategoryId::Indices
            | CategoryId::Privileges
            | CategoryId::BestRowIdentifiers
            | CategoryId::VersionColumns
            | CategoryId::PseudoColumns => Some(CategoryId::Tables),
            CategoryId::FunctionColumns => Some(CategoryId::Functions),
            CategoryId::ProcedureColumns => Some(CategoryId::Procedures),
            _ => None,
        }
    }

    /// Declared, ordered field names of the record type bound for this category.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            CategoryId::Catalogs => Catalog::FIELDS,
            CategoryId::Schemas => Schema::FIELDS,
            CategoryId::TableTypes => TableType::FIELDS,
            CategoryId::Tables => Table::FIELDS,
            CategoryId::Columns => Column::FIELDS,
            CategoryId::ColumnPrivileges => ColumnPrivilege::FIELDS,
            CategoryId::PrimaryKeys => PrimaryKey::FIELDS,
            CategoryId::ForeignKeys => ForeignKey::FIELDS,
            CategoryId::Indices => IndexInfo::FIELDS,
            CategoryId::Privileges => TablePrivilege::FIELDS,
            CategoryId::BestRowIdentifiers => BestRowIdentifier::FIELDS,
            CategoryId::VersionColumns => VersionColumn::FIELDS,
            CategoryId::PseudoColumns => PseudoColumn::FIELDS,
            CategoryId::Functions => Function::FIELDS,
            CategoryId::FunctionColumns => FunctionColumn::FIELDS,
            CategoryId::Procedures => Procedure::FIELDS,
            CategoryId::ProcedureColumns => ProcedureColumn::FIELDS,
            CategoryId::TypeInfo => TypeInfo::FIELDS,
            CategoryId::ClientInfoProperties => ClientInfoProperty::FIELDS,
            CategoryId::Properties => DatabaseProperties::FIELDS,
        }
    }

    /// Checks whether `field` is a declared field of this category's record.
    pub fn has_field(self, field: &str) -> bool {
        self.fields().contains(&field)
    }
}

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CategoryId {
    type Err = crate::error::MetabindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .iter()
            .copied()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| {
                crate::error::MetabindError::configuration(format!("Unknown category '{}'", s))
            })
    }
}
