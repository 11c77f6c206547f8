//! Metadata records and the snapshot that owns them.
//!
//! Every record type is a flat value type with a fixed, ordered field list
//! (see [`MetadataRecord::FIELDS`]) generated by `metadata_record!`. Fields
//! are serialized under the lowercase label the source reports them with,
//! in declaration order, so snapshots render deterministically.
//!
//! Ownership is exclusive: tables own their columns, keys, indices,
//! privileges and row identifiers; functions and procedures own their
//! parameter columns. Back references such as a column's `table_name` are
//! lookup keys only.
//!
//! Best-row identifiers and version columns are reported per table and carry
//! no table name of their own. Sources label each such row with the
//! `TABLE_CAT`, `TABLE_SCHEM` and `TABLE_NAME` of the table they asked about.

use crate::binding::{MetadataRecord, RowBinder, UnknownFields};
use crate::category::CategoryId;
use crate::constants::{
    ApiConstant, BestRowScope, ColumnNullability, KeyDeferrability, KeyRule, PseudoColumnKind,
    ResultSetHoldability, TransactionIsolation,
};
use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};

/// Snapshot document format version
pub const FORMAT_VERSION: &str = "1.0";

macro_rules! metadata_record {
    (
        $(#[$meta:meta])*
        $name:ident => $category:ident {
            $($field:ident : $ty:ty = $label:literal,)+
        }
        $(owns {
            $($(#[$child_meta:meta])* $child:ident : $child_ty:ty,)+
        })?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $(
                #[serde(rename = $label, default)]
                pub $field: Option<$ty>,
            )+
            $($(
                $(#[$child_meta])*
                #[serde(default)]
                pub $child: Vec<$child_ty>,
            )+)?
            /// Reported values without a declared field
            #[serde(default, skip_serializing_if = "UnknownFields::is_empty")]
            pub unknown: UnknownFields,
        }

        impl MetadataRecord for $name {
            const CATEGORY: CategoryId = CategoryId::$category;
            const FIELDS: &'static [&'static str] = &[$($label),+];

            fn bind_fields(binder: &mut RowBinder<'_>) -> Self {
                Self {
                    $($field: binder.field::<$ty>($label),)+
                    ..Self::default()
                }
            }

            fn unknown(&self) -> &UnknownFields {
                &self.unknown
            }

            fn set_unknown(&mut self, unknown: UnknownFields) {
                self.unknown = unknown;
            }
        }
    };
}

metadata_record! {
    /// A catalog name.
    Catalog => Catalogs {
        table_cat: String = "table_cat",
    }
}

metadata_record! {
    /// A schema, optionally qualified by its catalog.
    Schema => Schemas {
        table_schem: String = "table_schem",
        table_catalog: String = "table_catalog",
    }
}

metadata_record! {
    /// A table type name (e.g. `TABLE`, `VIEW`).
    TableType => TableTypes {
        table_type: String = "table_type",
    }
}

metadata_record! {
    /// A table, view or other table-like object.
    Table => Tables {
        table_cat: String = "table_cat",
        table_schem: String = "table_schem",
        table_name: String = "table_name",
        table_type: String = "table_type",
        remarks: String = "remarks",
        type_cat: String = "type_cat",
        type_schem: String = "type_schem",
        type_name: String = "type_name",
        self_referencing_col_name: String = "self_referencing_col_name",
        ref_generation: String = "ref_generation",
    }
    owns {
        /// Columns of this table
        columns: Column,
        /// Access rights granted on single columns of this table
        column_privileges: ColumnPrivilege,
        /// Primary key columns of this table
        primary_keys: PrimaryKey,
        /// Foreign keys this table imports
        foreign_keys: ForeignKey,
        /// Index columns of this table
        indices: IndexInfo,
        /// Access rights granted on this table
        privileges: TablePrivilege,
        /// Columns that best identify a row
        best_row_identifiers: BestRowIdentifier,
        /// Columns updated whenever a row changes
        version_columns: VersionColumn,
        /// Hidden columns
        pseudo_columns: PseudoColumn,
    }
}

metadata_record! {
    /// A table column.
    Column => Columns {
        table_cat: String = "table_cat",
        table_schem: String = "table_schem",
        table_name: String = "table_name",
        column_name: String = "column_name",
        data_type: i32 = "data_type",
        type_name: String = "type_name",
        column_size: i32 = "column_size",
        decimal_digits: i32 = "decimal_digits",
        num_prec_radix: i32 = "num_prec_radix",
        nullable: i32 = "nullable",
        remarks: String = "remarks",
        column_def: String = "column_def",
        char_octet_length: i32 = "char_octet_length",
        ordinal_position: i32 = "ordinal_position",
        is_nullable: String = "is_nullable",
        scope_catalog: String = "scope_catalog",
        scope_schema: String = "scope_schema",
        scope_table: String = "scope_table",
        source_data_type: i32 = "source_data_type",
        is_autoincrement: String = "is_autoincrement",
        is_generatedcolumn: String = "is_generatedcolumn",
    }
}

metadata_record! {
    /// An access right granted on one column.
    ColumnPrivilege => ColumnPrivileges {
        table_cat: String = "table_cat",
        table_schem: String = "table_schem",
        table_name: String = "table_name",
        column_name: String = "column_name",
        grantor: String = "grantor",
        grantee: String = "grantee",
        privilege: String = "privilege",
        is_grantable: String = "is_grantable",
    }
}

metadata_record! {
    /// One column of a table's primary key.
    PrimaryKey => PrimaryKeys {
        table_cat: String = "table_cat",
        table_schem: String = "table_schem",
        table_name: String = "table_name",
        column_name: String = "column_name",
        key_seq: i32 = "key_seq",
        pk_name: String = "pk_name",
    }
}

metadata_record! {
    /// One column pair of a foreign key, seen from the importing table.
    ForeignKey => ForeignKeys {
        pktable_cat: String = "pktable_cat",
        pktable_schem: String = "pktable_schem",
        pktable_name: String = "pktable_name",
        pkcolumn_name: String = "pkcolumn_name",
        fktable_cat: String = "fktable_cat",
        fktable_schem: String = "fktable_schem",
        fktable_name: String = "fktable_name",
        fkcolumn_name: String = "fkcolumn_name",
        key_seq: i32 = "key_seq",
        update_rule: i32 = "update_rule",
        delete_rule: i32 = "delete_rule",
        fk_name: String = "fk_name",
        pk_name: String = "pk_name",
        deferrability: i32 = "deferrability",
    }
}

metadata_record! {
    /// One column of an index (or a table statistic row).
    IndexInfo => Indices {
        table_cat: String = "table_cat",
        table_schem: String = "table_schem",
        table_name: String = "table_name",
        non_unique: bool = "non_unique",
        index_qualifier: String = "index_qualifier",
        index_name: String = "index_name",
        index_type: i32 = "type",
        ordinal_position: i32 = "ordinal_position",
        column_name: String = "column_name",
        asc_or_desc: String = "asc_or_desc",
        cardinality: i64 = "cardinality",
        pages: i64 = "pages",
        filter_condition: String = "filter_condition",
    }
}

metadata_record! {
    /// An access right granted on a table.
    TablePrivilege => Privileges {
        table_cat: String = "table_cat",
        table_schem: String = "table_schem",
        table_name: String = "table_name",
        grantor: String = "grantor",
        grantee: String = "grantee",
        privilege: String = "privilege",
        is_grantable: String = "is_grantable",
    }
}

metadata_record! {
    /// One column of the optimal set that uniquely identifies a row.
    BestRowIdentifier => BestRowIdentifiers {
        table_cat: String = "table_cat",
        table_schem: String = "table_schem",
        table_name: String = "table_name",
        scope: i32 = "scope",
        column_name: String = "column_name",
        data_type: i32 = "data_type",
        type_name: String = "type_name",
        column_size: i32 = "column_size",
        buffer_length: i32 = "buffer_length",
        decimal_digits: i32 = "decimal_digits",
        pseudo_column: i32 = "pseudo_column",
    }
}

metadata_record! {
    /// A column updated automatically when any value in a row changes.
    VersionColumn => VersionColumns {
        table_cat: String = "table_cat",
        table_schem: String = "table_schem",
        table_name: String = "table_name",
        scope: i32 = "scope",
        column_name: String = "column_name",
        data_type: i32 = "data_type",
        type_name: String = "type_name",
        column_size: i32 = "column_size",
        buffer_length: i32 = "buffer_length",
        decimal_digits: i32 = "decimal_digits",
        pseudo_column: i32 = "pseudo_column",
    }
}

metadata_record! {
    /// A hidden column of a table.
    PseudoColumn => PseudoColumns {
        table_cat: String = "table_cat",
        table_schem: String = "table_schem",
        table_name: String = "table_name",
        column_name: String = "column_name",
        data_type: i32 = "data_type",
        column_size: i32 = "column_size",
        decimal_digits: i32 = "decimal_digits",
        num_prec_radix: i32 = "num_prec_radix",
        column_usage: String = "column_usage",
        remarks: String = "remarks",
        char_octet_length: i32 = "char_octet_length",
        is_nullable: String = "is_nullable",
    }
}

metadata_record! {
    /// A stored or system function.
    Function => Functions {
        function_cat: String = "function_cat",
        function_schem: String = "function_schem",
        function_name: String = "function_name",
        remarks: String = "remarks",
        function_type: i32 = "function_type",
        specific_name: String = "specific_name",
    }
    owns {
        /// Parameters and result columns of this function
        columns: FunctionColumn,
    }
}

metadata_record! {
    /// A parameter or result column of a function.
    FunctionColumn => FunctionColumns {
        function_cat: String = "function_cat",
        function_schem: String = "function_schem",
        function_name: String = "function_name",
        column_name: String = "column_name",
        column_type: i32 = "column_type",
        data_type: i32 = "data_type",
        type_name: String = "type_name",
        precision: i32 = "precision",
        length: i32 = "length",
        scale: i32 = "scale",
        radix: i32 = "radix",
        nullable: i32 = "nullable",
        remarks: String = "remarks",
        char_octet_length: i32 = "char_octet_length",
        ordinal_position: i32 = "ordinal_position",
        is_nullable: String = "is_nullable",
        specific_name: String = "specific_name",
    }
}

metadata_record! {
    /// A stored procedure.
    Procedure => Procedures {
        procedure_cat: String = "procedure_cat",
        procedure_schem: String = "procedure_schem",
        procedure_name: String = "procedure_name",
        remarks: String = "remarks",
        procedure_type: i32 = "procedure_type",
        specific_name: String = "specific_name",
    }
    owns {
        /// Parameters and result columns of this procedure
        columns: ProcedureColumn,
    }
}

metadata_record! {
    /// A parameter or result column of a procedure.
    ProcedureColumn => ProcedureColumns {
        procedure_cat: String = "procedure_cat",
        procedure_schem: String = "procedure_schem",
        procedure_name: String = "procedure_name",
        column_name: String = "column_name",
        column_type: i32 = "column_type",
        data_type: i32 = "data_type",
        type_name: String = "type_name",
        precision: i32 = "precision",
        length: i32 = "length",
        scale: i32 = "scale",
        radix: i32 = "radix",
        nullable: i32 = "nullable",
        remarks: String = "remarks",
        column_def: String = "column_def",
        sql_data_type: i32 = "sql_data_type",
        sql_datetime_sub: i32 = "sql_datetime_sub",
        char_octet_length: i32 = "char_octet_length",
        ordinal_position: i32 = "ordinal_position",
        is_nullable: String = "is_nullable",
        specific_name: String = "specific_name",
    }
}

metadata_record! {
    /// A data type the source supports.
    TypeInfo => TypeInfo {
        type_name: String = "type_name",
        data_type: i32 = "data_type",
        precision: i32 = "precision",
        literal_prefix: String = "literal_prefix",
        literal_suffix: String = "literal_suffix",
        create_params: String = "create_params",
        nullable: i32 = "nullable",
        case_sensitive: bool = "case_sensitive",
        searchable: i32 = "searchable",
        unsigned_attribute: bool = "unsigned_attribute",
        fixed_prec_scale: bool = "fixed_prec_scale",
        auto_increment: bool = "auto_increment",
        local_type_name: String = "local_type_name",
        minimum_scale: i32 = "minimum_scale",
        maximum_scale: i32 = "maximum_scale",
        num_prec_radix: i32 = "num_prec_radix",
    }
}

metadata_record! {
    /// A client info property the driver supports.
    ClientInfoProperty => ClientInfoProperties {
        name: String = "name",
        max_len: i32 = "max_len",
        default_value: String = "default_value",
        description: String = "description",
    }
}

metadata_record! {
    /// Scalar properties the source reports about itself.
    DatabaseProperties => Properties {
        database_product_name: String = "database_product_name",
        database_product_version: String = "database_product_version",
        database_major_version: i32 = "database_major_version",
        database_minor_version: i32 = "database_minor_version",
        driver_name: String = "driver_name",
        driver_version: String = "driver_version",
        user_name: String = "user_name",
        read_only: bool = "read_only",
        default_transaction_isolation: i32 = "default_transaction_isolation",
        result_set_holdability: i32 = "result_set_holdability",
        supports_transactions: bool = "supports_transactions",
        identifier_quote_string: String = "identifier_quote_string",
        catalog_separator: String = "catalog_separator",
        catalog_term: String = "catalog_term",
        schema_term: String = "schema_term",
        procedure_term: String = "procedure_term",
        sql_keywords: String = "sql_keywords",
    }
}

fn typed<C: ApiConstant>(raw: Option<i32>) -> crate::Result<Option<C>> {
    raw.map(C::from_constant).transpose()
}

/// Natural key of a table. Missing catalog or schema is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableKey {
    pub catalog: String,
    pub schema: String,
    pub name: String,
}

impl TableKey {
    /// Builds a key, normalizing absent parts to the empty string.
    pub fn new(catalog: Option<&str>, schema: Option<&str>, name: Option<&str>) -> Self {
        Self {
            catalog: catalog.unwrap_or_default().to_string(),
            schema: schema.unwrap_or_default().to_string(),
            name: name.unwrap_or_default().to_string(),
        }
    }
}

impl std::fmt::Display for TableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in [&self.catalog, &self.schema] {
            if !part.is_empty() {
                write!(f, "{}.", part)?;
            }
        }
        f.write_str(&self.name)
    }
}

/// Natural key of a function or procedure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoutineKey {
    pub catalog: String,
    pub schema: String,
    pub name: String,
    pub specific_name: String,
}

impl RoutineKey {
    /// Builds a key, normalizing absent parts to the empty string.
    pub fn new(
        catalog: Option<&str>,
        schema: Option<&str>,
        name: Option<&str>,
        specific_name: Option<&str>,
    ) -> Self {
        Self {
            catalog: catalog.unwrap_or_default().to_string(),
            schema: schema.unwrap_or_default().to_string(),
            name: name.unwrap_or_default().to_string(),
            specific_name: specific_name.unwrap_or_default().to_string(),
        }
    }

    /// Checks catalog, schema and name, ignoring the specific name.
    pub fn same_name(&self, other: &RoutineKey) -> bool {
        self.catalog == other.catalog && self.schema == other.schema && self.name == other.name
    }
}

impl std::fmt::Display for RoutineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in [&self.catalog, &self.schema] {
            if !part.is_empty() {
                write!(f, "{}.", part)?;
            }
        }
        f.write_str(&self.name)?;
        if !self.specific_name.is_empty() && self.specific_name != self.name {
            write!(f, " [{}]", self.specific_name)?;
        }
        Ok(())
    }
}

impl Table {
    /// Natural key of this table.
    pub fn key(&self) -> TableKey {
        TableKey::new(
            self.table_cat.as_deref(),
            self.table_schem.as_deref(),
            self.table_name.as_deref(),
        )
    }
}

impl Schema {
    /// `(catalog, schema)` pair, absent parts normalized to the empty string.
    pub fn key(&self) -> (String, String) {
        (
            self.table_catalog.clone().unwrap_or_default(),
            self.table_schem.clone().unwrap_or_default(),
        )
    }
}

impl Column {
    /// Key of the owning table.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(
            self.table_cat.as_deref(),
            self.table_schem.as_deref(),
            self.table_name.as_deref(),
        )
    }

    /// Typed `nullable` value.
    pub fn nullability(&self) -> crate::Result<Option<ColumnNullability>> {
        typed(self.nullable)
    }
}

impl ColumnPrivilege {
    /// Key of the owning table.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(
            self.table_cat.as_deref(),
            self.table_schem.as_deref(),
            self.table_name.as_deref(),
        )
    }
}

impl PrimaryKey {
    /// Key of the owning table.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(
            self.table_cat.as_deref(),
            self.table_schem.as_deref(),
            self.table_name.as_deref(),
        )
    }
}

impl ForeignKey {
    /// Key of the importing (owning) table.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(
            self.fktable_cat.as_deref(),
            self.fktable_schem.as_deref(),
            self.fktable_name.as_deref(),
        )
    }

    /// Key of the referenced primary-key table.
    pub fn referenced_table_key(&self) -> TableKey {
        TableKey::new(
            self.pktable_cat.as_deref(),
            self.pktable_schem.as_deref(),
            self.pktable_name.as_deref(),
        )
    }

    /// Typed `update_rule` value.
    pub fn update_rule(&self) -> crate::Result<Option<KeyRule>> {
        typed(self.update_rule)
    }

    /// Typed `delete_rule` value.
    pub fn delete_rule(&self) -> crate::Result<Option<KeyRule>> {
        typed(self.delete_rule)
    }

    /// Typed `deferrability` value.
    pub fn deferrability(&self) -> crate::Result<Option<KeyDeferrability>> {
        typed(self.deferrability)
    }
}

impl IndexInfo {
    /// Key of the owning table.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(
            self.table_cat.as_deref(),
            self.table_schem.as_deref(),
            self.table_name.as_deref(),
        )
    }
}

impl TablePrivilege {
    /// Key of the owning table.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(
            self.table_cat.as_deref(),
            self.table_schem.as_deref(),
            self.table_name.as_deref(),
        )
    }
}

impl BestRowIdentifier {
    /// Key of the owning table.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(
            self.table_cat.as_deref(),
            self.table_schem.as_deref(),
            self.table_name.as_deref(),
        )
    }

    /// Typed `scope` value.
    pub fn best_row_scope(&self) -> crate::Result<Option<BestRowScope>> {
        typed(self.scope)
    }

    /// Typed `pseudo_column` value.
    pub fn pseudo_column_kind(&self) -> crate::Result<Option<PseudoColumnKind>> {
        typed(self.pseudo_column)
    }
}

impl VersionColumn {
    /// Key of the owning table.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(
            self.table_cat.as_deref(),
            self.table_schem.as_deref(),
            self.table_name.as_deref(),
        )
    }

    /// Typed `pseudo_column` value.
    pub fn pseudo_column_kind(&self) -> crate::Result<Option<PseudoColumnKind>> {
        typed(self.pseudo_column)
    }
}

impl PseudoColumn {
    /// Key of the owning table.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(
            self.table_cat.as_deref(),
            self.table_schem.as_deref(),
            self.table_name.as_deref(),
        )
    }
}

impl Function {
    /// Natural key of this function.
    pub fn key(&self) -> RoutineKey {
        RoutineKey::new(
            self.function_cat.as_deref(),
            self.function_schem.as_deref(),
            self.function_name.as_deref(),
            self.specific_name.as_deref(),
        )
    }
}

impl FunctionColumn {
    /// Key of the owning function.
    pub fn function_key(&self) -> RoutineKey {
        RoutineKey::new(
            self.function_cat.as_deref(),
            self.function_schem.as_deref(),
            self.function_name.as_deref(),
            self.specific_name.as_deref(),
        )
    }

    /// Typed `nullable` value.
    pub fn nullability(&self) -> crate::Result<Option<ColumnNullability>> {
        typed(self.nullable)
    }
}

impl Procedure {
    /// Natural key of this procedure.
    pub fn key(&self) -> RoutineKey {
        RoutineKey::new(
            self.procedure_cat.as_deref(),
            self.procedure_schem.as_deref(),
            self.procedure_name.as_deref(),
            self.specific_name.as_deref(),
        )
    }
}

impl ProcedureColumn {
    /// Key of the owning procedure.
    pub fn procedure_key(&self) -> RoutineKey {
        RoutineKey::new(
            self.procedure_cat.as_deref(),
            self.procedure_schem.as_deref(),
            self.procedure_name.as_deref(),
            self.specific_name.as_deref(),
        )
    }

    /// Typed `nullable` value.
    pub fn nullability(&self) -> crate::Result<Option<ColumnNullability>> {
        typed(self.nullable)
    }
}

impl TypeInfo {
    /// Typed `nullable` value.
    pub fn nullability(&self) -> crate::Result<Option<ColumnNullability>> {
        typed(self.nullable)
    }
}

impl DatabaseProperties {
    /// Typed `default_transaction_isolation` value.
    pub fn default_transaction_isolation(&self) -> crate::Result<Option<TransactionIsolation>> {
        typed(self.default_transaction_isolation)
    }

    /// Typed `result_set_holdability` value.
    pub fn result_set_holdability(&self) -> crate::Result<Option<ResultSetHoldability>> {
        typed(self.result_set_holdability)
    }
}

/// Children whose parent could not be found in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unattached {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub column_privileges: Vec<ColumnPrivilege>,
    #[serde(default)]
    pub primary_keys: Vec<PrimaryKey>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub indices: Vec<IndexInfo>,
    #[serde(default)]
    pub privileges: Vec<TablePrivilege>,
    #[serde(default)]
    pub best_row_identifiers: Vec<BestRowIdentifier>,
    #[serde(default)]
    pub version_columns: Vec<VersionColumn>,
    #[serde(default)]
    pub pseudo_columns: Vec<PseudoColumn>,
    #[serde(default)]
    pub function_columns: Vec<FunctionColumn>,
    #[serde(default)]
    pub procedure_columns: Vec<ProcedureColumn>,
}

impl Unattached {
    /// Number of unattached records of a category.
    pub fn count(&self, category: CategoryId) -> usize {
        match category {
            CategoryId::Columns => self.columns.len(),
            CategoryId::ColumnPrivileges => self.column_privileges.len(),
            CategoryId::PrimaryKeys => self.primary_keys.len(),
            CategoryId::ForeignKeys => self.foreign_keys.len(),
            CategoryId::Indices => self.indices.len(),
            CategoryId::Privileges => self.privileges.len(),
            CategoryId::BestRowIdentifiers => self.best_row_identifiers.len(),
            CategoryId::VersionColumns => self.version_columns.len(),
            CategoryId::PseudoColumns => self.pseudo_columns.len(),
            CategoryId::FunctionColumns => self.function_columns.len(),
            CategoryId::ProcedureColumns => self.procedure_columns.len(),
            _ => 0,
        }
    }

    /// Checks whether every bucket is empty.
    pub fn is_empty(&self) -> bool {
        CategoryId::ORDER.iter().all(|category| self.count(*category) == 0)
    }
}

/// Outcome of one category in a collection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryStatus {
    /// The source was queried; `records` rows were bound
    Collected { records: usize },
    /// Suppressed for this fingerprint; the source was not queried
    Skipped { reason: String },
    /// The source reported the category as not supported
    Unsupported { reason: String },
}

/// Per-category report entry of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: CategoryId,
    #[serde(flatten)]
    pub status: CategoryStatus,
}

impl CategoryReport {
    /// Checks whether the category was skipped or unsupported.
    pub fn is_absent(&self) -> bool {
        !matches!(self.status, CategoryStatus::Collected { .. })
    }
}

/// Collection metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub collected_at: chrono::DateTime<chrono::Utc>,
    pub collection_duration_ms: u64,
    pub collector_version: String,
    pub warnings: Vec<String>,
}

impl Default for CollectionMetadata {
    fn default() -> Self {
        Self {
            collected_at: chrono::Utc::now(),
            collection_duration_ms: 0,
            collector_version: env!("CARGO_PKG_VERSION").to_string(),
            warnings: Vec::new(),
        }
    }
}

/// Complete metadata of one data source, built by one collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub format_version: String,
    pub fingerprint: Fingerprint,
    pub catalogs: Vec<Catalog>,
    pub schemas: Vec<Schema>,
    pub table_types: Vec<TableType>,
    pub tables: Vec<Table>,
    pub functions: Vec<Function>,
    pub procedures: Vec<Procedure>,
    pub type_info: Vec<TypeInfo>,
    pub client_info_properties: Vec<ClientInfoProperty>,
    pub properties: Option<DatabaseProperties>,
    pub unattached: Unattached,
    pub reports: Vec<CategoryReport>,
    pub collection_metadata: CollectionMetadata,
}

impl MetadataSnapshot {
    /// Creates an empty snapshot for a fingerprinted source.
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            fingerprint,
            catalogs: Vec::new(),
            schemas: Vec::new(),
            table_types: Vec::new(),
            tables: Vec::new(),
            functions: Vec::new(),
            procedures: Vec::new(),
            type_info: Vec::new(),
            client_info_properties: Vec::new(),
            properties: None,
            unattached: Unattached::default(),
            reports: Vec::new(),
            collection_metadata: CollectionMetadata::default(),
        }
    }

    /// Adds a warning to the collection metadata
    pub fn add_warning(&mut self, warning: String) {
        self.collection_metadata.warnings.push(warning);
    }

    /// Report for a category, if one was recorded.
    pub fn report(&self, category: CategoryId) -> Option<&CategoryReport> {
        self.reports.iter().find(|report| report.category == category)
    }

    /// Number of attached records of a category, nested children included.
    pub fn record_count(&self, category: CategoryId) -> usize {
        let per_table =
            |count: fn(&Table) -> usize| -> usize { self.tables.iter().map(count).sum() };
        match category {
            CategoryId::Catalogs => self.catalogs.len(),
            CategoryId::Schemas => self.schemas.len(),
            CategoryId::TableTypes => self.table_types.len(),
            CategoryId::Tables => self.tables.len(),
            CategoryId::Columns => per_table(|table| table.columns.len()),
            CategoryId::ColumnPrivileges => per_table(|table| table.column_privileges.len()),
            CategoryId::PrimaryKeys => per_table(|table| table.primary_keys.len()),
            CategoryId::ForeignKeys => per_table(|table| table.foreign_keys.len()),
            CategoryId::Indices => per_table(|table| table.indices.len()),
            CategoryId::Privileges => per_table(|table| table.privileges.len()),
            CategoryId::BestRowIdentifiers => {
                per_table(|table| table.best_row_identifiers.len())
            }
            CategoryId::VersionColumns => per_table(|table| table.version_columns.len()),
            CategoryId::PseudoColumns => per_table(|table| table.pseudo_columns.len()),
            CategoryId::Functions => self.functions.len(),
            CategoryId::FunctionColumns => self.functions.iter().map(|f| f.columns.len()).sum(),
            CategoryId::Procedures => self.procedures.len(),
            CategoryId::ProcedureColumns => self.procedures.iter().map(|p| p.columns.len()).sum(),
            CategoryId::TypeInfo => self.type_info.len(),
            CategoryId::ClientInfoProperties => self.client_info_properties.len(),
            CategoryId::Properties => usize::from(self.properties.is_some()),
        }
    }

    /// Iterates over every foreign key attached to a table.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.tables.iter().flat_map(|table| table.foreign_keys.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fingerprint() -> Fingerprint {
        Fingerprint::compute("ExampleDB", "5.0", Some("1.2")).unwrap()
    }

    #[test]
    fn test_snapshot_creation() {
        let snapshot = MetadataSnapshot::new(fingerprint());
        assert_eq!(snapshot.format_version, "1.0");
        assert!(snapshot.unattached.is_empty());
        for category in CategoryId::ORDER {
            assert_eq!(snapshot.record_count(category), 0);
        }
        assert_eq!(
            snapshot.collection_metadata.collector_version,
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_add_warning() {
        let mut snapshot = MetadataSnapshot::new(fingerprint());
        snapshot.add_warning("Test warning".to_string());

        assert_eq!(snapshot.collection_metadata.warnings.len(), 1);
        assert_eq!(snapshot.collection_metadata.warnings[0], "Test warning");
    }

    #[test]
    fn test_record_count_includes_nested_children() {
        let mut snapshot = MetadataSnapshot::new(fingerprint());
        let mut table = Table {
            table_name: Some("T1".to_string()),
            ..Table::default()
        };
        table.columns.push(Column::default());
        table.columns.push(Column::default());
        snapshot.tables.push(table);

        assert_eq!(snapshot.record_count(CategoryId::Tables), 1);
        assert_eq!(snapshot.record_count(CategoryId::Columns), 2);
        assert_eq!(snapshot.record_count(CategoryId::Indices), 0);
    }

    #[test]
    fn test_keys_normalize_missing_parts() {
        let column = Column {
            table_name: Some("T1".to_string()),
            ..Column::default()
        };
        assert_eq!(column.table_key(), TableKey::new(Some(""), None, Some("T1")));
        assert_eq!(column.table_key().to_string(), "T1");

        let key = TableKey::new(Some("main"), Some("dbo"), Some("orders"));
        assert_eq!(key.to_string(), "main.dbo.orders");
    }

    #[test]
    fn test_routine_key_same_name_ignores_specific_name() {
        let a = RoutineKey::new(None, Some("s"), Some("f"), Some("f_1"));
        let b = RoutineKey::new(None, Some("s"), Some("f"), Some("f_2"));
        assert!(a.same_name(&b));
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "s.f [f_1]");
    }

    #[test]
    fn test_typed_accessors() {
        let fk = ForeignKey {
            update_rule: Some(0),
            delete_rule: Some(9),
            ..ForeignKey::default()
        };
        assert_eq!(fk.update_rule().unwrap(), Some(KeyRule::Cascade));
        assert!(fk.delete_rule().is_err());
        assert_eq!(fk.deferrability().unwrap(), None);

        let props = DatabaseProperties {
            default_transaction_isolation: Some(2),
            ..DatabaseProperties::default()
        };
        assert_eq!(
            props.default_transaction_isolation().unwrap(),
            Some(TransactionIsolation::ReadCommitted)
        );

        let identifier = BestRowIdentifier {
            scope: Some(2),
            pseudo_column: Some(2),
            ..BestRowIdentifier::default()
        };
        assert_eq!(identifier.best_row_scope().unwrap(), Some(BestRowScope::Session));
        assert_eq!(
            identifier.pseudo_column_kind().unwrap(),
            Some(PseudoColumnKind::Pseudo)
        );
        let version = VersionColumn {
            pseudo_column: Some(5),
            ..VersionColumn::default()
        };
        assert!(version.pseudo_column_kind().is_err());
    }

    #[test]
    fn test_fields_serialize_in_declared_order() {
        let index = IndexInfo {
            table_name: Some("T1".to_string()),
            index_type: Some(3),
            ..IndexInfo::default()
        };
        let value = serde_json::to_value(&index).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.get("type"), Some(&json!(3)));
        assert!(!object.contains_key("unknown"));

        let text = serde_json::to_string(&index).unwrap();
        let positions: Vec<usize> = IndexInfo::FIELDS
            .iter()
            .map(|field| text.find(&format!("\"{}\":", field)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_category_report_serialization() {
        let report = CategoryReport {
            category: CategoryId::Functions,
            status: CategoryStatus::Skipped {
                reason: "suppressed".to_string(),
            },
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({"category": "functions", "status": "skipped", "reason": "suppressed"})
        );
        assert!(report.is_absent());
    }
}
