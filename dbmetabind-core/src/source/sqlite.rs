//! SQLite metadata source.
//!
//! Reads `sqlite_master` and the `pragma_*` table-valued functions and
//! reports the results with the standard introspection column labels.
//!
//! # SQLite-Specific Behavior
//! - Catalogs are the attached databases (`pragma_database_list`)
//! - There are no schemas; the category is collected with zero rows
//! - Table and column privileges, functions and procedures are reported as
//!   unsupported
//! - Best-row identifiers are the primary key columns, or `rowid`
//! - There are no version columns, pseudo columns or client info properties
//! - Type info is a fixed table describing the five storage classes
//! - Identifiers are case-insensitive; foreign keys report the referenced
//!   table under its declared name in `sqlite_master`
//! - All statements are read-only (SELECT/PRAGMA only)

use super::{MetadataRow, MetadataSource, SourceError, SourceIdentity, SourceResult};
use crate::category::CategoryId;
use crate::error::MetabindError;
use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::{Row, SqlitePool};

/// Product name SQLite sources report.
pub const SQLITE_PRODUCT_NAME: &str = "SQLite";

const DRIVER_NAME: &str = "dbmetabind-sqlite";

/// Standard SQL type codes used in `DATA_TYPE`.
mod type_code {
    pub(super) const INTEGER: i32 = 4;
    pub(super) const DOUBLE: i32 = 8;
    pub(super) const VARCHAR: i32 = 12;
    pub(super) const NUMERIC: i32 = 2;
    pub(super) const BLOB: i32 = 2004;
    pub(super) const NULL: i32 = 0;
}

/// Metadata source over a SQLite connection pool.
pub struct SqliteSource {
    pool: SqlitePool,
    in_memory: bool,
    read_only: bool,
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("is_in_memory", &self.in_memory)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl SqliteSource {
    /// Opens a SQLite database.
    ///
    /// # Connection String Formats
    /// - `sqlite:///path/to/database.db` - Absolute file path
    /// - `sqlite://./relative/path.db` - Relative file path
    /// - `sqlite::memory:` or `:memory:` - In-memory database
    ///
    /// File databases are opened read-only.
    ///
    /// # Errors
    /// Returns error if the connection string is malformed or the database
    /// cannot be opened
    pub async fn connect(connection_string: &str) -> crate::Result<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        validate_sqlite_connection_string(connection_string)?;
        let in_memory = is_in_memory(connection_string);

        let mut options = SqliteConnectOptions::from_str(&normalize_connection_string(
            connection_string,
        ))
        .map_err(|e| {
            MetabindError::configuration(format!("Invalid SQLite connection string: {}", e))
        })?;
        if !in_memory {
            options = options.read_only(true);
        }

        // An in-memory database lives and dies with its single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(MetabindError::connection_failed)?;

        Ok(Self {
            pool,
            in_memory,
            read_only: !in_memory,
        })
    }

    /// Wraps an existing pool. The pool stays owned by the caller's clone.
    ///
    /// Pools are writable unless opened with `read_only(true)`; mark such
    /// pools with [`SqliteSource::with_read_only`].
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            in_memory: false,
            read_only: false,
        }
    }

    /// Records whether the wrapped pool was opened read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Checks if the source was opened as an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn relations(&self, tables_only: bool) -> SourceResult<Vec<(String, String)>> {
        let query = if tables_only {
            "SELECT name, type FROM sqlite_master \
             WHERE type = 'table' AND lower(substr(name, 1, 7)) <> 'sqlite_' ORDER BY name"
        } else {
            "SELECT name, type FROM sqlite_master \
             WHERE type IN ('table', 'view') AND lower(substr(name, 1, 7)) <> 'sqlite_' \
             ORDER BY name"
        };

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceError::failed_with("Failed to enumerate tables", e))?;

        rows.iter()
            .map(|row| {
                let name: String = row
                    .try_get("name")
                    .map_err(|e| SourceError::failed_with("Failed to parse table name", e))?;
                let kind: String = row
                    .try_get("type")
                    .map_err(|e| SourceError::failed_with("Failed to parse table type", e))?;
                Ok((name, kind))
            })
            .collect()
    }

    async fn catalogs(&self) -> SourceResult<Vec<MetadataRow>> {
        let rows = sqlx::query("SELECT name FROM pragma_database_list ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceError::failed_with("Failed to list databases", e))?;

        rows.iter()
            .map(|row| {
                let name: String = row
                    .try_get("name")
                    .map_err(|e| SourceError::failed_with("Failed to parse database name", e))?;
                Ok(metadata_row([("TABLE_CAT", json!(name))]))
            })
            .collect()
    }

    async fn tables(&self) -> SourceResult<Vec<MetadataRow>> {
        Ok(self
            .relations(false)
            .await?
            .into_iter()
            .map(|(name, kind)| {
                metadata_row([
                    ("TABLE_NAME", json!(name)),
                    ("TABLE_TYPE", json!(kind.to_ascii_uppercase())),
                    ("REMARKS", Value::Null),
                ])
            })
            .collect())
    }

    async fn table_info(&self, table: &str) -> SourceResult<Vec<sqlx::sqlite::SqliteRow>> {
        sqlx::query(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk \
             FROM pragma_table_info(?1) ORDER BY cid",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SourceError::failed_with(format!("Failed to read columns of {}", table), e))
    }

    async fn columns(&self) -> SourceResult<Vec<MetadataRow>> {
        let mut result = Vec::new();
        for (table, _) in self.relations(false).await? {
            for row in self.table_info(&table).await? {
                let cid: i64 = row.try_get("cid").unwrap_or(0);
                let name: String = row.try_get("name").unwrap_or_default();
                let declared: String = row.try_get("type").unwrap_or_default();
                let not_null: i64 = row.try_get("notnull").unwrap_or(0);
                let default_value: Option<String> = row.try_get("dflt_value").unwrap_or(None);
                let pk: i64 = row.try_get("pk").unwrap_or(0);

                // INTEGER PRIMARY KEY is the rowid and never null, whatever the pragma says.
                let nullable = not_null == 0 && pk == 0;
                let auto_increment = pk == 1 && declared.eq_ignore_ascii_case("INTEGER");

                result.push(metadata_row([
                    ("TABLE_NAME", json!(table)),
                    ("COLUMN_NAME", json!(name)),
                    ("DATA_TYPE", json!(type_code_for(&declared))),
                    ("TYPE_NAME", json!(declared)),
                    ("NULLABLE", json!(i32::from(nullable))),
                    ("COLUMN_DEF", json!(default_value)),
                    ("ORDINAL_POSITION", json!(cid.saturating_add(1))),
                    ("IS_NULLABLE", json!(if nullable { "YES" } else { "NO" })),
                    (
                        "IS_AUTOINCREMENT",
                        json!(if auto_increment { "YES" } else { "NO" }),
                    ),
                ]));
            }
        }
        Ok(result)
    }

    async fn primary_keys(&self) -> SourceResult<Vec<MetadataRow>> {
        let mut result = Vec::new();
        for (table, _) in self.relations(true).await? {
            for row in self.table_info(&table).await? {
                let pk: i64 = row.try_get("pk").unwrap_or(0);
                if pk == 0 {
                    continue;
                }
                let name: String = row.try_get("name").unwrap_or_default();
                result.push(metadata_row([
                    ("TABLE_NAME", json!(table)),
                    ("COLUMN_NAME", json!(name)),
                    ("KEY_SEQ", json!(pk)),
                    ("PK_NAME", Value::Null),
                ]));
            }
        }
        Ok(result)
    }

    async fn foreign_keys(&self) -> SourceResult<Vec<MetadataRow>> {
        let tables: Vec<String> = self
            .relations(true)
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        let mut result = Vec::new();
        for table in &tables {
            let rows = sqlx::query(
                "SELECT id, seq, \"table\", \"from\", \"to\", on_update, on_delete \
                 FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
            )
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SourceError::failed_with(format!("Failed to read foreign keys of {}", table), e)
            })?;

            for row in rows {
                let seq: i64 = row.try_get("seq").unwrap_or(0);
                let declared: String = row.try_get("table").unwrap_or_default();
                let referenced = canonical_table_name(&tables, &declared);
                let from: String = row.try_get("from").unwrap_or_default();
                let to: Option<String> = row.try_get("to").unwrap_or(None);
                let on_update: String = row.try_get("on_update").unwrap_or_default();
                let on_delete: String = row.try_get("on_delete").unwrap_or_default();

                result.push(metadata_row([
                    ("PKTABLE_NAME", json!(referenced)),
                    ("PKCOLUMN_NAME", json!(to)),
                    ("FKTABLE_NAME", json!(table)),
                    ("FKCOLUMN_NAME", json!(from)),
                    ("KEY_SEQ", json!(seq.saturating_add(1))),
                    ("UPDATE_RULE", key_rule(&on_update)),
                    ("DELETE_RULE", key_rule(&on_delete)),
                    ("FK_NAME", Value::Null),
                    ("PK_NAME", Value::Null),
                    ("DEFERRABILITY", json!(7)),
                ]));
            }
        }
        Ok(result)
    }

    async fn indices(&self) -> SourceResult<Vec<MetadataRow>> {
        let mut result = Vec::new();
        for (table, _) in self.relations(true).await? {
            let indexes = sqlx::query(
                "SELECT name, \"unique\", origin FROM pragma_index_list(?1) ORDER BY name",
            )
            .bind(&table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SourceError::failed_with(format!("Failed to read indexes of {}", table), e)
            })?;

            for index in indexes {
                let index_name: String = index.try_get("name").unwrap_or_default();
                let unique: i64 = index.try_get("unique").unwrap_or(0);
                let origin: String = index.try_get("origin").unwrap_or_default();

                let columns = sqlx::query(
                    "SELECT seqno, name FROM pragma_index_info(?1) ORDER BY seqno",
                )
                .bind(&index_name)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    SourceError::failed_with(format!("Failed to read index {}", index_name), e)
                })?;

                for column in columns {
                    let seqno: i64 = column.try_get("seqno").unwrap_or(0);
                    let column_name: Option<String> = column.try_get("name").unwrap_or(None);
                    result.push(metadata_row([
                        ("TABLE_NAME", json!(table)),
                        ("NON_UNIQUE", json!(unique == 0)),
                        ("INDEX_NAME", json!(index_name)),
                        ("TYPE", json!(3)),
                        ("ORDINAL_POSITION", json!(seqno.saturating_add(1))),
                        ("COLUMN_NAME", json!(column_name)),
                        ("ORIGIN", json!(origin)),
                    ]));
                }
            }
        }
        Ok(result)
    }

    async fn best_row_identifiers(&self) -> SourceResult<Vec<MetadataRow>> {
        let mut result = Vec::new();
        for (table, _) in self.relations(true).await? {
            let mut key_columns = Vec::new();
            for row in self.table_info(&table).await? {
                let pk: i64 = row.try_get("pk").unwrap_or(0);
                if pk == 0 {
                    continue;
                }
                let name: String = row.try_get("name").unwrap_or_default();
                let declared: String = row.try_get("type").unwrap_or_default();
                key_columns.push((pk, name, declared));
            }
            key_columns.sort_by_key(|(pk, _, _)| *pk);

            // A table without a primary key is a rowid table.
            let pseudo = key_columns.is_empty();
            if pseudo {
                key_columns.push((0, "rowid".to_string(), "INTEGER".to_string()));
            }

            for (_, name, declared) in key_columns {
                result.push(metadata_row([
                    ("TABLE_NAME", json!(table)),
                    ("SCOPE", json!(2)),
                    ("COLUMN_NAME", json!(name)),
                    ("DATA_TYPE", json!(type_code_for(&declared))),
                    ("TYPE_NAME", json!(declared)),
                    ("PSEUDO_COLUMN", json!(if pseudo { 2 } else { 1 })),
                ]));
            }
        }
        Ok(result)
    }

    async fn version(&self) -> SourceResult<String> {
        sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SourceError::failed_with("Failed to get SQLite version", e))
    }

    async fn properties(&self) -> SourceResult<Vec<MetadataRow>> {
        let version = self.version().await?;
        let mut parts = version.split('.').map(|part| part.parse::<i32>().ok());
        let major = parts.next().flatten();
        let minor = parts.next().flatten();

        let query_only: i64 = sqlx::query_scalar("PRAGMA query_only")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let encoding: String = sqlx::query_scalar("PRAGMA encoding")
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|_| "UTF-8".to_string());

        Ok(vec![metadata_row([
            ("DATABASE_PRODUCT_NAME", json!(SQLITE_PRODUCT_NAME)),
            ("DATABASE_PRODUCT_VERSION", json!(version)),
            ("DATABASE_MAJOR_VERSION", json!(major)),
            ("DATABASE_MINOR_VERSION", json!(minor)),
            ("DRIVER_NAME", json!(DRIVER_NAME)),
            ("DRIVER_VERSION", json!(env!("CARGO_PKG_VERSION"))),
            ("READ_ONLY", json!(self.is_read_only(query_only))),
            ("DEFAULT_TRANSACTION_ISOLATION", json!(8)),
            ("RESULT_SET_HOLDABILITY", json!(2)),
            ("SUPPORTS_TRANSACTIONS", json!(true)),
            ("IDENTIFIER_QUOTE_STRING", json!("\"")),
            ("CATALOG_SEPARATOR", json!(".")),
            ("ENCODING", json!(encoding)),
        ])])
    }

    fn is_read_only(&self, query_only: i64) -> bool {
        query_only != 0 || self.read_only
    }
}

#[async_trait]
impl MetadataSource for SqliteSource {
    async fn identity(&self) -> SourceResult<SourceIdentity> {
        let version = self.version().await?;
        Ok(SourceIdentity::new(SQLITE_PRODUCT_NAME, version)
            .with_driver(DRIVER_NAME, env!("CARGO_PKG_VERSION")))
    }

    async fn fetch(&self, category: CategoryId) -> SourceResult<Vec<MetadataRow>> {
        tracing::trace!("SQLite fetch: {}", category);
        match category {
            CategoryId::Catalogs => self.catalogs().await,
            CategoryId::Schemas => Ok(Vec::new()),
            CategoryId::TableTypes => Ok(table_type_rows()),
            CategoryId::Tables => self.tables().await,
            CategoryId::Columns => self.columns().await,
            CategoryId::PrimaryKeys => self.primary_keys().await,
            CategoryId::ForeignKeys => self.foreign_keys().await,
            CategoryId::Indices => self.indices().await,
            CategoryId::BestRowIdentifiers => self.best_row_identifiers().await,
            CategoryId::VersionColumns
            | CategoryId::PseudoColumns
            | CategoryId::ClientInfoProperties => Ok(Vec::new()),
            CategoryId::Privileges
            | CategoryId::ColumnPrivileges
            | CategoryId::Functions
            | CategoryId::FunctionColumns
            | CategoryId::Procedures
            | CategoryId::ProcedureColumns => Err(SourceError::unsupported(format!(
                "SQLite does not report {}",
                category
            ))),
            CategoryId::TypeInfo => Ok(type_info_rows()),
            CategoryId::Properties => self.properties().await,
        }
    }
}

fn metadata_row<const N: usize>(pairs: [(&str, Value); N]) -> MetadataRow {
    pairs
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect()
}

/// Maps a declared column type to a type code using SQLite's affinity rules.
pub fn type_code_for(declared: &str) -> i32 {
    let upper = declared.to_ascii_uppercase();
    if upper.contains("INT") {
        type_code::INTEGER
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        type_code::VARCHAR
    } else if upper.is_empty() || upper.contains("BLOB") {
        type_code::BLOB
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        type_code::DOUBLE
    } else {
        type_code::NUMERIC
    }
}

/// Name of the table in `tables` that `declared` refers to, ignoring case.
///
/// Falls back to the declared name for references to missing tables.
fn canonical_table_name(tables: &[String], declared: &str) -> String {
    tables
        .iter()
        .find(|table| table.eq_ignore_ascii_case(declared))
        .cloned()
        .unwrap_or_else(|| declared.to_string())
}

fn table_type_rows() -> Vec<MetadataRow> {
    ["TABLE", "VIEW"]
        .into_iter()
        .map(|table_type| metadata_row([("TABLE_TYPE", json!(table_type))]))
        .collect()
}

fn key_rule(action: &str) -> Value {
    match action.to_ascii_uppercase().as_str() {
        "CASCADE" => json!(0),
        "RESTRICT" => json!(1),
        "SET NULL" => json!(2),
        "NO ACTION" | "" => json!(3),
        "SET DEFAULT" => json!(4),
        other => json!(other),
    }
}

fn type_info_rows() -> Vec<MetadataRow> {
    [
        ("NULL", type_code::NULL, 0, false),
        ("INTEGER", type_code::INTEGER, 19, true),
        ("REAL", type_code::DOUBLE, 15, false),
        ("TEXT", type_code::VARCHAR, 0, false),
        ("BLOB", type_code::BLOB, 0, false),
    ]
    .into_iter()
    .map(|(name, code, precision, auto_increment)| {
        metadata_row([
            ("TYPE_NAME", json!(name)),
            ("DATA_TYPE", json!(code)),
            ("PRECISION", json!(precision)),
            ("NULLABLE", json!(1)),
            ("CASE_SENSITIVE", json!(code == type_code::VARCHAR)),
            ("SEARCHABLE", json!(3)),
            ("UNSIGNED_ATTRIBUTE", json!(false)),
            ("FIXED_PREC_SCALE", json!(false)),
            ("AUTO_INCREMENT", json!(auto_increment)),
            ("NUM_PREC_RADIX", json!(10)),
        ])
    })
    .collect()
}

fn is_in_memory(connection_string: &str) -> bool {
    connection_string.contains(":memory:") || connection_string.contains("mode=memory")
}

/// Validates SQLite connection string format.
///
/// # Errors
/// Returns error if connection string is invalid
pub fn validate_sqlite_connection_string(connection_string: &str) -> crate::Result<()> {
    if connection_string == ":memory:" {
        return Ok(());
    }

    if connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        return Ok(());
    }

    if connection_string.starts_with("sqlite:") {
        if is_in_memory(connection_string) {
            return Ok(());
        }

        if let Ok(url) = url::Url::parse(connection_string) {
            if url.scheme() != "sqlite" {
                return Err(MetabindError::configuration(
                    "Connection string must use sqlite:// scheme",
                ));
            }
            return Ok(());
        }

        if connection_string.starts_with("sqlite://") {
            return Ok(());
        }
    }

    Err(MetabindError::configuration(
        "Invalid SQLite connection string format: expected sqlite:// URL, file path, or :memory:",
    ))
}

/// Normalizes connection string to SQLite URL format.
fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }

    format!("sqlite://{}", connection_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sqlite_connection_string() {
        assert!(validate_sqlite_connection_string(":memory:").is_ok());
        assert!(validate_sqlite_connection_string("sqlite::memory:").is_ok());
        assert!(validate_sqlite_connection_string("sqlite:///path/to/db.sqlite").is_ok());
        assert!(validate_sqlite_connection_string("./local.sqlite").is_ok());
        assert!(validate_sqlite_connection_string("data.sqlite3").is_ok());

        assert!(validate_sqlite_connection_string("postgres://localhost/db").is_err());
        assert!(validate_sqlite_connection_string("invalid").is_err());
    }

    #[test]
    fn test_normalize_connection_string() {
        assert_eq!(normalize_connection_string(":memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_connection_string("/path/to/db.sqlite"),
            "sqlite:///path/to/db.sqlite"
        );
        assert_eq!(
            normalize_connection_string("sqlite:///path/db.sqlite"),
            "sqlite:///path/db.sqlite"
        );
    }

    #[test]
    fn test_type_affinity() {
        assert_eq!(type_code_for("INTEGER"), type_code::INTEGER);
        assert_eq!(type_code_for("bigint"), type_code::INTEGER);
        assert_eq!(type_code_for("VARCHAR(255)"), type_code::VARCHAR);
        assert_eq!(type_code_for("text"), type_code::VARCHAR);
        assert_eq!(type_code_for(""), type_code::BLOB);
        assert_eq!(type_code_for("DOUBLE PRECISION"), type_code::DOUBLE);
        assert_eq!(type_code_for("DECIMAL(10,2)"), type_code::NUMERIC);
    }

    #[test]
    fn test_key_rule_mapping() {
        assert_eq!(key_rule("CASCADE"), json!(0));
        assert_eq!(key_rule("set null"), json!(2));
        assert_eq!(key_rule("NO ACTION"), json!(3));
        assert_eq!(key_rule("MATCH"), json!("MATCH"));
    }

    #[test]
    fn test_canonical_table_name_ignores_case() {
        let tables = vec!["orders".to_string(), "users".to_string()];
        assert_eq!(canonical_table_name(&tables, "Users"), "users");
        assert_eq!(canonical_table_name(&tables, "USERS"), "users");
        assert_eq!(canonical_table_name(&tables, "customers"), "customers");
    }

    #[test]
    fn test_type_info_rows_are_complete() {
        let rows = type_info_rows();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row.contains_key("TYPE_NAME")));
    }
}
