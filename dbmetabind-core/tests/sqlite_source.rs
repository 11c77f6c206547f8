//! SQLite source integration tests.
//!
//! This test suite covers:
//! - Identity and fingerprint of an SQLite connection
//! - Table, column, key and index rows bound into a snapshot
//! - Built-in suppressions and unsupported categories
//! - Verification and schema validation of the resulting snapshot
//!
//! Note: SQLite tests use in-memory databases, so no containers are needed.

#![cfg(feature = "sqlite")]

use dbmetabind_core::{
    Aggregator, BestRowScope, CategoryId, ColumnNullability, KeyRule, MetadataSource,
    PseudoColumnKind, Result, SuppressionTable, models::CategoryStatus, source::SqliteSource,
    validate_snapshot_output, verify,
};
use sqlx::sqlite::SqlitePoolOptions;

/// Creates an in-memory database from a list of statements
async fn create_source_with(statements: &[&str]) -> SqliteSource {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    for statement in statements {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }

    SqliteSource::from_pool(pool)
}

/// Creates an in-memory database with a small schema
async fn create_source() -> SqliteSource {
    create_source_with(&[
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email VARCHAR(255))",
        "CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            total REAL DEFAULT 0
        )",
        "CREATE UNIQUE INDEX idx_users_email ON users(email)",
        "CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100",
    ])
    .await
}

fn table_names(snapshot: &dbmetabind_core::MetadataSnapshot) -> Vec<&str> {
    snapshot
        .tables
        .iter()
        .map(|table| table.table_name.as_deref().unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn test_sqlite_identity() -> Result<()> {
    let source = create_source().await;
    let identity = source.identity().await.unwrap();
    let fingerprint = identity.fingerprint()?;

    assert_eq!(fingerprint.product_name(), "SQLite");
    assert!(fingerprint.product_version().starts_with('3'));
    assert!(fingerprint.driver_version().is_some());
    Ok(())
}

#[tokio::test]
async fn test_sqlite_collection() -> Result<()> {
    let source = create_source().await;
    let collected = Aggregator::new(SuppressionTable::builtin()?)
        .collect(&source)
        .await?;
    let snapshot = &collected.snapshot;

    assert_eq!(table_names(snapshot), vec!["big_orders", "orders", "users"]);
    assert_eq!(snapshot.tables[0].table_type.as_deref(), Some("VIEW"));

    let users = &snapshot.tables[2];
    assert_eq!(users.columns.len(), 3);
    assert_eq!(users.primary_keys.len(), 1);
    assert_eq!(
        users.columns[1].nullability()?,
        Some(ColumnNullability::NoNulls)
    );
    assert_eq!(
        users.columns[2].nullability()?,
        Some(ColumnNullability::Nullable)
    );
    assert!(
        users
            .indices
            .iter()
            .any(|index| index.index_name.as_deref() == Some("idx_users_email")
                && index.non_unique == Some(false))
    );

    let orders = &snapshot.tables[1];
    assert_eq!(orders.foreign_keys.len(), 1);
    assert_eq!(orders.foreign_keys[0].delete_rule()?, Some(KeyRule::Cascade));
    assert_eq!(
        orders.foreign_keys[0].pktable_name.as_deref(),
        Some("users")
    );

    assert!(snapshot.unattached.is_empty());
    assert!(snapshot.properties.is_some());
    assert_eq!(snapshot.type_info.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_table_types_and_best_row_identifiers() -> Result<()> {
    let source = create_source_with(&[
        "CREATE TABLE accounts (region TEXT, number INTEGER, PRIMARY KEY (region, number))",
        "CREATE TABLE events (payload TEXT)",
    ])
    .await;
    let collected = Aggregator::new(SuppressionTable::builtin()?)
        .collect(&source)
        .await?;
    let snapshot = &collected.snapshot;

    let table_types: Vec<_> = snapshot
        .table_types
        .iter()
        .filter_map(|table_type| table_type.table_type.as_deref())
        .collect();
    assert_eq!(table_types, vec!["TABLE", "VIEW"]);

    let accounts = &snapshot.tables[0];
    let key_columns: Vec<_> = accounts
        .best_row_identifiers
        .iter()
        .filter_map(|identifier| identifier.column_name.as_deref())
        .collect();
    assert_eq!(key_columns, vec!["region", "number"]);
    assert_eq!(
        accounts.best_row_identifiers[0].pseudo_column_kind()?,
        Some(PseudoColumnKind::NotPseudo)
    );

    let events = &snapshot.tables[1];
    assert_eq!(events.best_row_identifiers.len(), 1);
    assert_eq!(
        events.best_row_identifiers[0].column_name.as_deref(),
        Some("rowid")
    );
    assert_eq!(
        events.best_row_identifiers[0].best_row_scope()?,
        Some(BestRowScope::Session)
    );
    assert_eq!(
        events.best_row_identifiers[0].pseudo_column_kind()?,
        Some(PseudoColumnKind::Pseudo)
    );

    assert!(matches!(
        snapshot
            .report(CategoryId::ColumnPrivileges)
            .map(|report| &report.status),
        Some(CategoryStatus::Unsupported { .. })
    ));
    for category in [
        CategoryId::VersionColumns,
        CategoryId::PseudoColumns,
        CategoryId::ClientInfoProperties,
    ] {
        assert_eq!(
            snapshot.report(category).map(|report| &report.status),
            Some(&CategoryStatus::Collected { records: 0 })
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_sqlite_tables_with_sqlite_like_names_are_kept() -> Result<()> {
    let source = create_source_with(&[
        "CREATE TABLE sqlitestats (id INTEGER)",
        "CREATE TABLE users (id INTEGER)",
        "CREATE INDEX idx_sqlitestats_id ON sqlitestats(id)",
    ])
    .await;
    let collected = Aggregator::default().collect(&source).await?;
    let snapshot = &collected.snapshot;

    assert_eq!(table_names(snapshot), vec!["sqlitestats", "users"]);
    assert_eq!(snapshot.tables[0].columns.len(), 1);
    assert_eq!(snapshot.tables[0].indices.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_foreign_key_target_ignores_case() -> Result<()> {
    let source = create_source_with(&[
        "CREATE TABLE users (id INTEGER PRIMARY KEY)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES Users(id))",
    ])
    .await;
    let collected = Aggregator::new(SuppressionTable::builtin()?)
        .collect(&source)
        .await?;

    let orders = &collected.snapshot.tables[0];
    assert_eq!(
        orders.foreign_keys[0].pktable_name.as_deref(),
        Some("users")
    );
    assert!(verify(&collected.snapshot).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sqlite_writable_pool_is_not_read_only() -> Result<()> {
    let source = create_source().await;
    let collected = Aggregator::default().collect(&source).await?;
    assert_eq!(
        collected
            .snapshot
            .properties
            .as_ref()
            .and_then(|properties| properties.read_only),
        Some(false)
    );

    let source = create_source().await.with_read_only(true);
    let collected = Aggregator::default().collect(&source).await?;
    assert_eq!(
        collected
            .snapshot
            .properties
            .as_ref()
            .and_then(|properties| properties.read_only),
        Some(true)
    );
    Ok(())
}

#[tokio::test]
async fn test_sqlite_suppressed_and_unsupported_categories() -> Result<()> {
    let source = create_source().await;
    let collected = Aggregator::new(SuppressionTable::builtin()?)
        .collect(&source)
        .await?;
    let snapshot = &collected.snapshot;

    for category in [CategoryId::Procedures, CategoryId::ProcedureColumns] {
        assert!(matches!(
            snapshot.report(category).map(|report| &report.status),
            Some(CategoryStatus::Skipped { .. })
        ));
    }
    for category in [
        CategoryId::Privileges,
        CategoryId::ColumnPrivileges,
        CategoryId::Functions,
    ] {
        assert!(matches!(
            snapshot.report(category).map(|report| &report.status),
            Some(CategoryStatus::Unsupported { .. })
        ));
    }
    assert!(collected.suppressions.is_category_suppressed(CategoryId::Procedures));
    Ok(())
}

#[tokio::test]
async fn test_sqlite_snapshot_verifies_and_validates() -> Result<()> {
    let source = create_source().await;
    let collected = Aggregator::new(SuppressionTable::builtin()?)
        .collect(&source)
        .await?;

    assert!(verify(&collected.snapshot).is_empty());

    let value = serde_json::to_value(&collected.snapshot).unwrap();
    assert!(validate_snapshot_output(&value).is_ok());
    Ok(())
}

#[tokio::test]
async fn test_sqlite_file_database_is_read_only() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metadata.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true),
        )
        .await
        .unwrap();
    sqlx::query("CREATE TABLE items (id INTEGER PRIMARY KEY)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let source = SqliteSource::connect(&format!("sqlite://{}", path.display())).await?;
    assert!(!source.is_in_memory());

    let collected = Aggregator::default().collect(&source).await?;
    assert_eq!(collected.snapshot.tables.len(), 1);
    assert_eq!(
        collected
            .snapshot
            .properties
            .as_ref()
            .and_then(|properties| properties.read_only),
        Some(true)
    );

    source.close().await;
    Ok(())
}
