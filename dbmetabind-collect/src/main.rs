//! Database metadata snapshot collection tool.
//!
//! This binary connects to a database, fingerprints it, collects every
//! metadata category the suppression table allows, verifies the result and
//! writes it as a JSON snapshot.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - No credentials stored or logged
//! - Snapshots carrying connection URLs with passwords are rejected

use anyhow::{Context, bail};
use clap::Parser;
use dbmetabind_collect::{
    Cli, Command, CollectArgs, FingerprintArgs, SuppressionArgs, VerifyArgs, open_source,
    output::{load_snapshot, save_snapshot},
    run_collection,
};
use dbmetabind_core::{
    ApiConstant, BestRowScope, CategoryId, ColumnNullability, KeyDeferrability, KeyRule,
    PseudoColumnKind, ResultSetConcurrency, ResultSetHoldability, ResultSetType,
    TransactionIsolation,
    error::redact_database_url,
    logging::init_logging,
    models::CategoryStatus,
    verify,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    dbmetabind_core::initialize_schema_validator()
        .context("Failed to initialize schema validator")?;

    match &cli.command {
        Command::Collect(args) => collect_snapshot(args).await,
        Command::Fingerprint(args) => print_fingerprint(args).await,
        Command::Verify(args) => verify_snapshot(args).await,
        Command::Suppressions(args) => list_suppressions(args),
        Command::Constants => {
            list_constants();
            Ok(())
        }
    }
}

/// Collects a snapshot and saves it to file
async fn collect_snapshot(args: &CollectArgs) -> anyhow::Result<()> {
    let config = args.config();
    let output_path = args.output_path();

    info!("Starting metadata collection...");
    info!("Target: {}", redact_database_url(&args.database_url));
    info!("Output: {}", output_path.display());

    let source = open_source(&args.database_url)
        .await
        .context("Failed to open data source")?;
    let report = run_collection(source.as_ref(), &config)
        .await
        .context("Metadata collection failed")?;

    if config.fail_on_violations && report.error_count() > 0 {
        bail!(
            "Verification reported {} errors; snapshot not written",
            report.error_count()
        );
    }

    let snapshot = &report.collected.snapshot;
    save_snapshot(snapshot, &output_path, config.output_format)
        .await
        .with_context(|| format!("Failed to save snapshot to {}", output_path.display()))?;

    info!("✓ Snapshot saved to {}", output_path.display());
    println!("Metadata collection completed successfully");
    println!("Source: {}", snapshot.fingerprint);
    println!("Output: {}", output_path.display());
    println!("Tables: {}", snapshot.tables.len());
    println!("Functions: {}", snapshot.functions.len());
    println!("Procedures: {}", snapshot.procedures.len());
    for category_report in &snapshot.reports {
        match &category_report.status {
            CategoryStatus::Collected { .. } => {}
            CategoryStatus::Skipped { reason } => {
                println!("Skipped {}: {}", category_report.category, reason);
            }
            CategoryStatus::Unsupported { reason } => {
                println!("Unsupported {}: {}", category_report.category, reason);
            }
        }
    }
    if !report.collected.warnings.is_empty() {
        println!("Warnings: {}", report.collected.warnings.len());
    }
    if !report.violations.is_empty() {
        println!("Violations: {}", report.violations.len());
    }

    Ok(())
}

/// Prints the fingerprint of a source and the suppressions it resolves to
async fn print_fingerprint(args: &FingerprintArgs) -> anyhow::Result<()> {
    let source = open_source(&args.database_url)
        .await
        .context("Failed to open data source")?;
    let identity = source
        .identity()
        .await
        .context("Failed to read source identity")?;
    let fingerprint = identity.fingerprint()?;
    let suppressions = args.suppressions.config().suppressions()?.resolve(&fingerprint);

    println!("Fingerprint: {}", fingerprint);
    if let Some(driver_name) = &identity.driver_name {
        println!("Driver: {}", driver_name);
    }
    if suppressions.is_empty() {
        println!("No suppressions apply");
        return Ok(());
    }
    for category in suppressions.categories() {
        println!(
            "Suppressed category {}: {}",
            category,
            suppressions.reason(category).unwrap_or_default()
        );
    }
    for category in CategoryId::ORDER {
        for field in suppressions.fields(category) {
            println!("Suppressed field {}.{}", category, field);
        }
    }

    Ok(())
}

/// Loads a snapshot file and verifies it
async fn verify_snapshot(args: &VerifyArgs) -> anyhow::Result<()> {
    let snapshot = load_snapshot(&args.input)
        .await
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    let violations = verify(&snapshot);
    println!("Source: {}", snapshot.fingerprint);
    if violations.is_empty() {
        println!("✓ No violations");
        return Ok(());
    }

    for violation in &violations {
        println!("{}", violation);
    }
    let errors = violations.iter().filter(|v| v.is_error()).count();
    if errors > 0 {
        bail!("{} of {} violations are errors", errors, violations.len());
    }
    Ok(())
}

/// Lists the suppression rules in effect
fn list_suppressions(args: &SuppressionArgs) -> anyhow::Result<()> {
    let table = args.config().suppressions()?;
    if table.is_empty() {
        println!("No suppression rules loaded");
        return Ok(());
    }

    for rule in table.rules() {
        println!("{}", rule.pattern);
        for category in &rule.categories {
            println!("  skip {}", category);
        }
        for (category, fields) in &rule.fields {
            for field in fields {
                println!("  unset {}.{}", category, field);
            }
        }
        if let Some(reason) = &rule.reason {
            println!("  reason: {}", reason);
        }
    }
    Ok(())
}

/// Lists the database-access API constants
fn list_constants() {
    print_constant_table::<TransactionIsolation>();
    print_constant_table::<ResultSetType>();
    print_constant_table::<ResultSetConcurrency>();
    print_constant_table::<ResultSetHoldability>();
    print_constant_table::<KeyRule>();
    print_constant_table::<KeyDeferrability>();
    print_constant_table::<ColumnNullability>();
    print_constant_table::<BestRowScope>();
    print_constant_table::<PseudoColumnKind>();
}

fn print_constant_table<C: ApiConstant>() {
    println!("{}:", C::KIND);
    for variant in C::VARIANTS {
        println!("  {:>5}  {}", variant.constant(), variant.api_name());
    }
    println!();
}
