//! Schema repair utility
//!
//! Adds columns and indexes that drifted databases are missing, and upserts
//! the default storefront packages. Every change runs in one transaction.
//!
//! Usage:
//! ```bash
//! # Show what would change
//! cargo run -p swanstudios-api --bin schema-repair -- --dry-run
//!
//! # Apply against an explicit database
//! cargo run -p swanstudios-api --bin schema-repair -- --database-url postgresql://...
//! ```
//!
//! Exits non-zero when a required table is missing or a column could not be
//! added.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::env;
use swanstudios_shared::db::{
    pool::{close_pool, create_pool, DatabaseConfig},
    repair::{repair, RepairOptions, RepairReport},
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "schema-repair",
    about = "SwanStudios schema repair",
    long_about = "Detect and add missing columns and indexes, then seed the default storefront packages"
)]
struct SchemaRepairArgs {
    /// Database URL (overrides `DATABASE_URL`)
    #[arg(long)]
    database_url: Option<String>,

    /// Report what is missing without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = SchemaRepairArgs::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    info!("=== SwanStudios Schema Repair ===");

    let database_url = args
        .database_url
        .or_else(|| env::var("DATABASE_URL").ok())
        .context("No database URL; pass --database-url or set DATABASE_URL")?;

    let pool = create_pool(DatabaseConfig {
        max_connections: 2,
        min_connections: 1,
        ..DatabaseConfig::from_url(database_url)
    })
    .await
    .context("Failed to connect to database")?;

    let result = repair(
        &pool,
        RepairOptions {
            dry_run: args.dry_run,
        },
    )
    .await;
    close_pool(pool).await;
    let report = result.context("Schema repair failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if !report.is_success() {
        bail!(
            "Schema repair incomplete: {} missing table(s)",
            report.missing_tables.len()
        );
    }

    Ok(())
}

fn print_summary(report: &RepairReport) {
    info!("Checked {} expected columns", report.checked_columns);

    if report.missing_columns.is_empty() {
        info!("No missing columns");
    } else {
        for column in &report.missing_columns {
            let state = if report.added_columns.contains(column) {
                "added"
            } else {
                "missing"
            };
            info!("  {column}: {state}");
        }
    }

    for index in &report.missing_indexes {
        let state = if report.created_indexes.contains(index) {
            "created"
        } else {
            "missing"
        };
        info!("  index {index}: {state}");
    }

    for table in &report.missing_tables {
        warn!("  table {table} does not exist; run migrations first");
    }

    if report.dry_run {
        info!("Dry run: nothing was written");
    } else {
        info!("Seeded {} storefront packages", report.seeded_packages.len());
    }

    info!("=== {} ===", if report.is_success() { "PASS" } else { "FAIL" });
}
