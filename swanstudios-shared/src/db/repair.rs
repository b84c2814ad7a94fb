/// Idempotent schema repair
///
/// Databases created before a migration existed, or patched by hand, can be
/// missing columns the code relies on. Repair inspects
/// `information_schema`, then in one transaction adds missing columns,
/// creates missing indexes and upserts the seed storefront packages. Running
/// it twice is a no-op the second time.
///
/// Identifiers are validated before being interpolated into DDL; nothing
/// user-supplied ever reaches these statements.
///
/// # Example
///
/// ```no_run
/// use swanstudios_shared::db::repair::{repair, RepairOptions};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let report = repair(&pool, RepairOptions { dry_run: true }).await?;
/// for column in &report.missing_columns {
///     println!("missing: {}", column);
/// }
/// # Ok(())
/// # }
/// ```

use std::collections::HashSet;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::models::storefront::PackageType;

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Unsafe column definition for {0}")]
    UnsafeDefinition(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A column the application expects to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedColumn {
    pub table: &'static str,
    pub column: &'static str,

    /// Type and constraints used by `ADD COLUMN`
    pub definition: &'static str,
}

impl ExpectedColumn {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// An index the application expects to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedIndex {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

/// A storefront package every install should offer
#[derive(Debug, Clone, Copy)]
pub struct SeedPackage {
    pub name: &'static str,
    pub description: &'static str,
    pub item_type: PackageType,
    pub sessions: i32,

    /// Cents
    pub price_per_session: i64,
}

macro_rules! col {
    ($table:literal, $column:literal, $definition:literal) => {
        ExpectedColumn {
            table: $table,
            column: $column,
            definition: $definition,
        }
    };
}

/// Columns that have historically gone missing on drifted databases
pub const EXPECTED_COLUMNS: &[ExpectedColumn] = &[
    col!("users", "phone", "VARCHAR(40)"),
    col!("users", "available_sessions", "INTEGER NOT NULL DEFAULT 0"),
    col!("users", "last_login_at", "TIMESTAMPTZ"),
    col!("users", "deleted_at", "TIMESTAMPTZ"),
    col!("sessions", "end_date", "TIMESTAMPTZ"),
    col!("sessions", "duration", "INTEGER NOT NULL DEFAULT 60"),
    col!("sessions", "location", "VARCHAR(255) NOT NULL DEFAULT 'Main Studio'"),
    col!("sessions", "session_type", "VARCHAR(100) NOT NULL DEFAULT 'Standard Training'"),
    col!("sessions", "notes", "TEXT NOT NULL DEFAULT ''"),
    col!("sessions", "private_notes", "TEXT"),
    col!("sessions", "booking_date", "TIMESTAMPTZ"),
    col!("sessions", "session_deducted", "BOOLEAN NOT NULL DEFAULT FALSE"),
    col!("sessions", "deduction_date", "TIMESTAMPTZ"),
    col!("sessions", "cancelled_by", "UUID REFERENCES users(id) ON DELETE SET NULL"),
    col!("sessions", "cancellation_reason", "TEXT"),
    col!("sessions", "cancellation_date", "TIMESTAMPTZ"),
    col!("sessions", "deleted_at", "TIMESTAMPTZ"),
    col!("exercises", "video_url", "VARCHAR(1024)"),
    col!("exercises", "deleted_at", "TIMESTAMPTZ"),
    col!("videos", "is_public", "BOOLEAN NOT NULL DEFAULT FALSE"),
    col!("videos", "deleted_at", "TIMESTAMPTZ"),
    col!("contacts", "viewed_at", "TIMESTAMPTZ"),
    col!("contacts", "deleted_at", "TIMESTAMPTZ"),
    col!("storefront_items", "is_active", "BOOLEAN NOT NULL DEFAULT TRUE"),
    col!("storefront_items", "deleted_at", "TIMESTAMPTZ"),
    col!("workouts", "client_ref", "VARCHAR(100)"),
];

pub const EXPECTED_INDEXES: &[ExpectedIndex] = &[
    ExpectedIndex {
        name: "idx_sessions_date",
        table: "sessions",
        columns: &["session_date"],
        unique: false,
    },
    ExpectedIndex {
        name: "idx_sessions_client",
        table: "sessions",
        columns: &["client_id"],
        unique: false,
    },
    ExpectedIndex {
        name: "idx_sessions_trainer",
        table: "sessions",
        columns: &["trainer_id"],
        unique: false,
    },
    ExpectedIndex {
        name: "idx_sessions_status",
        table: "sessions",
        columns: &["status"],
        unique: false,
    },
    ExpectedIndex {
        name: "idx_gamification_events_user",
        table: "gamification_events",
        columns: &["user_id", "created_at"],
        unique: false,
    },
    ExpectedIndex {
        name: "storefront_items_name_key",
        table: "storefront_items",
        columns: &["name"],
        unique: true,
    },
    ExpectedIndex {
        name: "workouts_user_id_client_ref_key",
        table: "workouts",
        columns: &["user_id", "client_ref"],
        unique: true,
    },
];

pub const SEED_PACKAGES: &[SeedPackage] = &[
    SeedPackage {
        name: "Single Session",
        description: "One personal training session",
        item_type: PackageType::Fixed,
        sessions: 1,
        price_per_session: 17_500,
    },
    SeedPackage {
        name: "Silver Package",
        description: "8 personal training sessions",
        item_type: PackageType::Fixed,
        sessions: 8,
        price_per_session: 17_000,
    },
    SeedPackage {
        name: "Gold Package",
        description: "20 personal training sessions",
        item_type: PackageType::Fixed,
        sessions: 20,
        price_per_session: 16_500,
    },
    SeedPackage {
        name: "Platinum Package",
        description: "50 personal training sessions",
        item_type: PackageType::Fixed,
        sessions: 50,
        price_per_session: 16_000,
    },
    SeedPackage {
        name: "3-Month Commitment",
        description: "Three sessions a week for three months",
        item_type: PackageType::Monthly,
        sessions: 36,
        price_per_session: 15_500,
    },
    SeedPackage {
        name: "6-Month Commitment",
        description: "Three sessions a week for six months",
        item_type: PackageType::Monthly,
        sessions: 72,
        price_per_session: 15_000,
    },
];

/// Accepts lowercase Postgres identifiers: `[a-z_][a-z0-9_]*`, at most 63 bytes
pub fn validate_identifier(ident: &str) -> Result<&str, RepairError> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_start && valid_rest && ident.len() <= 63 {
        Ok(ident)
    } else {
        Err(RepairError::InvalidIdentifier(ident.to_string()))
    }
}

fn validate_definition(column: &ExpectedColumn) -> Result<(), RepairError> {
    if column.definition.contains(';') || column.definition.contains("--") {
        return Err(RepairError::UnsafeDefinition(column.qualified()));
    }
    Ok(())
}

/// `ALTER TABLE ... ADD COLUMN IF NOT EXISTS ...`
pub fn add_column_sql(column: &ExpectedColumn) -> Result<String, RepairError> {
    validate_definition(column)?;
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
        validate_identifier(column.table)?,
        validate_identifier(column.column)?,
        column.definition
    ))
}

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS ...`
pub fn create_index_sql(index: &ExpectedIndex) -> Result<String, RepairError> {
    let columns = index
        .columns
        .iter()
        .map(|c| validate_identifier(c))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");

    Ok(format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        validate_identifier(index.name)?,
        validate_identifier(index.table)?,
        columns
    ))
}

/// What the database currently has
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    pub tables: HashSet<String>,
    pub columns: HashSet<(String, String)>,
    pub indexes: HashSet<String>,
}

/// What repair would change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    pub missing_columns: Vec<ExpectedColumn>,
    pub missing_indexes: Vec<ExpectedIndex>,

    /// Tables that don't exist at all; their columns can't be repaired
    pub missing_tables: Vec<&'static str>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.missing_columns.is_empty() && self.missing_indexes.is_empty()
    }
}

/// Compares a snapshot against the expected schema
pub fn plan(snapshot: &SchemaSnapshot) -> RepairPlan {
    let mut result = RepairPlan::default();

    for column in EXPECTED_COLUMNS {
        if !snapshot.tables.contains(column.table) {
            if !result.missing_tables.contains(&column.table) {
                result.missing_tables.push(column.table);
            }
            continue;
        }

        let key = (column.table.to_string(), column.column.to_string());
        if !snapshot.columns.contains(&key) {
            result.missing_columns.push(*column);
        }
    }

    for index in EXPECTED_INDEXES {
        if snapshot.tables.contains(index.table) && !snapshot.indexes.contains(index.name) {
            result.missing_indexes.push(*index);
        }
    }

    result
}

/// Reads tables, columns and index names from the public schema
pub async fn inspect(pool: &PgPool) -> Result<SchemaSnapshot, sqlx::Error> {
    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'public'",
    )
    .fetch_all(pool)
    .await?;

    let columns: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name::text, column_name::text FROM information_schema.columns WHERE table_schema = 'public'",
    )
    .fetch_all(pool)
    .await?;

    let indexes: Vec<(String,)> =
        sqlx::query_as("SELECT indexname::text FROM pg_indexes WHERE schemaname = 'public'")
            .fetch_all(pool)
            .await?;

    Ok(SchemaSnapshot {
        tables: tables.into_iter().map(|(t,)| t).collect(),
        columns: columns.into_iter().collect(),
        indexes: indexes.into_iter().map(|(i,)| i).collect(),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RepairOptions {
    /// Report only; change nothing
    pub dry_run: bool,
}

/// Outcome of a repair run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub dry_run: bool,
    pub checked_columns: usize,
    pub missing_columns: Vec<String>,
    pub added_columns: Vec<String>,
    pub missing_indexes: Vec<String>,
    pub created_indexes: Vec<String>,
    pub seeded_packages: Vec<String>,
    pub missing_tables: Vec<String>,
}

impl RepairReport {
    /// True when every expected column now exists (or would, for dry runs)
    pub fn is_success(&self) -> bool {
        self.missing_tables.is_empty()
            && (self.dry_run || self.added_columns.len() == self.missing_columns.len())
    }

    /// Report skeleton for a plan, before anything is applied
    pub fn planned(plan: &RepairPlan, dry_run: bool) -> Self {
        RepairReport {
            dry_run,
            checked_columns: EXPECTED_COLUMNS.len(),
            missing_columns: plan.missing_columns.iter().map(|c| c.qualified()).collect(),
            missing_indexes: plan.missing_indexes.iter().map(|i| i.name.to_string()).collect(),
            missing_tables: plan.missing_tables.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }
}

/// Runs the repair
///
/// All writes happen in a single transaction; any failure rolls everything
/// back.
pub async fn repair(pool: &PgPool, options: RepairOptions) -> Result<RepairReport, RepairError> {
    let snapshot = inspect(pool).await?;
    let plan = plan(&snapshot);

    let mut report = RepairReport::planned(&plan, options.dry_run);

    for table in &plan.missing_tables {
        warn!(table, "Table missing; run migrations first");
    }

    // Build every statement first so a bad identifier aborts before any write
    let column_sql = plan
        .missing_columns
        .iter()
        .map(|c| add_column_sql(c).map(|sql| (c.qualified(), sql)))
        .collect::<Result<Vec<_>, _>>()?;
    let index_sql = plan
        .missing_indexes
        .iter()
        .map(|i| create_index_sql(i).map(|sql| (i.name.to_string(), sql)))
        .collect::<Result<Vec<_>, _>>()?;

    if options.dry_run {
        info!(
            missing_columns = column_sql.len(),
            missing_indexes = index_sql.len(),
            "Dry run; no changes made"
        );
        return Ok(report);
    }

    let mut tx = pool.begin().await?;

    for (name, sql) in column_sql {
        sqlx::query(&sql).execute(&mut *tx).await?;
        info!(column = %name, "Added column");
        report.added_columns.push(name);
    }

    for (name, sql) in index_sql {
        sqlx::query(&sql).execute(&mut *tx).await?;
        info!(index = %name, "Created index");
        report.created_indexes.push(name);
    }

    if snapshot.tables.contains("storefront_items") {
        for package in SEED_PACKAGES {
            sqlx::query(
                r#"
                INSERT INTO storefront_items (name, description, item_type, sessions, price_per_session, is_active)
                VALUES ($1, $2, $3, $4, $5, TRUE)
                ON CONFLICT (name) DO UPDATE SET
                    description = EXCLUDED.description,
                    item_type = EXCLUDED.item_type,
                    sessions = EXCLUDED.sessions,
                    price_per_session = EXCLUDED.price_per_session,
                    updated_at = NOW()
                "#,
            )
            .bind(package.name)
            .bind(package.description)
            .bind(package.item_type)
            .bind(package.sessions)
            .bind(package.price_per_session)
            .execute(&mut *tx)
            .await?;

            report.seeded_packages.push(package.name.to_string());
        }
    }

    tx.commit().await?;

    info!(
        added_columns = report.added_columns.len(),
        created_indexes = report.created_indexes.len(),
        seeded_packages = report.seeded_packages.len(),
        "Schema repair committed"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_snapshot() -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::default();
        for c in EXPECTED_COLUMNS {
            snapshot.tables.insert(c.table.to_string());
            snapshot.columns.insert((c.table.to_string(), c.column.to_string()));
        }
        for i in EXPECTED_INDEXES {
            snapshot.tables.insert(i.table.to_string());
            snapshot.indexes.insert(i.name.to_string());
        }
        snapshot
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("sessions").is_ok());
        assert!(validate_identifier("_private2").is_ok());
        assert!(validate_identifier("Users").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("users; DROP TABLE users").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_all_expected_identifiers_are_valid() {
        for c in EXPECTED_COLUMNS {
            assert!(add_column_sql(c).is_ok(), "{}", c.qualified());
        }
        for i in EXPECTED_INDEXES {
            assert!(create_index_sql(i).is_ok(), "{}", i.name);
        }
    }

    #[test]
    fn test_add_column_sql() {
        let sql = add_column_sql(&col!("sessions", "private_notes", "TEXT")).unwrap();
        assert_eq!(sql, "ALTER TABLE sessions ADD COLUMN IF NOT EXISTS private_notes TEXT");
    }

    #[test]
    fn test_unsafe_definition_rejected() {
        let bad = col!("users", "x", "TEXT; DROP TABLE users");
        assert!(matches!(add_column_sql(&bad), Err(RepairError::UnsafeDefinition(_))));
    }

    #[test]
    fn test_create_index_sql() {
        let sql = create_index_sql(&EXPECTED_INDEXES[6]).unwrap();
        assert_eq!(
            sql,
            "CREATE UNIQUE INDEX IF NOT EXISTS workouts_user_id_client_ref_key ON workouts (user_id, client_ref)"
        );
    }

    #[test]
    fn test_plan_on_complete_schema_is_empty() {
        let plan = plan(&full_snapshot());
        assert!(plan.is_empty());
        assert!(plan.missing_tables.is_empty());
    }

    #[test]
    fn test_plan_detects_missing_columns_and_indexes() {
        let mut snapshot = full_snapshot();
        snapshot
            .columns
            .remove(&("sessions".to_string(), "session_deducted".to_string()));
        snapshot.indexes.remove("idx_sessions_status");

        let plan = plan(&snapshot);
        assert_eq!(plan.missing_columns.len(), 1);
        assert_eq!(plan.missing_columns[0].qualified(), "sessions.session_deducted");
        assert_eq!(plan.missing_indexes.len(), 1);
        assert_eq!(plan.missing_indexes[0].name, "idx_sessions_status");
    }

    #[test]
    fn test_planned_report_lists_missing_indexes() {
        let mut snapshot = full_snapshot();
        snapshot.indexes.remove("idx_sessions_status");

        let report = RepairReport::planned(&plan(&snapshot), true);
        assert!(report.dry_run);
        assert_eq!(report.missing_indexes, vec!["idx_sessions_status".to_string()]);
        assert!(report.created_indexes.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["missing_indexes"][0], "idx_sessions_status");
    }

    #[test]
    fn test_plan_reports_missing_tables_once() {
        let mut snapshot = full_snapshot();
        snapshot.tables.remove("contacts");

        let plan = plan(&snapshot);
        assert_eq!(plan.missing_tables, vec!["contacts"]);
        assert!(plan.missing_columns.iter().all(|c| c.table != "contacts"));
    }

    #[test]
    fn test_report_success() {
        let mut report = RepairReport {
            missing_columns: vec!["users.phone".into()],
            ..Default::default()
        };
        assert!(!report.is_success());

        report.added_columns.push("users.phone".into());
        assert!(report.is_success());

        report.missing_tables.push("contacts".into());
        assert!(!report.is_success());
    }

    #[test]
    fn test_seed_packages_are_sane() {
        let mut names = HashSet::new();
        for p in SEED_PACKAGES {
            assert!(p.sessions > 0);
            assert!(p.price_per_session > 0);
            assert!(names.insert(p.name), "duplicate seed {}", p.name);
        }
    }
}
