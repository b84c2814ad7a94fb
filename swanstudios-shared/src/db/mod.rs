/// Database layer
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: embedded migration runner
/// - `repair`: idempotent column/index/seed repair for drifted databases
///
/// Models live in the crate-level `models` module.

pub mod migrations;
pub mod pool;
pub mod repair;
