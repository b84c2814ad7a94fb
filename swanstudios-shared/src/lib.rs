//! # SwanStudios Shared Library
//!
//! Types, persistence and business rules shared by the API server and the
//! maintenance tools.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, JWTs, bearer middleware and role checks
//! - `db`: connection pool, migrations and schema repair
//! - `models`: database models and their queries
//! - `scheduling`: session booking, cancellation and recurrence rules
//! - `gamification`: points, levels, streaks and achievements

pub mod auth;
pub mod db;
pub mod gamification;
pub mod models;
pub mod scheduling;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
