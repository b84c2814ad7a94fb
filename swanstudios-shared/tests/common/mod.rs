//! Shared helpers for database-backed integration tests
//!
//! Tests run against `DATABASE_URL` (a `.env` file is honoured). When it is
//! not set the DB tests return early so `cargo test` still works offline.

#![allow(dead_code)]

use sqlx::PgPool;
use swanstudios_shared::db::migrations::{ensure_database_exists, run_migrations};
use swanstudios_shared::db::pool::{create_pool, DatabaseConfig};
use swanstudios_shared::models::user::{CreateUser, User, UserRole};
use uuid::Uuid;

/// Connected, migrated pool, or None when no database is configured
pub async fn test_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;

    ensure_database_exists(&url)
        .await
        .expect("Failed to create test database");

    let pool = create_pool(DatabaseConfig {
        max_connections: 5,
        min_connections: 1,
        ..DatabaseConfig::from_url(url)
    })
    .await
    .expect("Failed to create pool");

    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

/// Inserts a user with a unique email
pub async fn create_user(pool: &PgPool, role: UserRole, credits: i32) -> User {
    let user = User::create(
        pool,
        CreateUser {
            email: format!("test-{}@swanstudios.test", Uuid::new_v4()),
            password_hash: "$argon2id$v=19$m=65536,t=3,p=4$c2FsdA$aGFzaA".to_string(),
            first_name: "Test".to_string(),
            last_name: role.as_str().to_string(),
            phone: None,
            role,
        },
    )
    .await
    .expect("Failed to create user");

    if credits > 0 {
        User::add_session_credits(pool, user.id, credits)
            .await
            .expect("Failed to add credits");
    }

    User::find_by_id(pool, user.id)
        .await
        .expect("Failed to reload user")
        .expect("User vanished")
}
