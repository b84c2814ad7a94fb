/// Logged workouts
///
/// `client_ref` is an optional idempotency key the offline gateway sends
/// when replaying a queued write. `(user_id, client_ref)` is unique, so a
/// replay of an already-stored workout returns the existing row instead of
/// inserting a duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Workout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub performed_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,

    /// Free-form exercise entries (sets, reps, weight...)
    pub exercises: serde_json::Value,

    pub notes: Option<String>,
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkout {
    pub user_id: Uuid,
    pub title: String,
    pub performed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub exercises: serde_json::Value,
    pub notes: Option<String>,
    pub client_ref: Option<String>,
}

const WORKOUT_COLUMNS: &str =
    "id, user_id, title, performed_at, duration_minutes, exercises, notes, client_ref, created_at";

impl Workout {
    /// Inserts a workout
    ///
    /// Returns `(workout, created)`. When `client_ref` matches an existing
    /// row for the user nothing is written and `created` is false.
    pub async fn create_idempotent(
        conn: &mut sqlx::PgConnection,
        data: CreateWorkout,
    ) -> Result<(Self, bool), sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO workouts (user_id, title, performed_at, duration_minutes, exercises, notes, client_ref)
            VALUES ($1, $2, COALESCE($3, NOW()), $4, $5, $6, $7)
            ON CONFLICT (user_id, client_ref) DO NOTHING
            RETURNING {WORKOUT_COLUMNS}
            "#
        );

        let inserted = sqlx::query_as::<_, Workout>(&query)
            .bind(data.user_id)
            .bind(&data.title)
            .bind(data.performed_at)
            .bind(data.duration_minutes)
            .bind(&data.exercises)
            .bind(&data.notes)
            .bind(&data.client_ref)
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(workout) = inserted {
            return Ok((workout, true));
        }

        // Conflict is only possible with a client_ref
        let client_ref = data.client_ref.as_deref().unwrap_or_default();
        let existing = Self::find_by_client_ref(&mut *conn, data.user_id, client_ref)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        Ok((existing, false))
    }

    pub async fn find_by_client_ref<'e, E>(
        executor: E,
        user_id: Uuid,
        client_ref: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE user_id = $1 AND client_ref = $2"
        );

        sqlx::query_as::<_, Workout>(&query)
            .bind(user_id)
            .bind(client_ref)
            .fetch_optional(executor)
            .await
    }

    /// A user's workouts, most recent first
    pub async fn list_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            SELECT {WORKOUT_COLUMNS}
            FROM workouts
            WHERE user_id = $1
            ORDER BY performed_at DESC
            LIMIT $2 OFFSET $3
            "#
        );

        sqlx::query_as::<_, Workout>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }
}
