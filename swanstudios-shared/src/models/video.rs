/// Instructional video model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub exercise_id: Option<Uuid>,
    pub duration_seconds: Option<i32>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVideo {
    pub title: String,
    pub url: String,
    pub exercise_id: Option<Uuid>,
    pub duration_seconds: Option<i32>,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVideo {
    pub title: Option<String>,
    pub url: Option<String>,
    pub exercise_id: Option<Option<Uuid>>,
    pub duration_seconds: Option<Option<i32>>,
    pub is_public: Option<bool>,
}

const VIDEO_COLUMNS: &str =
    "id, title, url, exercise_id, duration_seconds, is_public, created_at, updated_at, deleted_at";

impl Video {
    pub async fn create<'e, E>(executor: E, data: CreateVideo) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO videos (title, url, exercise_id, duration_seconds, is_public)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {VIDEO_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Video>(&query)
            .bind(data.title)
            .bind(data.url)
            .bind(data.exercise_id)
            .bind(data.duration_seconds)
            .bind(data.is_public)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1 AND deleted_at IS NULL");

        sqlx::query_as::<_, Video>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists live videos, newest first
    ///
    /// `public_only` restricts to `is_public` rows for anonymous callers.
    pub async fn list<'e, E>(
        executor: E,
        public_only: bool,
        exercise_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM videos
            WHERE deleted_at IS NULL
              AND (NOT $1 OR is_public)
              AND ($2::uuid IS NULL OR exercise_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        );

        sqlx::query_as::<_, Video>(&query)
            .bind(public_only)
            .bind(exercise_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateVideo,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (exercise_set, exercise_id) = match data.exercise_id {
            Some(v) => (true, v),
            None => (false, None),
        };
        let (duration_set, duration_seconds) = match data.duration_seconds {
            Some(v) => (true, v),
            None => (false, None),
        };

        let query = format!(
            r#"
            UPDATE videos SET
                title = COALESCE($2, title),
                url = COALESCE($3, url),
                exercise_id = CASE WHEN $4 THEN $5 ELSE exercise_id END,
                duration_seconds = CASE WHEN $6 THEN $7 ELSE duration_seconds END,
                is_public = COALESCE($8, is_public),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {VIDEO_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Video>(&query)
            .bind(id)
            .bind(data.title)
            .bind(data.url)
            .bind(exercise_set)
            .bind(exercise_id)
            .bind(duration_set)
            .bind(duration_seconds)
            .bind(data.is_public)
            .fetch_optional(executor)
            .await
    }

    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE videos SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
