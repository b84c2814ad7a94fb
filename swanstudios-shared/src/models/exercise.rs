/// Exercise library model
///
/// Names are unique among live rows (case-insensitive); a soft-deleted
/// exercise frees its name for reuse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "exercise_difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub primary_muscles: Vec<String>,
    pub equipment: Vec<String>,
    pub instructions: Vec<String>,
    pub video_url: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExercise {
    pub name: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub primary_muscles: Vec<String>,
    pub equipment: Vec<String>,
    pub instructions: Vec<String>,
    pub video_url: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateExercise {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub primary_muscles: Option<Vec<String>>,
    pub equipment: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub video_url: Option<Option<String>>,
}

/// Library search
#[derive(Debug, Clone, Default)]
pub struct ExerciseQuery {
    /// Case-insensitive substring of the name
    pub search: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub limit: i64,
    pub offset: i64,
}

const EXERCISE_COLUMNS: &str = "id, name, description, category, difficulty, primary_muscles, \
     equipment, instructions, video_url, created_by, created_at, updated_at, deleted_at";

/// Escapes `%`, `_` and `\` for use inside an ILIKE pattern
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Exercise {
    pub async fn create<'e, E>(executor: E, data: CreateExercise) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO exercises
                (name, description, category, difficulty, primary_muscles, equipment, instructions, video_url, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {EXERCISE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Exercise>(&query)
            .bind(data.name)
            .bind(data.description)
            .bind(data.category)
            .bind(data.difficulty)
            .bind(data.primary_muscles)
            .bind(data.equipment)
            .bind(data.instructions)
            .bind(data.video_url)
            .bind(data.created_by)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = $1 AND deleted_at IS NULL"
        );

        sqlx::query_as::<_, Exercise>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Searches live exercises, alphabetical by name
    pub async fn list<'e, E>(executor: E, q: &ExerciseQuery) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            SELECT {EXERCISE_COLUMNS}
            FROM exercises
            WHERE deleted_at IS NULL
              AND ($1::text IS NULL OR name ILIKE $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::exercise_difficulty IS NULL OR difficulty = $3)
            ORDER BY name ASC
            LIMIT $4 OFFSET $5
            "#
        );

        sqlx::query_as::<_, Exercise>(&query)
            .bind(q.search.as_deref().map(like_pattern))
            .bind(q.category.as_deref())
            .bind(q.difficulty)
            .bind(q.limit)
            .bind(q.offset)
            .fetch_all(executor)
            .await
    }

    /// Counts rows matching the same filters as [`Exercise::list`]
    pub async fn count<'e, E>(executor: E, q: &ExerciseQuery) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM exercises
            WHERE deleted_at IS NULL
              AND ($1::text IS NULL OR name ILIKE $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::exercise_difficulty IS NULL OR difficulty = $3)
            "#,
        )
        .bind(q.search.as_deref().map(like_pattern))
        .bind(q.category.as_deref())
        .bind(q.difficulty)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateExercise,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (video_set, video_url) = match data.video_url {
            Some(v) => (true, v),
            None => (false, None),
        };

        let query = format!(
            r#"
            UPDATE exercises SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                difficulty = COALESCE($5, difficulty),
                primary_muscles = COALESCE($6, primary_muscles),
                equipment = COALESCE($7, equipment),
                instructions = COALESCE($8, instructions),
                video_url = CASE WHEN $9 THEN $10 ELSE video_url END,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {EXERCISE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Exercise>(&query)
            .bind(id)
            .bind(data.name)
            .bind(data.description)
            .bind(data.category)
            .bind(data.difficulty)
            .bind(data.primary_muscles)
            .bind(data.equipment)
            .bind(data.instructions)
            .bind(video_set)
            .bind(video_url)
            .fetch_optional(executor)
            .await
    }

    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE exercises SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
