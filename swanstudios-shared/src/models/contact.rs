/// Contact form inbox

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contact_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContactPriority {
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    pub priority: ContactPriority,

    /// When an admin first opened it
    pub viewed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContact {
    pub name: String,
    pub email: String,
    pub message: String,
    pub priority: ContactPriority,
}

const CONTACT_COLUMNS: &str =
    "id, name, email, message, priority, viewed_at, created_at, updated_at, deleted_at";

impl Contact {
    pub async fn create<'e, E>(executor: E, data: CreateContact) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO contacts (name, email, message, priority)
            VALUES ($1, $2, $3, $4)
            RETURNING {CONTACT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Contact>(&query)
            .bind(data.name)
            .bind(data.email)
            .bind(data.message)
            .bind(data.priority)
            .fetch_one(executor)
            .await
    }

    /// Newest first; `unviewed_only` hides messages an admin has opened
    pub async fn list<'e, E>(
        executor: E,
        unviewed_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE deleted_at IS NULL AND (NOT $1 OR viewed_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );

        sqlx::query_as::<_, Contact>(&query)
            .bind(unviewed_only)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    /// Stamps `viewed_at` once; later calls keep the first timestamp
    pub async fn mark_viewed<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE contacts
            SET viewed_at = COALESCE(viewed_at, NOW()), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {CONTACT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Contact>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_defaults_to_normal() {
        assert_eq!(ContactPriority::default(), ContactPriority::Normal);
        let p: ContactPriority = serde_json::from_str("\"urgent\"").unwrap();
        assert_eq!(p, ContactPriority::Urgent);
    }
}
