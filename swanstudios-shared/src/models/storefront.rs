/// Storefront session packages
///
/// Prices are integer cents. `total_cost` is a generated column
/// (`sessions * price_per_session`) and is never written directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "package_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// One-off bundle of sessions
    Fixed,

    /// Sessions granted each month
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StorefrontItem {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub item_type: PackageType,
    pub sessions: i32,

    /// Cents
    pub price_per_session: i64,

    /// Cents, generated
    pub total_cost: i64,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStorefrontItem {
    pub name: String,
    pub description: String,
    pub item_type: PackageType,
    pub sessions: i32,
    pub price_per_session: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStorefrontItem {
    pub name: Option<String>,
    pub description: Option<String>,
    pub item_type: Option<PackageType>,
    pub sessions: Option<i32>,
    pub price_per_session: Option<i64>,
    pub is_active: Option<bool>,
}

const ITEM_COLUMNS: &str = "id, name, description, item_type, sessions, price_per_session, \
     total_cost, is_active, created_at, updated_at, deleted_at";

impl StorefrontItem {
    pub async fn create<'e, E>(executor: E, data: CreateStorefrontItem) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO storefront_items (name, description, item_type, sessions, price_per_session, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ITEM_COLUMNS}
            "#
        );

        sqlx::query_as::<_, StorefrontItem>(&query)
            .bind(data.name)
            .bind(data.description)
            .bind(data.item_type)
            .bind(data.sessions)
            .bind(data.price_per_session)
            .bind(data.is_active)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM storefront_items WHERE id = $1 AND deleted_at IS NULL"
        );

        sqlx::query_as::<_, StorefrontItem>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Live items, cheapest package first; `active_only` for the public catalogue
    pub async fn list<'e, E>(executor: E, active_only: bool) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM storefront_items
            WHERE deleted_at IS NULL AND (NOT $1 OR is_active)
            ORDER BY total_cost ASC, name ASC
            "#
        );

        sqlx::query_as::<_, StorefrontItem>(&query)
            .bind(active_only)
            .fetch_all(executor)
            .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateStorefrontItem,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE storefront_items SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                item_type = COALESCE($4, item_type),
                sessions = COALESCE($5, sessions),
                price_per_session = COALESCE($6, price_per_session),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {ITEM_COLUMNS}
            "#
        );

        sqlx::query_as::<_, StorefrontItem>(&query)
            .bind(id)
            .bind(data.name)
            .bind(data.description)
            .bind(data.item_type)
            .bind(data.sessions)
            .bind(data.price_per_session)
            .bind(data.is_active)
            .fetch_optional(executor)
            .await
    }

    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE storefront_items SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Formats cents as dollars, e.g. `17500` -> `"$175.00"`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}
