/// Storefront session packages
///
/// - `GET    /api/storefront` - active packages, public
/// - `GET    /api/admin/storefront` - every live package
/// - `POST   /api/admin/storefront`
/// - `PUT    /api/admin/storefront/:id`
/// - `DELETE /api/admin/storefront/:id`
/// - `POST   /api/admin/storefront/:id/grant` - credit a client with the package's sessions

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
};
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use swanstudios_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::{
        storefront::{format_cents, CreateStorefrontItem, PackageType, StorefrontItem, UpdateStorefrontItem},
        user::{User, UserRole},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub item_type: PackageType,

    #[validate(range(min = 1, message = "Sessions must be at least 1"))]
    pub sessions: i32,

    /// Cents
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_per_session: i64,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,
    pub item_type: Option<PackageType>,

    #[validate(range(min = 1, message = "Sessions must be at least 1"))]
    pub sessions: Option<i32>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_per_session: Option<i64>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub client_id: Uuid,
}

/// Package with display prices
#[derive(Debug, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: StorefrontItem,
    pub display_price: String,
    pub display_price_per_session: String,
}

impl From<StorefrontItem> for ItemView {
    fn from(item: StorefrontItem) -> Self {
        Self {
            display_price: format_cents(item.total_cost),
            display_price_per_session: format_cents(item.price_per_session),
            item,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub message: String,
    pub client_id: Uuid,
    pub sessions_added: i32,
    pub available_sessions: i32,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Package not found".to_string())
}

pub async fn list_active(State(state): State<AppState>) -> ApiResult<Json<Vec<ItemView>>> {
    let items = StorefrontItem::list(&state.db, true).await?;
    Ok(Json(items.into_iter().map(ItemView::from).collect()))
}

pub async fn list_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ItemView>>> {
    require_admin(&auth)?;

    let items = StorefrontItem::list(&state.db, false).await?;
    Ok(Json(items.into_iter().map(ItemView::from).collect()))
}

pub async fn create_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateItemRequest>,
) -> ApiResult<(StatusCode, Json<ItemView>)> {
    require_admin(&auth)?;
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let item = StorefrontItem::create(
        &mut *tx,
        CreateStorefrontItem {
            name: req.name.trim().to_string(),
            description: req.description,
            item_type: req.item_type,
            sessions: req.sessions,
            price_per_session: req.price_per_session,
            is_active: req.is_active,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(item_id = %item.id, name = %item.name, "Storefront package created");
    Ok((StatusCode::CREATED, Json(item.into())))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> ApiResult<Json<ItemView>> {
    require_admin(&auth)?;
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let item = StorefrontItem::update(
        &mut *tx,
        id,
        UpdateStorefrontItem {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
            item_type: req.item_type,
            sessions: req.sessions,
            price_per_session: req.price_per_session,
            is_active: req.is_active,
        },
    )
    .await?
    .ok_or_else(not_found)?;
    tx.commit().await?;

    Ok(Json(item.into()))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Value>> {
    require_admin(&auth)?;

    let mut tx = state.db.begin().await?;
    if !StorefrontItem::soft_delete(&mut *tx, id).await? {
        return Err(not_found());
    }
    tx.commit().await?;

    Ok(Json(json!({ "message": "Package deleted", "id": id })))
}

/// Adds a package's sessions to a client's balance
///
/// Stands in for checkout, which is handled outside this service.
pub async fn grant_package(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<GrantRequest>,
) -> ApiResult<Json<GrantResponse>> {
    require_admin(&auth)?;

    let mut tx = state.db.begin().await?;

    let item = StorefrontItem::find_by_id(&mut *tx, id).await?.ok_or_else(not_found)?;

    let client = User::find_by_id(&mut *tx, req.client_id)
        .await?
        .ok_or_else(|| ApiError::invalid("client_id", "Client not found"))?;
    if client.role != UserRole::Client {
        return Err(ApiError::invalid("client_id", "User is not a client"));
    }

    User::add_session_credits(&mut *tx, client.id, item.sessions).await?;

    let available_sessions = User::find_by_id(&mut *tx, client.id)
        .await?
        .map(|u| u.available_sessions)
        .unwrap_or_default();

    tx.commit().await?;

    tracing::info!(
        item_id = %item.id,
        client_id = %client.id,
        sessions = item.sessions,
        admin_id = %auth.user_id,
        "Package granted"
    );

    Ok(Json(GrantResponse {
        message: format!("Added {} sessions from {}", item.sessions, item.name),
        client_id: client.id,
        sessions_added: item.sessions,
        available_sessions,
    }))
}
