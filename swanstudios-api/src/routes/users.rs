/// Admin user management
///
/// - `GET    /api/admin/users?role=&limit=&offset=`
/// - `GET    /api/admin/users/:id`
/// - `PUT    /api/admin/users/:id`
/// - `DELETE /api/admin/users/:id` (soft delete)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::Pagination,
};
use axum::{
    extract::State,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use swanstudios_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::user::{UpdateUser, User, UserRole},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct RoleFilter {
    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Only present fields change; `"phone": null` clears the phone
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,

    pub role: Option<UserRole>,

    #[validate(range(min = 0, message = "Available sessions cannot be negative"))]
    pub available_sessions: Option<i32>,
}

/// Distinguishes a missing field (None) from an explicit null (Some(None))
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<RoleFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<UserListResponse>> {
    require_admin(&auth)?;

    let limit = page.limit();
    let offset = page.offset();

    let users = User::list(&state.db, filter.role, limit, offset).await?;
    let total = User::count(&state.db, filter.role).await?;

    Ok(Json(UserListResponse {
        users,
        total,
        limit,
        offset,
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<User>> {
    require_admin(&auth)?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require_admin(&auth)?;
    req.validate()?;

    if id == auth.user_id && req.role.is_some_and(|r| r != UserRole::Admin) {
        return Err(ApiError::BadRequest(
            "Admins cannot remove their own admin role".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;

    let user = User::update(
        &mut *tx,
        id,
        UpdateUser {
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            role: req.role,
            available_sessions: req.available_sessions,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tx.commit().await?;

    tracing::info!(user_id = %id, admin_id = %auth.user_id, "User updated");
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Value>> {
    require_admin(&auth)?;

    if id == auth.user_id {
        return Err(ApiError::BadRequest("Admins cannot delete themselves".to_string()));
    }

    let mut tx = state.db.begin().await?;
    if !User::soft_delete(&mut *tx, id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    tx.commit().await?;

    tracing::info!(user_id = %id, admin_id = %auth.user_id, "User deleted");
    Ok(Json(json!({ "message": "User deleted", "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_phone_states() {
        let absent: UpdateUserRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.phone, None);

        let cleared: UpdateUserRequest = serde_json::from_str(r#"{"phone": null}"#).unwrap();
        assert_eq!(cleared.phone, Some(None));

        let set: UpdateUserRequest = serde_json::from_str(r#"{"phone": "555-0100"}"#).unwrap();
        assert_eq!(set.phone, Some(Some("555-0100".to_string())));
    }

    #[test]
    fn test_negative_credits_rejected() {
        let req = UpdateUserRequest {
            available_sessions: Some(-1),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
