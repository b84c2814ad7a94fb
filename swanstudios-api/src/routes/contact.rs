/// Contact form
///
/// - `POST  /api/contact` - public submission
/// - `GET   /api/contact?unviewed=true` - admin inbox, newest first
/// - `PATCH /api/contact/:id/viewed` - admin marks a message read

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::Pagination,
};
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use swanstudios_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::contact::{Contact, ContactPriority, CreateContact},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,

    #[serde(default)]
    pub priority: ContactPriority,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub message: String,
    pub contact: Contact,
}

#[derive(Debug, Default, Deserialize)]
pub struct InboxFilter {
    #[serde(default)]
    pub unviewed: bool,
}

pub async fn submit_contact(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ContactRequest>,
) -> ApiResult<(StatusCode, Json<ContactResponse>)> {
    req.validate()?;

    if req.name.trim().is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Name and message are required".to_string()));
    }

    let mut tx = state.db.begin().await?;
    let contact = Contact::create(
        &mut *tx,
        CreateContact {
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            message: req.message.trim().to_string(),
            priority: req.priority,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(contact_id = %contact.id, priority = ?contact.priority, "Contact message received");

    Ok((
        StatusCode::CREATED,
        Json(ContactResponse {
            message: "Message received".to_string(),
            contact,
        }),
    ))
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<InboxFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<Contact>>> {
    require_admin(&auth)?;

    let contacts = Contact::list(&state.db, filter.unviewed, page.limit(), page.offset()).await?;
    Ok(Json(contacts))
}

pub async fn mark_viewed(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Contact>> {
    require_admin(&auth)?;

    let mut tx = state.db.begin().await?;
    let contact = Contact::mark_viewed(&mut *tx, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contact not found".to_string()))?;
    tx.commit().await?;

    Ok(Json(contact))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_defaults_to_normal() {
        let req: ContactRequest = serde_json::from_str(
            r#"{"name": "Ada", "email": "ada@example.com", "message": "Do you offer group classes?"}"#,
        )
        .unwrap();
        assert_eq!(req.priority, ContactPriority::Normal);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_invalid_submission() {
        let req = ContactRequest {
            name: String::new(),
            email: "nope".into(),
            message: "hi".into(),
            priority: ContactPriority::Urgent,
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("email"));
    }
}
