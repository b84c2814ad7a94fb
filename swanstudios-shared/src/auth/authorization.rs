/// Role and participant checks
///
/// The studio has three roles and no tenancy. Every check here is pure: it
/// works off the [`AuthContext`] the JWT middleware inserted, so handlers can
/// call them before opening a transaction.
///
/// | Role    | Can do                                                       |
/// |---------|--------------------------------------------------------------|
/// | admin   | everything                                                   |
/// | trainer | confirm/complete sessions, manage the exercise library       |
/// | client  | book, request and cancel own sessions, log workouts          |
///
/// # Example
///
/// ```
/// use swanstudios_shared::auth::authorization::{require_any_role, require_role};
/// use swanstudios_shared::auth::middleware::AuthContext;
/// use swanstudios_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let trainer = AuthContext::new(Uuid::new_v4(), UserRole::Trainer);
/// assert!(require_any_role(&trainer, &[UserRole::Admin, UserRole::Trainer]).is_ok());
/// assert!(require_role(&trainer, UserRole::Admin).is_err());
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::UserRole;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Caller's role is not in the allowed set
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: String, actual: UserRole },

    /// Caller is neither the owner nor allowed by role
    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Requires the caller to hold exactly `role`
pub fn require_role(auth: &AuthContext, role: UserRole) -> Result<(), AuthzError> {
    require_any_role(auth, &[role])
}

/// Requires the caller to hold one of `roles`
pub fn require_any_role(auth: &AuthContext, roles: &[UserRole]) -> Result<(), AuthzError> {
    if roles.contains(&auth.role) {
        return Ok(());
    }

    Err(AuthzError::InsufficientRole {
        required: roles
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(" or "),
        actual: auth.role,
    })
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(auth, UserRole::Admin)
}

/// Admin or trainer
pub fn require_staff(auth: &AuthContext) -> Result<(), AuthzError> {
    require_any_role(auth, &[UserRole::Admin, UserRole::Trainer])
}

/// Admin, the booked client, or the assigned trainer
///
/// Used for cancelling a session and editing its notes.
pub fn require_session_participant(
    auth: &AuthContext,
    client_id: Option<Uuid>,
    trainer_id: Option<Uuid>,
) -> Result<(), AuthzError> {
    if auth.is_admin()
        || client_id == Some(auth.user_id)
        || trainer_id == Some(auth.user_id)
    {
        return Ok(());
    }

    Err(AuthzError::NotAuthorized)
}
