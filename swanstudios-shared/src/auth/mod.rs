/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: access/refresh token generation and validation
/// - [`middleware`]: Axum bearer-token middleware producing an `AuthContext`
/// - [`authorization`]: role and participant checks
///
/// # Example
///
/// ```
/// use swanstudios_shared::auth::jwt::{issue_token_pair, validate_access_token};
/// use swanstudios_shared::auth::password::{hash_password, verify_password};
/// use swanstudios_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Rowing*Machine7")?;
/// assert!(verify_password("Rowing*Machine7", &hash)?);
///
/// let secret = "an-example-secret-that-is-32-bytes!";
/// let (access, _refresh) = issue_token_pair(Uuid::new_v4(), UserRole::Client, secret)?;
/// assert!(validate_access_token(&access, secret).is_ok());
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
