/// Password hashing and strength rules for studio accounts
///
/// Hashes are Argon2id PHC strings (64 MB memory, 3 passes, 4 lanes). The
/// parameters travel inside the hash, so verification keeps working if the
/// cost settings are raised later.
///
/// # Example
///
/// ```
/// use swanstudios_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Squat$Day2025")?;
/// assert!(verify_password("Squat$Day2025", &hash)?);
/// assert!(!verify_password("squat-day", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Characters that satisfy the "special character" rule
const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes a password with Argon2id and a fresh random salt
///
/// # Errors
///
/// Returns `PasswordError::HashError` if the parameters are rejected or
/// hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored hash (constant-time)
///
/// Returns `Ok(false)` for a wrong password and an error only when the
/// stored hash itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks a new password against the studio's strength rules
///
/// Rules: at least [`PASSWORD_MIN_LENGTH`] characters, upper- and lowercase
/// letters, a digit, and one of `!@#$%^&*(),.?":{}|<>`.
///
/// # Example
///
/// ```
/// use swanstudios_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("Lunges&Lift5").is_ok());
/// assert!(validate_password_strength("Lunges5").is_err());
/// assert!(validate_password_strength("LungesLift55").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            PASSWORD_MIN_LENGTH
        ));
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !(has_upper && has_lower && has_digit) {
        return Err(
            "Password must include uppercase letters, lowercase letters, and numbers".to_string(),
        );
    }

    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err("Password must include at least one special character".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_argon2id() {
        let hash = hash_password("Deadlift!2025").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=65536,t=3,p=4"));
    }

    #[test]
    fn test_hash_password_salts_differ() {
        let a = hash_password("Deadlift!2025").unwrap();
        let b = hash_password("Deadlift!2025").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("Deadlift!2025").unwrap();
        assert!(verify_password("Deadlift!2025", &hash).unwrap());
        assert!(!verify_password("deadlift!2025", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_strength_rules() {
        assert!(validate_password_strength("Kettle#Bell9").is_ok());

        let too_short = validate_password_strength("Ab1!").unwrap_err();
        assert!(too_short.contains("at least 8"));

        let no_digit = validate_password_strength("Kettle#Bell").unwrap_err();
        assert!(no_digit.contains("numbers"));

        let no_upper = validate_password_strength("kettle#bell9").unwrap_err();
        assert!(no_upper.contains("uppercase"));

        let no_special = validate_password_strength("KettleBell99").unwrap_err();
        assert!(no_special.contains("special"));
    }

    #[test]
    fn test_underscore_is_not_a_special_character() {
        assert!(validate_password_strength("Kettle_Bell9").is_err());
    }
}
