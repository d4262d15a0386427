/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and policy
/// - [`jwt`]: signed session tokens
/// - [`middleware`]: Axum middleware that turns a session cookie into an
///   [`middleware::AuthContext`]
///
/// # Example
///
/// ```no_run
/// use habits_shared::auth::password::{hash_password, verify_password};
/// use habits_shared::auth::jwt::{create_token, validate_token, Claims};
/// use habits_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse battery")?;
/// assert!(verify_password("correct horse battery", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), UserRole::Member);
/// let token = create_token(&claims, "a-secret-of-at-least-thirty-two-bytes")?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
