/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/signup` - Create an account
/// - `POST /api/auth/signin` - Check credentials and set the session cookie
/// - `POST /api/auth/logout` - Clear the session cookie

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::ApiJson,
};
use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use habits_shared::{
    auth::{jwt, middleware, password},
    models::user::{CreateUser, User, UserRole},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    /// Defaults to `member`
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Signin request
#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Signin response
#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub success: bool,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/signup
/// Content-Type: application/json
///
/// {
///   "email": "sam@example.com",
///   "password": "correct horse",
///   "name": "Sam",
///   "role": "captain"
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: admin signup is disabled
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    password::validate_password_policy(&req.password).map_err(|e| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message: e,
        }])
    })?;

    let role = req.role.unwrap_or(UserRole::Member);
    if role.is_admin() && !state.config.allow_admin_signup {
        return Err(ApiError::Forbidden(
            "Admin accounts cannot be created through signup".to_string(),
        ));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: normalize_email(&req.email),
            password_hash,
            name: req.name.trim().to_string(),
            role,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, role = role.as_str(), "User signed up");

    Ok(Json(user))
}

/// Sign in
///
/// Sets an `HttpOnly`, `SameSite=Strict` session cookie on success.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `422 Unprocessable Entity`: Validation failed
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<SigninRequest>,
) -> ApiResult<(CookieJar, Json<SigninResponse>)> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &normalize_email(&req.email))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let ttl_hours = state.config.session.ttl_hours;
    let claims = jwt::Claims::with_expiration(user.id, user.role, chrono::Duration::hours(ttl_hours));
    let token = jwt::create_token(&claims, state.session_secret())?;

    let cookie = middleware::session_cookie(token, ttl_hours, state.config.api.production);

    tracing::debug!(user_id = %user.id, "User signed in");

    Ok((
        jar.add(cookie),
        Json(SigninResponse {
            success: true,
            user,
        }),
    ))
}

/// Log out by expiring the session cookie
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<LogoutResponse>) {
    (
        jar.remove(middleware::removal_cookie()),
        Json(LogoutResponse { success: true }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Sam@Example.COM "), "sam@example.com");
    }

    #[test]
    fn test_signup_role_defaults_to_none() {
        let req: SignupRequest = serde_json::from_str(
            r#"{"email":"sam@example.com","password":"longenough","name":"Sam"}"#,
        )
        .unwrap();
        assert!(req.role.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_signup_validation() {
        let req = SignupRequest {
            email: "nope".to_string(),
            password: "short".to_string(),
            name: String::new(),
            role: Some(UserRole::Captain),
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("name"));
    }
}
