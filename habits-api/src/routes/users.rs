/// User endpoints
///
/// - `GET /api/user` - The signed-in user
/// - `GET /api/user/:id` - Profile with badge and completion counts (self or admin)
/// - `PUT /api/user/:id` - Change name or email (self or admin)
/// - `GET /api/users` - Every account (admin only)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use habits_shared::{
    auth::middleware::AuthContext,
    models::user::{UpdateUser, User, UserProfile},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    if !auth.is_self_or_admin(id) {
        return Err(ApiError::Forbidden("Cannot view another user's profile".to_string()));
    }

    let profile = User::profile(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(profile))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    if !auth.is_self_or_admin(id) {
        return Err(ApiError::Forbidden("Cannot update another user".to_string()));
    }
    req.validate()?;

    let user = User::update(
        &state.db,
        id,
        UpdateUser {
            name: req.name.map(|name| name.trim().to_string()),
            email: req.email.map(|email| email.trim().to_lowercase()),
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<User>>> {
    if !auth.is_admin() {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    Ok(Json(User::list_all(&state.db).await?))
}
