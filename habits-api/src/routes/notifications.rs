/// Notification endpoints
///
/// - `GET /api/notifications` - The caller's latest notifications
/// - `PUT /api/notifications` - Mark some of them read
/// - `DELETE /api/notifications/:id` - Delete one

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::MessageResponse,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use habits_shared::{auth::middleware::AuthContext, models::notification::Notification};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub notification_ids: Vec<Uuid>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(Notification::recent_for_user(&state.db, auth.user_id).await?))
}

/// Ids that do not belong to the caller are ignored; the updated rows are
/// returned
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<MarkReadRequest>,
) -> ApiResult<Json<Vec<Notification>>> {
    if req.notification_ids.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let updated = Notification::mark_read(&state.db, auth.user_id, &req.notification_ids).await?;
    Ok(Json(updated))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !Notification::delete(&state.db, id, auth.user_id).await? {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }

    Ok(Json(MessageResponse::new("Notification deleted successfully")))
}
