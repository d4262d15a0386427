/// Task endpoints
///
/// - `GET /api/tasks` - Admins see every task, everyone else their own
/// - `POST /api/tasks` - Create a task
/// - `PUT /api/tasks` - Set absolute progress on one of the caller's tasks
/// - `DELETE /api/tasks?id=` - Delete a task, subject to role
/// - `POST /api/tasks/report` - Report progress on a habit (see
///   [`habits_shared::progress`])

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::IdQuery,
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use habits_shared::{
    auth::middleware::AuthContext,
    badges::Badge,
    models::task::{CreateTask, Task},
    progress::{self, ProgressIncrement},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 64, message = "Type must be 1 to 64 characters"))]
    pub task_type: String,

    #[validate(range(exclusive_min = 0.0, message = "Goal must be greater than zero"))]
    pub goal_number: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub task_id: Uuid,
    pub progress: f64,
}

/// Progress report; both fields are checked by hand so that a missing value
/// is a 400 like any other malformed report
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub task_type: Option<String>,
    /// Amount to add
    pub goal_number: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub message: String,
    pub unlocked_badges: Vec<&'static Badge>,
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
    pub id: Uuid,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Task>>> {
    let tasks = if auth.is_admin() {
        Task::list_all(&state.db).await?
    } else {
        Task::list_for_user(&state.db, auth.user_id).await?
    };

    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<Json<Task>> {
    req.validate()?;

    let task = Task::create(
        &state.db,
        CreateTask {
            user_id: auth.user_id,
            name: req.name.trim().to_string(),
            task_type: req.task_type.trim().to_string(),
            goal_number: req.goal_number,
        },
    )
    .await?;

    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    if !req.progress.is_finite() || req.progress < 0.0 {
        return Err(ApiError::BadRequest(
            "Progress must be a non-negative number".to_string(),
        ));
    }

    let task = Task::set_progress(&state.db, req.task_id, auth.user_id, req.progress)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found or not authorized".to_string()))?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<DeletedResponse>> {
    let id = Task::delete_as(&state.db, query.id, auth.user_id, auth.role)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("Task not found or not authorized to delete".to_string())
        })?;

    Ok(Json(DeletedResponse {
        message: "Task deleted successfully".to_string(),
        id,
    }))
}

/// Report progress on a habit
///
/// # Endpoint
///
/// ```text
/// POST /api/tasks/report
/// Content-Type: application/json
///
/// { "taskType": "Exercise", "goalNumber": 1 }
/// ```
///
/// # Response
///
/// ```json
/// { "message": "Task reported successfully", "unlockedBadges": [], "refresh": true }
/// ```
///
/// Everything runs in one transaction; any failure rolls the whole report
/// back.
///
/// # Errors
///
/// - `400 Bad Request`: missing type, or an increment that is not a positive number
pub async fn report_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let task_type = req.task_type.unwrap_or_default();
    let task_type = progress::normalize_task_type(&task_type)?.to_string();
    let increment = req
        .goal_number
        .ok_or_else(|| ApiError::BadRequest("goalNumber is required".to_string()))
        .and_then(|value| ProgressIncrement::new(value).map_err(ApiError::from))?;

    let mut tx = state.db.begin().await?;
    let outcome = progress::report_progress(&mut *tx, auth.user_id, &task_type, increment).await?;
    tx.commit().await?;

    Ok(Json(ReportResponse {
        message: "Task reported successfully".to_string(),
        unlocked_badges: outcome.unlocked_badges,
        refresh: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_uses_wire_names() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"name":"Run","type":"Exercise","goalNumber":5}"#).unwrap();
        assert_eq!(req.task_type, "Exercise");
        assert_eq!(req.goal_number, 5.0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_zero_goal() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"name":"Run","type":"Exercise","goalNumber":0}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_report_response_shape() {
        let response = ReportResponse {
            message: "Task reported successfully".to_string(),
            unlocked_badges: vec![habits_shared::badges::find("water_beginner").unwrap()],
            refresh: true,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["refresh"], true);
        assert_eq!(json["unlockedBadges"][0]["name"], "Hydration Starter");
        assert_eq!(json["unlockedBadges"][0]["requirement"]["type"], "Water");
    }
}
