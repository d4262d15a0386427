/// Personal task endpoints
///
/// - `GET /api/personal-tasks` - The caller's tasks, soonest due first
/// - `POST /api/personal-tasks` - Create a task (starts `pending`)
/// - `PUT /api/personal-tasks` - Replace a task's editable fields
/// - `DELETE /api/personal-tasks?id=` - Delete one of the caller's tasks

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::{tasks::DeletedResponse, IdQuery},
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use habits_shared::{
    auth::middleware::AuthContext,
    badges::Badge,
    models::{
        personal_task::{CreatePersonalTask, PersonalTask, UpdatePersonalTask},
        task::TaskStatus,
    },
    progress,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePersonalTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 64, message = "Type must be 1 to 64 characters"))]
    pub task_type: String,

    #[validate(range(exclusive_min = 0.0, message = "Goal must be greater than zero"))]
    pub goal_number: f64,

    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub is_recurring: bool,

    pub recurrence_pattern: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePersonalTaskRequest {
    pub id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 64, message = "Type must be 1 to 64 characters"))]
    pub task_type: String,

    #[validate(range(exclusive_min = 0.0, message = "Goal must be greater than zero"))]
    pub goal_number: f64,

    #[validate(range(min = 0.0, message = "Progress cannot be negative"))]
    pub current_progress: f64,

    pub due_date: Option<NaiveDate>,

    pub status: TaskStatus,

    #[serde(default)]
    pub is_recurring: bool,

    pub recurrence_pattern: Option<String>,
}

impl UpdatePersonalTaskRequest {
    fn into_update(self) -> (Uuid, UpdatePersonalTask) {
        (
            self.id,
            UpdatePersonalTask {
                name: self.name.trim().to_string(),
                description: self.description,
                task_type: self.task_type.trim().to_string(),
                goal_number: self.goal_number,
                current_progress: self.current_progress,
                due_date: self.due_date,
                status: self.status,
                is_recurring: self.is_recurring,
                recurrence_pattern: self.recurrence_pattern,
            },
        )
    }
}

#[derive(Debug, Serialize)]
pub struct PersonalTaskResponse {
    #[serde(flatten)]
    pub task: PersonalTask,
    #[serde(rename = "unlockedBadges")]
    pub unlocked_badges: Vec<&'static Badge>,
}

pub async fn list_personal_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<PersonalTask>>> {
    Ok(Json(PersonalTask::list_for_user(&state.db, auth.user_id).await?))
}

pub async fn create_personal_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreatePersonalTaskRequest>,
) -> ApiResult<Json<PersonalTask>> {
    req.validate()?;

    let task = PersonalTask::create(
        &state.db,
        CreatePersonalTask {
            user_id: auth.user_id,
            name: req.name.trim().to_string(),
            description: req.description,
            task_type: req.task_type.trim().to_string(),
            goal_number: req.goal_number,
            due_date: req.due_date,
            is_recurring: req.is_recurring,
            recurrence_pattern: req.recurrence_pattern,
        },
    )
    .await?;

    Ok(Json(task))
}

/// Replace a personal task
///
/// An edit that reaches the goal completes the task exactly like a report
/// would: a completion record, a notification and a badge check, all in the
/// same transaction as the update.
///
/// # Errors
///
/// - `404 Not Found`: no such task for this user
/// - `422 Unprocessable Entity`: validation failed
pub async fn update_personal_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<UpdatePersonalTaskRequest>,
) -> ApiResult<Json<PersonalTaskResponse>> {
    req.validate()?;
    if !req.current_progress.is_finite() {
        return Err(ApiError::BadRequest("Progress must be a number".to_string()));
    }
    let (id, update) = req.into_update();

    let mut tx = state.db.begin().await?;
    let outcome = progress::update_personal_task(&mut *tx, id, auth.user_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Personal task not found".to_string()))?;
    tx.commit().await?;

    if outcome.newly_completed {
        tracing::info!(task_id = %id, user_id = %auth.user_id, "Personal task completed by edit");
    }

    Ok(Json(PersonalTaskResponse {
        task: outcome.task,
        unlocked_badges: outcome.unlocked_badges,
    }))
}

pub async fn delete_personal_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<DeletedResponse>> {
    let id = PersonalTask::delete(&state.db, query.id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Personal task not found".to_string()))?;

    Ok(Json(DeletedResponse {
        message: "Personal task deleted successfully".to_string(),
        id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_wire_names() {
        let req: CreatePersonalTaskRequest = serde_json::from_str(
            r#"{"name":" Drink ","type":"Water","goalNumber":8,"dueDate":"2025-03-01","isRecurring":true,"recurrencePattern":"daily"}"#,
        )
        .unwrap();
        assert_eq!(req.task_type, "Water");
        assert_eq!(req.due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert!(req.is_recurring);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_request_trims_and_maps() {
        let req: UpdatePersonalTaskRequest = serde_json::from_str(
            r#"{"id":"5f0c6f0e-8a4e-4a57-9b8e-2f3f3c1a9d11","name":" Walk ","type":" Steps ","goalNumber":10,"currentProgress":3,"status":"in_progress"}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());

        let (_, update) = req.into_update();
        assert_eq!(update.name, "Walk");
        assert_eq!(update.task_type, "Steps");
        assert_eq!(update.status, TaskStatus::InProgress);
        assert!(!update.is_recurring);
    }

    #[test]
    fn test_update_request_rejects_negative_progress() {
        let req: UpdatePersonalTaskRequest = serde_json::from_str(
            r#"{"id":"5f0c6f0e-8a4e-4a57-9b8e-2f3f3c1a9d11","name":"Walk","type":"Steps","goalNumber":10,"currentProgress":-1,"status":"pending"}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }
}
