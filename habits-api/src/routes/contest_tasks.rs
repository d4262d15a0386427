/// Contest task endpoints
///
/// - `GET /api/tasks/contest` - Open tasks of the caller's active contests
/// - `GET /api/teams/:id/contest-tasks` - Tasks of the team's contests
/// - `GET /api/contests/:id/tasks` - Tasks of one contest
/// - `POST /api/contests/:id/tasks` - Add a task to a contest (admin)
/// - `PUT` on any of the three paths - Add progress to one task
///
/// Progress is always an increment applied in one statement, so two
/// concurrent updates both count.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::today,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use habits_shared::{
    auth::middleware::AuthContext,
    models::{
        contest::Contest,
        contest_task::{
            ContestTask, ContestTaskProgress, ContestTaskWithProgress, CreateContestTask,
            OpenContestTask,
        },
        team_member::TeamMember,
    },
    progress::{self, ProgressIncrement},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestProgressRequest {
    pub task_id: Uuid,
    /// Amount to add
    pub progress: f64,
}

#[derive(Debug, Serialize)]
pub struct ContestProgressResponse {
    #[serde(flatten)]
    pub progress: ContestTaskProgress,
    #[serde(rename = "taskCompleted")]
    pub task_completed: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContestTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 64, message = "Type must be 1 to 64 characters"))]
    pub task_type: String,

    #[validate(range(exclusive_min = 0.0, message = "Goal must be greater than zero"))]
    pub goal_number: f64,
}

pub async fn list_open_contest_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<OpenContestTask>>> {
    let tasks = ContestTask::list_open_for_user(&state.db, auth.user_id, today()).await?;
    Ok(Json(tasks))
}

pub async fn list_team_contest_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ContestTaskWithProgress>>> {
    if !auth.is_admin() && !TeamMember::is_member(&state.db, team_id, auth.user_id).await? {
        return Err(ApiError::Forbidden("You are not a member of this team".to_string()));
    }

    let tasks = ContestTask::list_for_team(&state.db, team_id, auth.user_id).await?;
    Ok(Json(tasks))
}

pub async fn list_contest_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(contest_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ContestTaskWithProgress>>> {
    let tasks = ContestTask::list_for_contest(&state.db, contest_id, auth.user_id).await?;
    Ok(Json(tasks))
}

/// Add a task to a contest
///
/// Every member of every participating team gets a zero progress row and the
/// contest's task total is bumped, in one transaction.
pub async fn create_contest_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(contest_id): Path<Uuid>,
    ApiJson(req): ApiJson<CreateContestTaskRequest>,
) -> ApiResult<Json<ContestTask>> {
    if !auth.is_admin() {
        return Err(ApiError::Forbidden("Only admins can add contest tasks".to_string()));
    }
    req.validate()?;

    if Contest::find_by_id(&state.db, contest_id).await?.is_none() {
        return Err(ApiError::NotFound("Contest not found".to_string()));
    }

    let mut tx = state.db.begin().await?;
    let task = ContestTask::create_and_seed(
        &mut *tx,
        CreateContestTask {
            contest_id,
            name: req.name.trim().to_string(),
            description: req.description,
            task_type: req.task_type.trim().to_string(),
            goal_number: req.goal_number,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(contest_id = %contest_id, task_id = %task.id, "Contest task created");

    Ok(Json(task))
}

/// Add progress to a contest task
///
/// Mounted under `/api/tasks/contest`, `/api/teams/:id/contest-tasks` and
/// `/api/contests/:id/tasks`; the path id only scopes the URL, the task id in
/// the body decides what is updated.
///
/// # Errors
///
/// - `400 Bad Request`: increment is not a positive number
/// - `403 Forbidden`: none of the caller's teams is in the contest
/// - `404 Not Found`: unknown task
pub async fn update_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ContestProgressRequest>,
) -> ApiResult<Json<ContestProgressResponse>> {
    let increment = ProgressIncrement::new(req.progress)?;

    let mut tx = state.db.begin().await?;
    let outcome =
        progress::apply_contest_increment(&mut *tx, auth.user_id, req.task_id, increment).await?;
    tx.commit().await?;

    if outcome.newly_completed {
        tracing::info!(task_id = %req.task_id, user_id = %auth.user_id, "Contest task completed");
    }

    Ok(Json(ContestProgressResponse {
        progress: outcome.progress,
        task_completed: outcome.task_completed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_progress_response_is_flattened() {
        let response = ContestProgressResponse {
            progress: ContestTaskProgress {
                contest_task_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                current_progress: 3.0,
                completed: false,
                notification_sent: false,
                updated_at: Utc::now(),
            },
            task_completed: false,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["current_progress"], 3.0);
        assert_eq!(json["taskCompleted"], false);
        assert!(json.get("progress").is_none());
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateContestTaskRequest =
            serde_json::from_str(r#"{"name":"","type":"Steps","goalNumber":-1}"#).unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("goal_number"));
    }
}
