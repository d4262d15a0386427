/// Team goal endpoints
///
/// - `GET /api/goals?teamId=` - Goals of a team
/// - `POST /api/goals` - Create a goal
///
/// Both require membership of the team (or the admin role).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::ApiJson,
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use habits_shared::{
    auth::middleware::AuthContext,
    models::{
        goal::{CreateGoal, Goal},
        team_member::TeamMember,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalsQuery {
    pub team_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    pub team_id: Uuid,

    /// Matched against reported task types
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[validate(range(exclusive_min = 0.0, message = "Target must be greater than zero"))]
    pub target_value: f64,

    #[validate(length(min = 1, max = 50, message = "Unit must be 1 to 50 characters"))]
    pub unit: String,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Rejects ranges that end before they start
pub(crate) fn check_date_range(start: NaiveDate, end: NaiveDate) -> ApiResult<()> {
    if end < start {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "end_date".to_string(),
            message: "End date must not be before start date".to_string(),
        }]));
    }
    Ok(())
}

async fn require_member(state: &AppState, auth: &AuthContext, team_id: Uuid) -> ApiResult<()> {
    if auth.is_admin() || TeamMember::is_member(&state.db, team_id, auth.user_id).await? {
        Ok(())
    } else {
        Err(ApiError::Forbidden("You are not a member of this team".to_string()))
    }
}

pub async fn list_goals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<GoalsQuery>,
) -> ApiResult<Json<Vec<Goal>>> {
    require_member(&state, &auth, query.team_id).await?;
    Ok(Json(Goal::list_for_team(&state.db, query.team_id).await?))
}

pub async fn create_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateGoalRequest>,
) -> ApiResult<Json<Goal>> {
    req.validate()?;
    check_date_range(req.start_date, req.end_date)?;
    require_member(&state, &auth, req.team_id).await?;

    let goal = Goal::create(
        &state.db,
        CreateGoal {
            team_id: req.team_id,
            name: req.name.trim().to_string(),
            description: req.description,
            target_value: req.target_value,
            unit: req.unit.trim().to_string(),
            start_date: req.start_date,
            end_date: req.end_date,
        },
    )
    .await?;

    Ok(Json(goal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();

        assert!(check_date_range(start, end).is_ok());
        assert!(check_date_range(start, start).is_ok());
        assert!(matches!(
            check_date_range(end, start),
            Err(ApiError::ValidationError(details)) if details[0].field == "end_date"
        ));
    }

    #[test]
    fn test_create_request_wire_names() {
        let req: CreateGoalRequest = serde_json::from_value(serde_json::json!({
            "teamId": Uuid::new_v4(),
            "name": "Water",
            "targetValue": 100,
            "unit": "glasses",
            "startDate": "2025-01-01",
            "endDate": "2025-01-31"
        }))
        .unwrap();
        assert_eq!(req.target_value, 100.0);
        assert!(req.description.is_none());
        assert!(req.validate().is_ok());
    }
}
