/// Contest endpoints
///
/// - `GET /api/contests` - Contests the caller created, with their teams
/// - `POST /api/contests` - Create a contest (admin)
/// - `PUT /api/contests` / `PUT /api/contests/:id` - Replace a contest (admin)
/// - `DELETE /api/contests?id=` / `DELETE /api/contests/:id` - Delete (admin)
/// - `GET /api/contests/:id` - Contest with creator name and team standings
///
/// Status is derived from the dates on every write. Deleting a contest
/// removes its team entries, tasks and progress rows with it.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::{goals::check_date_range, today, IdQuery, MessageResponse},
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use habits_shared::{
    auth::middleware::AuthContext,
    models::contest::{Contest, ContestInput, ContestWithCreator, ContestWithTeams, TeamStanding},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContestRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    pub description: Option<String>,

    pub start_date: NaiveDate,

    pub end_date: NaiveDate,

    #[serde(default)]
    pub team_ids: Vec<Uuid>,
}

/// `PUT /api/contests` carries the id in the body
#[derive(Debug, Deserialize)]
pub struct ContestUpdateBody {
    pub id: Uuid,
    #[serde(flatten)]
    pub contest: ContestRequest,
}

#[derive(Debug, Serialize)]
pub struct ContestDetail {
    #[serde(flatten)]
    pub contest: ContestWithCreator,
    pub teams: Vec<TeamStanding>,
}

impl ContestRequest {
    fn into_input(self) -> ApiResult<ContestInput> {
        self.validate()?;
        check_date_range(self.start_date, self.end_date)?;

        let mut team_ids = self.team_ids;
        team_ids.sort_unstable();
        team_ids.dedup();

        Ok(ContestInput {
            name: self.name.trim().to_string(),
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            team_ids,
        })
    }
}

fn require_admin(auth: &AuthContext) -> ApiResult<()> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only admins can manage contests".to_string()))
    }
}

pub async fn list_contests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ContestWithTeams>>> {
    Ok(Json(Contest::list_created_by(&state.db, auth.user_id).await?))
}

pub async fn create_contest(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ContestRequest>,
) -> ApiResult<Json<Contest>> {
    require_admin(&auth)?;
    let input = req.into_input()?;

    let mut tx = state.db.begin().await?;
    let contest = Contest::create(&mut *tx, input, auth.user_id, today()).await?;
    tx.commit().await?;

    tracing::info!(contest_id = %contest.id, status = contest.status.as_str(), "Contest created");

    Ok(Json(contest))
}

async fn replace_contest(state: &AppState, id: Uuid, req: ContestRequest) -> ApiResult<Contest> {
    let input = req.into_input()?;

    let mut tx = state.db.begin().await?;
    let contest = Contest::update(&mut *tx, id, input, today())
        .await?
        .ok_or_else(|| ApiError::NotFound("Contest not found".to_string()))?;
    tx.commit().await?;

    Ok(contest)
}

pub async fn update_contest(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<ContestRequest>,
) -> ApiResult<Json<Contest>> {
    require_admin(&auth)?;
    Ok(Json(replace_contest(&state, id, req).await?))
}

pub async fn update_contest_from_body(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(body): ApiJson<ContestUpdateBody>,
) -> ApiResult<Json<Contest>> {
    require_admin(&auth)?;
    Ok(Json(replace_contest(&state, body.id, body.contest).await?))
}

async fn remove_contest(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<MessageResponse> {
    require_admin(auth)?;

    if !Contest::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Contest not found".to_string()));
    }

    tracing::info!(contest_id = %id, deleted_by = %auth.user_id, "Contest deleted");
    Ok(MessageResponse::new("Contest deleted successfully"))
}

pub async fn delete_contest(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(remove_contest(&state, &auth, id).await?))
}

pub async fn delete_contest_from_query(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(remove_contest(&state, &auth, query.id).await?))
}

pub async fn get_contest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContestDetail>> {
    let contest = Contest::find_with_creator(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contest not found".to_string()))?;
    let teams = Contest::standings(&state.db, id).await?;

    Ok(Json(ContestDetail { contest, teams }))
}
