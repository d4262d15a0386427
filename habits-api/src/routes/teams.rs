/// Team endpoints
///
/// Membership rules:
///
/// - Captains, managers and admins create teams; the creator becomes captain
/// - Admins oversee teams but never join or leave them
/// - Captains cannot leave their own team
/// - Captains and admins manage members; captains send invitations

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::MessageResponse,
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use habits_shared::{
    auth::middleware::AuthContext,
    models::{
        goal::{Goal, GoalProgress},
        invitation::{Invitation, InvitationStatus},
        notification::{messages, Notification, NotificationKind},
        team::{normalize_team_code, CreateTeam, Team, TeamContest, TeamSearchResult, TeamSummary, UpdateTeam},
        team_member::{MemberStats, TeamMember, TeamRole},
        user::{User, UserRole},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct TeamRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 255, message = "Company must be 1 to 255 characters"))]
    pub company: String,

    pub description: Option<String>,

    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub message: String,
    pub team_id: Uuid,
    pub role: TeamRole,
}

/// Body of `POST /members` and `POST /invite`
#[derive(Debug, Deserialize, Validate)]
pub struct MemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default)]
    pub role: TeamRole,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    pub member_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponseRequest {
    pub notification_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AcceptedInvitation {
    pub message: String,
    pub team: TeamSummary,
    pub role: TeamRole,
}

/// Team page: the summary plus members, goal progress and contests
#[derive(Debug, Serialize)]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: TeamSummary,
    pub members: Vec<MemberStats>,
    pub progress: Vec<GoalProgress>,
    pub contests: Vec<TeamContest>,
}

impl TeamRequest {
    fn create(self) -> CreateTeam {
        CreateTeam {
            name: self.name.trim().to_string(),
            company: self.company.trim().to_string(),
            description: self.description,
            avatar_url: self.avatar_url,
        }
    }

    fn update(self) -> UpdateTeam {
        UpdateTeam {
            name: self.name.trim().to_string(),
            company: self.company.trim().to_string(),
            description: self.description,
            avatar_url: self.avatar_url,
        }
    }
}

async fn is_captain(state: &AppState, team_id: Uuid, user_id: Uuid) -> ApiResult<bool> {
    let role = TeamMember::role_of(&state.db, team_id, user_id).await?;
    Ok(role.is_some_and(|role| role.is_captain()))
}

/// Admins and the team's captains
async fn require_captain_or_admin(state: &AppState, auth: &AuthContext, team_id: Uuid) -> ApiResult<()> {
    if auth.is_admin() || is_captain(state, team_id, auth.user_id).await? {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only the team captain can do this".to_string()))
    }
}

fn require_joinable(auth: &AuthContext) -> ApiResult<()> {
    if auth.role.can_join_team() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admins cannot be team members".to_string()))
    }
}

async fn current_user(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))
}

pub async fn list_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TeamSummary>>> {
    let teams = if auth.is_admin() {
        Team::list_summaries(&state.db).await?
    } else {
        Team::list_summaries_for_user(&state.db, auth.user_id).await?
    };

    Ok(Json(teams))
}

pub async fn search_teams(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<TeamSearchResult>>> {
    let term = query.search.trim();
    if term.is_empty() {
        return Ok(Json(Vec::new()));
    }

    Ok(Json(Team::search(&state.db, term).await?))
}

/// Create a team
///
/// The team, its join code and the creator's captain membership are written
/// in one transaction.
///
/// # Errors
///
/// - `403 Forbidden`: plain members cannot found teams
/// - `422 Unprocessable Entity`: validation failed
pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<TeamRequest>,
) -> ApiResult<Json<Team>> {
    if !auth.role.can_create_team() {
        return Err(ApiError::Forbidden(
            "Only captains, managers and admins can create teams".to_string(),
        ));
    }
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let team = Team::create_with_captain(&mut *tx, req.create(), auth.user_id).await?;
    tx.commit().await?;

    Ok(Json(team))
}

pub async fn get_team(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<TeamDetail>> {
    let team = Team::find_summary(&state.db, team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    let members = TeamMember::list_with_stats(&state.db, team_id).await?;
    let progress = Goal::progress_for_team(&state.db, team_id).await?;
    let contests = Team::contests(&state.db, team_id).await?;

    Ok(Json(TeamDetail {
        team,
        members,
        progress,
        contests,
    }))
}

/// Update team details
///
/// Allowed for the team's captain, a manager who belongs to the team, and
/// admins.
pub async fn update_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    ApiJson(req): ApiJson<TeamRequest>,
) -> ApiResult<Json<Team>> {
    let allowed = auth.is_admin()
        || match TeamMember::role_of(&state.db, team_id, auth.user_id).await? {
            Some(role) => role.is_captain() || auth.role == UserRole::Manager,
            None => false,
        };
    if !allowed {
        return Err(ApiError::Forbidden("Not allowed to edit this team".to_string()));
    }
    req.validate()?;

    let team = Team::update(&state.db, team_id, req.update())
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_captain_or_admin(&state, &auth, team_id).await?;

    if !Team::delete(&state.db, team_id).await? {
        return Err(ApiError::NotFound("Team not found".to_string()));
    }

    tracing::info!(team_id = %team_id, deleted_by = %auth.user_id, "Team deleted");
    Ok(Json(MessageResponse::new("Team deleted successfully")))
}

/// Join a team by its code
///
/// # Errors
///
/// - `400 Bad Request`: missing code, or already a member
/// - `403 Forbidden`: admins cannot join teams
/// - `404 Not Found`: no team with that code
pub async fn join_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<JoinRequest>,
) -> ApiResult<Json<JoinResponse>> {
    let code = normalize_team_code(&req.code);
    if code.is_empty() {
        return Err(ApiError::BadRequest("Team code is required".to_string()));
    }
    require_joinable(&auth)?;

    let user = current_user(&state, &auth).await?;

    let mut tx = state.db.begin().await?;
    let team = Team::find_by_code(&mut *tx, &code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invalid team code".to_string()))?;

    if TeamMember::is_member(&mut *tx, team.id, user.id).await? {
        return Err(ApiError::BadRequest(
            "You are already a member of this team".to_string(),
        ));
    }

    TeamMember::add(&mut *tx, team.id, user.id, TeamRole::Member).await?;

    let admins = User::ids_with_role(&mut *tx, UserRole::Admin).await?;
    Notification::create_for_each(
        &mut *tx,
        &admins,
        NotificationKind::NewMember,
        &messages::new_member(&user.name, &team.name),
        Some(team.id),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(team_id = %team.id, user_id = %user.id, "User joined team");

    Ok(Json(JoinResponse {
        message: "Team joined successfully".to_string(),
        team_id: team.id,
        role: TeamRole::Member,
    }))
}

/// Leave a team
///
/// Pending invitations for the leaver are dropped and the captains are
/// notified.
pub async fn leave_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_joinable(&auth)?;
    let user = current_user(&state, &auth).await?;

    let mut tx = state.db.begin().await?;
    match TeamMember::role_of(&mut *tx, team_id, user.id).await? {
        None => {
            return Err(ApiError::BadRequest(
                "You are not a member of this team".to_string(),
            ))
        }
        Some(TeamRole::Captain) => {
            return Err(ApiError::BadRequest(
                "Team captains cannot leave the team. Transfer ownership first.".to_string(),
            ))
        }
        Some(TeamRole::Member) => {}
    }

    TeamMember::remove(&mut *tx, team_id, user.id).await?;
    Invitation::delete_for_user(&mut *tx, team_id, user.id).await?;

    let captains = TeamMember::captain_ids(&mut *tx, team_id).await?;
    Notification::create_for_each(
        &mut *tx,
        &captains,
        NotificationKind::MemberLeft,
        &messages::member_left(&user.name),
        Some(team_id),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(MessageResponse::new("Successfully left the team")))
}

/// Add an existing user to the team directly
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    ApiJson(req): ApiJson<MemberRequest>,
) -> ApiResult<Json<MessageResponse>> {
    require_captain_or_admin(&state, &auth, team_id).await?;
    req.validate()?;

    let member = User::find_by_email(&state.db, &req.email.trim().to_lowercase())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if member.role.is_admin() {
        return Err(ApiError::BadRequest("Admins cannot be team members".to_string()));
    }
    if TeamMember::is_member(&state.db, team_id, member.id).await? {
        return Err(ApiError::BadRequest(
            "User is already a member of this team".to_string(),
        ));
    }

    TeamMember::add(&state.db, team_id, member.id, req.role).await?;

    Ok(Json(MessageResponse::new("Member added successfully")))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    ApiJson(req): ApiJson<RemoveMemberRequest>,
) -> ApiResult<Json<MessageResponse>> {
    require_captain_or_admin(&state, &auth, team_id).await?;

    match TeamMember::role_of(&state.db, team_id, req.member_id).await? {
        None => return Err(ApiError::NotFound("Member not found in the team".to_string())),
        Some(TeamRole::Captain) => {
            return Err(ApiError::BadRequest(
                "Team captains cannot be removed".to_string(),
            ))
        }
        Some(TeamRole::Member) => {}
    }

    TeamMember::remove(&state.db, team_id, req.member_id).await?;

    Ok(Json(MessageResponse::new("Member removed successfully")))
}

/// Invite a user by email
///
/// Creates a pending invitation and a `team_invitation` notification
/// pointing at the team.
///
/// # Errors
///
/// - `400 Bad Request`: already a member, or an invitation is pending
/// - `403 Forbidden`: caller is not the team's captain
/// - `404 Not Found`: no user with that email
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    ApiJson(req): ApiJson<MemberRequest>,
) -> ApiResult<Json<Invitation>> {
    if !is_captain(&state, team_id, auth.user_id).await? {
        return Err(ApiError::Forbidden(
            "Only the team captain can send invitations".to_string(),
        ));
    }
    req.validate()?;

    let email = req.email.trim().to_lowercase();
    let invitee = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let team = Team::find_by_id(&state.db, team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    let mut tx = state.db.begin().await?;
    if Invitation::has_pending(&mut *tx, team_id, &email).await? {
        return Err(ApiError::BadRequest(
            "An active invitation already exists for this user".to_string(),
        ));
    }
    if TeamMember::is_member(&mut *tx, team_id, invitee.id).await? {
        return Err(ApiError::BadRequest(
            "User is already a member of this team".to_string(),
        ));
    }

    let invitation = Invitation::create(&mut *tx, team_id, auth.user_id, &email, req.role).await?;
    Notification::create(
        &mut *tx,
        invitee.id,
        NotificationKind::TeamInvitation,
        &messages::team_invitation(&team.name, req.role.as_str()),
        Some(team_id),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(team_id = %team_id, invitation_id = %invitation.id, "Invitation sent");

    Ok(Json(invitation))
}

/// Accept a pending invitation
///
/// Adds the caller with the invited role, marks the invitation accepted and
/// removes the invitation notification.
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    ApiJson(req): ApiJson<InvitationResponseRequest>,
) -> ApiResult<Json<AcceptedInvitation>> {
    require_joinable(&auth)?;
    let user = current_user(&state, &auth).await?;

    let mut tx = state.db.begin().await?;
    let invitation = Invitation::resolve_pending(&mut *tx, team_id, &user.email, InvitationStatus::Accepted)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invitation not found".to_string()))?;

    if TeamMember::is_member(&mut *tx, team_id, user.id).await? {
        return Err(ApiError::BadRequest(
            "You are already a member of this team".to_string(),
        ));
    }

    TeamMember::add(&mut *tx, team_id, user.id, invitation.role).await?;
    Notification::delete(&mut *tx, req.notification_id, user.id).await?;

    let team = Team::find_summary(&mut *tx, team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;
    tx.commit().await?;

    Ok(Json(AcceptedInvitation {
        message: "Invitation accepted successfully".to_string(),
        team,
        role: invitation.role,
    }))
}

pub async fn decline_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    ApiJson(req): ApiJson<InvitationResponseRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = current_user(&state, &auth).await?;

    let mut tx = state.db.begin().await?;
    Invitation::resolve_pending(&mut *tx, team_id, &user.email, InvitationStatus::Declined)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invitation not found".to_string()))?;
    Notification::delete(&mut *tx, req.notification_id, user.id).await?;
    tx.commit().await?;

    Ok(Json(MessageResponse::new("Invitation declined successfully")))
}
