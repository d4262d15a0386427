/// Leaderboard and analytics endpoints
///
/// - `GET /api/leaderboards` - team and individual rankings
/// - `GET /api/analytics` - the caller's completion breakdown, badge
///   progress and last seven days of activity

use crate::{app::AppState, error::ApiResult, routes::today};
use axum::{extract::State, Extension, Json};
use habits_shared::{
    auth::middleware::AuthContext,
    stats::{self, Analytics, Leaderboards},
};

pub async fn leaderboards(State(state): State<AppState>) -> ApiResult<Json<Leaderboards>> {
    Ok(Json(stats::leaderboards(&state.db).await?))
}

pub async fn analytics(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Analytics>> {
    Ok(Json(stats::analytics(&state.db, auth.user_id, today()).await?))
}
