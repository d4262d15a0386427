/// Badge endpoint
///
/// `GET /api/badges` lists the whole catalog with the caller's standing:
/// earned badges first (most recent first), then the rest by progress.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use habits_shared::{
    auth::middleware::AuthContext,
    badges::{self, Requirement, CATALOG},
    models::{completed_task::CompletedTask, user_badge::UserBadge},
};
use serde::Serialize;
use std::{cmp::Ordering, collections::HashMap};

#[derive(Debug, Clone, Serialize)]
pub struct BadgeStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub earned_at: Option<DateTime<Utc>>,
    /// Percent towards the requirement, capped at 100
    pub progress: f64,
    pub requirement: Requirement,
}

pub async fn list_badges(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<BadgeStatus>>> {
    let earned = UserBadge::list_for_user(&state.db, auth.user_id).await?;
    let counts = CompletedTask::counts_by_type(&state.db, auth.user_id).await?;

    let earned_at: HashMap<String, DateTime<Utc>> = earned
        .into_iter()
        .map(|badge| (badge.badge_id, badge.earned_at))
        .collect();
    let (counts, total) = badges::tally(&counts);

    let mut statuses: Vec<BadgeStatus> = CATALOG
        .iter()
        .map(|badge| BadgeStatus {
            id: badge.id,
            name: badge.name,
            description: badge.description,
            earned_at: earned_at.get(badge.id).copied(),
            progress: badges::progress_percent(badge, &counts, total),
            requirement: badge.requirement,
        })
        .collect();

    statuses.sort_by(display_order);
    Ok(Json(statuses))
}

fn display_order(a: &BadgeStatus, b: &BadgeStatus) -> Ordering {
    match (a.earned_at, b.earned_at) {
        (Some(a_at), Some(b_at)) => b_at.cmp(&a_at),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.progress.total_cmp(&a.progress),
    }
}
