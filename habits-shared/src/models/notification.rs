/// In-app notifications
///
/// Notifications are written as side effects of other operations (task
/// completion, badge unlocks, invitations, membership changes) and read back
/// by the owning user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// How many notifications [`Notification::recent_for_user`] returns
pub const RECENT_LIMIT: i64 = 20;

/// Notification kinds, stored as their snake_case name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskCompleted,
    ContestTaskCompleted,
    BadgeUnlocked,
    TeamInvitation,
    NewMember,
    MemberLeft,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskCompleted => "task_completed",
            NotificationKind::ContestTaskCompleted => "contest_task_completed",
            NotificationKind::BadgeUnlocked => "badge_unlocked",
            NotificationKind::TeamInvitation => "team_invitation",
            NotificationKind::NewMember => "new_member",
            NotificationKind::MemberLeft => "member_left",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub team_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, type, message, team_id, is_read, created_at";

impl Notification {
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        kind: NotificationKind,
        message: &str,
        team_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (user_id, type, message, team_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(kind)
        .bind(message)
        .bind(team_id)
        .fetch_one(executor)
        .await
    }

    /// Sends the same notification to several users in one statement
    pub async fn create_for_each<'e>(
        executor: impl PgExecutor<'e>,
        user_ids: &[Uuid],
        kind: NotificationKind,
        message: &str,
        team_id: Option<Uuid>,
    ) -> Result<u64, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, type, message, team_id)
            SELECT UNNEST($1::uuid[]), $2, $3, $4
            "#,
        )
        .bind(user_ids)
        .bind(kind)
        .bind(message)
        .bind(team_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Latest [`RECENT_LIMIT`] notifications of the user
    pub async fn recent_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS}
             FROM notifications
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(RECENT_LIMIT)
        .fetch_all(pool)
        .await
    }

    /// Marks the given notifications read; ids owned by others are ignored
    pub async fn mark_read(
        pool: &PgPool,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications
             SET is_read = TRUE
             WHERE id = ANY($1) AND user_id = $2
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(ids)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Deletes one of the user's notifications
    pub async fn delete<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Message texts
pub mod messages {
    pub fn task_completed(task_type: &str, task_name: &str) -> String {
        format!("You've completed your {} task: {}!", task_type, task_name)
    }

    pub fn contest_task_completed(task_type: &str) -> String {
        format!("You've completed a contest task: {}!", task_type)
    }

    pub fn badge_unlocked(badge_name: &str) -> String {
        format!("You've unlocked the \"{}\" badge!", badge_name)
    }

    pub fn team_invitation(team_name: &str, role: &str) -> String {
        format!("You have been invited to join team {} as {}", team_name, role)
    }

    pub fn new_member(user_name: &str, team_name: &str) -> String {
        format!("{} has joined team {}", user_name, team_name)
    }

    pub fn member_left(user_name: &str) -> String {
        format!("{} has left the team", user_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(NotificationKind::BadgeUnlocked.as_str(), "badge_unlocked");
        assert_eq!(
            serde_json::to_string(&NotificationKind::ContestTaskCompleted).unwrap(),
            "\"contest_task_completed\""
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            messages::task_completed("Exercise", "Morning run"),
            "You've completed your Exercise task: Morning run!"
        );
        assert_eq!(
            messages::badge_unlocked("Exercise Novice"),
            "You've unlocked the \"Exercise Novice\" badge!"
        );
        assert_eq!(messages::member_left("Sam"), "Sam has left the team");
    }
}
