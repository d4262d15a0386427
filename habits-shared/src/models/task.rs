/// Generic per-user progress counters
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     type VARCHAR(64) NOT NULL,
///     goal_number DOUBLE PRECISION NOT NULL,
///     current_progress DOUBLE PRECISION NOT NULL DEFAULT 0,
///     status TEXT NOT NULL DEFAULT 'in_progress',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Status
///
/// Status is always derived from progress: `completed` iff
/// `current_progress >= goal_number`. See [`TaskStatus::for_progress`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::UserRole;

/// Lifecycle state shared by generic and personal tasks
///
/// Generic tasks never use `Pending`; personal tasks start there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Status implied by a progress value
    ///
    /// ```
    /// use habits_shared::models::task::TaskStatus;
    ///
    /// assert_eq!(TaskStatus::for_progress(4.0, 5.0), TaskStatus::InProgress);
    /// assert_eq!(TaskStatus::for_progress(5.0, 5.0), TaskStatus::Completed);
    /// ```
    pub fn for_progress(current_progress: f64, goal_number: f64) -> Self {
        if current_progress >= goal_number {
            TaskStatus::Completed
        } else {
            TaskStatus::InProgress
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub task_type: String,
    pub goal_number: f64,
    pub current_progress: f64,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub user_id: Uuid,
    pub name: String,
    pub task_type: String,
    pub goal_number: f64,
}

const TASK_COLUMNS: &str = "id, user_id, name, type, goal_number, current_progress, status, created_at";

impl Task {
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (user_id, name, type, goal_number, current_progress, status)
             VALUES ($1, $2, $3, $4, 0, 'in_progress')
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(data.user_id)
        .bind(data.name)
        .bind(data.task_type)
        .bind(data.goal_number)
        .fetch_one(pool)
        .await
    }

    /// Every task in the system, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Sets absolute progress on one of the user's tasks and re-derives status
    ///
    /// Returns `None` when the task does not exist or belongs to someone else.
    pub async fn set_progress(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        progress: f64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks
             SET current_progress = $3,
                 status = CASE WHEN $3 >= goal_number THEN 'completed' ELSE 'in_progress' END
             WHERE id = $1 AND user_id = $2
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(progress)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a task if `actor` may do so
    ///
    /// Admins may delete any task, captains their own and those of members of
    /// teams they captain, everyone else only their own. Returns the deleted id.
    pub async fn delete_as(
        pool: &PgPool,
        id: Uuid,
        actor_id: Uuid,
        actor_role: UserRole,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        if actor_role.is_admin() {
            return sqlx::query_scalar("DELETE FROM tasks WHERE id = $1 RETURNING id")
                .bind(id)
                .fetch_optional(pool)
                .await;
        }

        let query = if actor_role == UserRole::Captain {
            r#"
            DELETE FROM tasks
            WHERE id = $1 AND (
                user_id = $2
                OR user_id IN (
                    SELECT mem.user_id
                    FROM team_members mem
                    JOIN team_members cap ON cap.team_id = mem.team_id
                    WHERE cap.user_id = $2 AND cap.role = 'captain'
                )
            )
            RETURNING id
            "#
        } else {
            "DELETE FROM tasks WHERE id = $1 AND user_id = $2 RETURNING id"
        };

        sqlx::query_scalar(query)
            .bind(id)
            .bind(actor_id)
            .fetch_optional(pool)
            .await
    }
}
