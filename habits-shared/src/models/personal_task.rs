/// Personal tasks
///
/// A personal task tracks one habit (`type`, e.g. "Exercise") towards a goal
/// number. Reports increment it; the first time it reaches the goal it is
/// marked completed, which is what badges and leaderboards count.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE personal_tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     type VARCHAR(64) NOT NULL,
///     goal_number DOUBLE PRECISION NOT NULL,
///     current_progress DOUBLE PRECISION NOT NULL DEFAULT 0,
///     due_date DATE,
///     status TEXT NOT NULL DEFAULT 'pending',
///     is_recurring BOOLEAN NOT NULL DEFAULT FALSE,
///     recurrence_pattern VARCHAR(64),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::task::TaskStatus;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PersonalTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub task_type: String,
    pub goal_number: f64,
    pub current_progress: f64,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePersonalTask {
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub task_type: String,
    pub goal_number: f64,
    pub due_date: Option<NaiveDate>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
}

/// Full replacement of a personal task's editable fields
#[derive(Debug, Clone)]
pub struct UpdatePersonalTask {
    pub name: String,
    pub description: Option<String>,
    pub task_type: String,
    pub goal_number: f64,
    pub current_progress: f64,
    pub due_date: Option<NaiveDate>,
    /// Requested status; overridden by progress once the goal is reached
    pub status: TaskStatus,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
}

impl UpdatePersonalTask {
    /// Status actually stored for this update
    ///
    /// Reaching the goal always completes the task. Below the goal the
    /// requested status is kept, except that `completed` cannot be claimed
    /// without the progress to back it.
    pub fn effective_status(&self) -> TaskStatus {
        match TaskStatus::for_progress(self.current_progress, self.goal_number) {
            TaskStatus::Completed => TaskStatus::Completed,
            _ if self.status == TaskStatus::Completed => TaskStatus::InProgress,
            _ => self.status,
        }
    }
}

/// Result of an update: the stored row and whether it just became completed
#[derive(Debug, Clone)]
pub struct PersonalTaskUpdate {
    pub task: PersonalTask,
    pub newly_completed: bool,
}

const PERSONAL_TASK_COLUMNS: &str = "id, user_id, name, description, type, goal_number, \
     current_progress, due_date, status, is_recurring, recurrence_pattern, created_at";

impl PersonalTask {
    pub async fn create(pool: &PgPool, data: CreatePersonalTask) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PersonalTask>(&format!(
            "INSERT INTO personal_tasks
                 (user_id, name, description, type, goal_number, due_date, status,
                  is_recurring, recurrence_pattern)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8)
             RETURNING {PERSONAL_TASK_COLUMNS}"
        ))
        .bind(data.user_id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.task_type)
        .bind(data.goal_number)
        .bind(data.due_date)
        .bind(data.is_recurring)
        .bind(data.recurrence_pattern)
        .fetch_one(pool)
        .await
    }

    /// The user's personal tasks, soonest due first (undated last)
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PersonalTask>(&format!(
            "SELECT {PERSONAL_TASK_COLUMNS}
             FROM personal_tasks
             WHERE user_id = $1
             ORDER BY due_date ASC NULLS LAST, created_at"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Replaces a task's fields, locking the row so the completion
    /// transition is observed exactly once
    ///
    /// Returns `None` when the task is missing or not owned by `user_id`.
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        user_id: Uuid,
        data: UpdatePersonalTask,
    ) -> Result<Option<PersonalTaskUpdate>, sqlx::Error> {
        let previous: Option<TaskStatus> = sqlx::query_scalar(
            "SELECT status FROM personal_tasks WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(previous) = previous else {
            return Ok(None);
        };

        let status = data.effective_status();
        let task = sqlx::query_as::<_, PersonalTask>(&format!(
            "UPDATE personal_tasks
             SET name = $3, description = $4, type = $5, goal_number = $6,
                 current_progress = $7, due_date = $8, status = $9,
                 is_recurring = $10, recurrence_pattern = $11
             WHERE id = $1 AND user_id = $2
             RETURNING {PERSONAL_TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.task_type)
        .bind(data.goal_number)
        .bind(data.current_progress)
        .bind(data.due_date)
        .bind(status)
        .bind(data.is_recurring)
        .bind(data.recurrence_pattern)
        .fetch_one(&mut *conn)
        .await?;

        Ok(Some(PersonalTaskUpdate {
            newly_completed: status.is_completed() && !previous.is_completed(),
            task,
        }))
    }

    /// Adds `amount` to every open task of the given type and returns the
    /// rows that crossed their goal in this statement
    ///
    /// The `status <> 'completed'` guard and the row locks taken by `UPDATE`
    /// mean a task can be returned here at most once over its lifetime.
    pub async fn increment_open_of_type(
        conn: &mut PgConnection,
        user_id: Uuid,
        task_type: &str,
        amount: f64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let updated = sqlx::query_as::<_, PersonalTask>(&format!(
            "UPDATE personal_tasks
             SET current_progress = current_progress + $3,
                 status = CASE
                     WHEN current_progress + $3 >= goal_number THEN 'completed'
                     ELSE 'in_progress'
                 END
             WHERE user_id = $1 AND type = $2 AND status <> 'completed'
             RETURNING {PERSONAL_TASK_COLUMNS}"
        ))
        .bind(user_id)
        .bind(task_type)
        .bind(amount)
        .fetch_all(&mut *conn)
        .await?;

        Ok(updated
            .into_iter()
            .filter(|task| task.status.is_completed())
            .collect())
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar("DELETE FROM personal_tasks WHERE id = $1 AND user_id = $2 RETURNING id")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
