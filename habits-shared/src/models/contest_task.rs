/// Contest tasks and per-user contest progress
///
/// # Schema
///
/// ```sql
/// CREATE TABLE contest_tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     contest_id UUID NOT NULL REFERENCES contests(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     type VARCHAR(64) NOT NULL,
///     goal_number DOUBLE PRECISION NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE contest_task_progress (
///     contest_task_id UUID NOT NULL REFERENCES contest_tasks(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     current_progress DOUBLE PRECISION NOT NULL DEFAULT 0,
///     completed BOOLEAN NOT NULL DEFAULT FALSE,
///     notification_sent BOOLEAN NOT NULL DEFAULT FALSE,
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (contest_task_id, user_id)
/// );
/// ```
///
/// # Completion
///
/// `completed` is sticky: once progress reaches the goal it stays true.
/// `notification_sent` doubles as the "completion has been credited" flag and
/// is flipped exactly once by [`ContestTaskProgress::claim_completion`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContestTask {
    pub id: Uuid,
    pub contest_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub task_type: String,
    pub goal_number: f64,
    pub created_at: DateTime<Utc>,
}

/// A contest task with the requesting user's progress on it
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContestTaskWithProgress {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: ContestTask,
    pub current_progress: f64,
    pub completed: bool,
}

/// An open contest task of an active contest, as listed for a user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OpenContestTask {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: ContestTask,
    pub contest_name: String,
    pub current_progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContestTaskProgress {
    pub contest_task_id: Uuid,
    pub user_id: Uuid,
    pub current_progress: f64,
    pub completed: bool,
    pub notification_sent: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateContestTask {
    pub contest_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub task_type: String,
    pub goal_number: f64,
}

const TASK_COLUMNS: &str = "id, contest_id, name, description, type, goal_number, created_at";

const PROGRESS_COLUMNS: &str =
    "contest_task_id, user_id, current_progress, completed, notification_sent, updated_at";

impl ContestTask {
    /// Creates a task, seeds a zero progress row for every member of every
    /// entered team and bumps the contest's `total_tasks`
    pub async fn create_and_seed(
        conn: &mut PgConnection,
        data: CreateContestTask,
    ) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, ContestTask>(&format!(
            "INSERT INTO contest_tasks (contest_id, name, description, type, goal_number)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(data.contest_id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.task_type)
        .bind(data.goal_number)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO contest_task_progress (contest_task_id, user_id, current_progress)
            SELECT DISTINCT $1::uuid, tm.user_id, 0
            FROM contest_teams ct
            JOIN team_members tm ON tm.team_id = ct.team_id
            WHERE ct.contest_id = $2
            ON CONFLICT (contest_task_id, user_id) DO NOTHING
            "#,
        )
        .bind(task.id)
        .bind(task.contest_id)
        .execute(&mut *conn)
        .await?;

        sqlx::query("UPDATE contests SET total_tasks = total_tasks + 1 WHERE id = $1")
            .bind(task.contest_id)
            .execute(&mut *conn)
            .await?;

        Ok(task)
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ContestTask>(&format!(
            "SELECT {TASK_COLUMNS} FROM contest_tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Tasks of a contest with `user_id`'s progress, in creation order
    pub async fn list_for_contest(
        pool: &PgPool,
        contest_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ContestTaskWithProgress>, sqlx::Error> {
        sqlx::query_as::<_, ContestTaskWithProgress>(
            r#"
            SELECT ct.id, ct.contest_id, ct.name, ct.description, ct.type, ct.goal_number,
                   ct.created_at,
                   COALESCE(ctp.current_progress, 0) AS current_progress,
                   COALESCE(ctp.completed, FALSE) AS completed
            FROM contest_tasks ct
            LEFT JOIN contest_task_progress ctp
                   ON ctp.contest_task_id = ct.id AND ctp.user_id = $2
            WHERE ct.contest_id = $1
            ORDER BY ct.created_at
            "#,
        )
        .bind(contest_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Tasks of every contest the team is entered in, with `user_id`'s progress
    pub async fn list_for_team(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ContestTaskWithProgress>, sqlx::Error> {
        sqlx::query_as::<_, ContestTaskWithProgress>(
            r#"
            SELECT ct.id, ct.contest_id, ct.name, ct.description, ct.type, ct.goal_number,
                   ct.created_at,
                   COALESCE(ctp.current_progress, 0) AS current_progress,
                   COALESCE(ctp.completed, FALSE) AS completed
            FROM contest_tasks ct
            JOIN contest_teams cte ON cte.contest_id = ct.contest_id
            LEFT JOIN contest_task_progress ctp
                   ON ctp.contest_task_id = ct.id AND ctp.user_id = $2
            WHERE cte.team_id = $1
            ORDER BY ct.created_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Unfinished tasks of contests running on `today` that one of the
    /// user's teams is entered in
    pub async fn list_open_for_user(
        pool: &PgPool,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<OpenContestTask>, sqlx::Error> {
        sqlx::query_as::<_, OpenContestTask>(
            r#"
            SELECT ct.id, ct.contest_id, ct.name, ct.description, ct.type, ct.goal_number,
                   ct.created_at,
                   c.name AS contest_name,
                   COALESCE(ctp.current_progress, 0) AS current_progress
            FROM contest_tasks ct
            JOIN contests c ON c.id = ct.contest_id
            LEFT JOIN contest_task_progress ctp
                   ON ctp.contest_task_id = ct.id AND ctp.user_id = $1
            WHERE $2 BETWEEN c.start_date AND c.end_date
              AND EXISTS (
                  SELECT 1
                  FROM contest_teams cte
                  JOIN team_members tm ON tm.team_id = cte.team_id
                  WHERE cte.contest_id = c.id AND tm.user_id = $1
              )
              AND COALESCE(ctp.completed, FALSE) = FALSE
            ORDER BY c.start_date DESC, ct.created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(today)
        .fetch_all(pool)
        .await
    }

    /// Contest tasks of `task_type` in contests any of the user's teams are
    /// entered in
    pub async fn matching_for_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        task_type: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ContestTask>(
            r#"
            SELECT ct.id, ct.contest_id, ct.name, ct.description, ct.type, ct.goal_number,
                   ct.created_at
            FROM contest_tasks ct
            WHERE ct.type = $2
              AND EXISTS (
                  SELECT 1
                  FROM contest_teams cte
                  JOIN team_members tm ON tm.team_id = cte.team_id
                  WHERE cte.contest_id = ct.contest_id AND tm.user_id = $1
              )
            ORDER BY ct.created_at
            "#,
        )
        .bind(user_id)
        .bind(task_type)
        .fetch_all(executor)
        .await
    }

    /// Whether one of the user's teams is entered in the task's contest
    pub async fn user_participates<'e>(
        executor: impl PgExecutor<'e>,
        task_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM contest_tasks ct
                JOIN contest_teams cte ON cte.contest_id = ct.contest_id
                JOIN team_members tm ON tm.team_id = cte.team_id
                WHERE ct.id = $1 AND tm.user_id = $2
            )
            "#,
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_one(executor)
        .await
    }
}

impl ContestTaskProgress {
    /// Atomically adds `amount` to the user's progress on `task`
    ///
    /// Creates the row if needed. `completed` becomes true once the new
    /// progress reaches the goal and never reverts.
    pub async fn increment<'e>(
        executor: impl PgExecutor<'e>,
        task: &ContestTask,
        user_id: Uuid,
        amount: f64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ContestTaskProgress>(&format!(
            "INSERT INTO contest_task_progress
                 (contest_task_id, user_id, current_progress, completed)
             VALUES ($1, $2, $3, $3 >= $4)
             ON CONFLICT (contest_task_id, user_id) DO UPDATE
             SET current_progress = contest_task_progress.current_progress + EXCLUDED.current_progress,
                 completed = contest_task_progress.completed
                     OR contest_task_progress.current_progress + EXCLUDED.current_progress >= $4,
                 updated_at = NOW()
             RETURNING {PROGRESS_COLUMNS}"
        ))
        .bind(task.id)
        .bind(user_id)
        .bind(amount)
        .bind(task.goal_number)
        .fetch_one(executor)
        .await
    }

    /// Flips `notification_sent` on a completed row
    ///
    /// Returns true for exactly one caller per (task, user): the one whose
    /// conditional update matched.
    pub async fn claim_completion<'e>(
        executor: impl PgExecutor<'e>,
        task_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let claimed: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE contest_task_progress
            SET notification_sent = TRUE
            WHERE contest_task_id = $1 AND user_id = $2
              AND completed AND NOT notification_sent
            RETURNING contest_task_id
            "#,
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(claimed.is_some())
    }

    /// Credits one completed task to each of the user's teams entered in the
    /// contest; returns how many team rows were incremented
    pub async fn credit_user_teams<'e>(
        executor: impl PgExecutor<'e>,
        contest_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contest_teams cte
            SET completed_tasks = cte.completed_tasks + 1
            FROM team_members tm
            WHERE tm.team_id = cte.team_id
              AND tm.user_id = $2
              AND cte.contest_id = $1
            "#,
        )
        .bind(contest_id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
