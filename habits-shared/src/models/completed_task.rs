/// Completion log
///
/// One row per personal task that reached its goal. Badge evaluation,
/// leaderboards and analytics all count these rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompletedTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_type: String,
    pub completed_at: DateTime<Utc>,
}

/// Completion count for one task type
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TypeCount {
    pub task_type: String,
    pub count: i64,
}

/// Completions on one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: i64,
}

impl CompletedTask {
    pub async fn record<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        task_type: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CompletedTask>(
            r#"
            INSERT INTO completed_tasks (user_id, task_type)
            VALUES ($1, $2)
            RETURNING id, user_id, task_type, completed_at
            "#,
        )
        .bind(user_id)
        .bind(task_type)
        .fetch_one(executor)
        .await
    }

    /// Completion counts grouped by task type, most frequent first
    pub async fn counts_by_type<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<Vec<TypeCount>, sqlx::Error> {
        sqlx::query_as::<_, TypeCount>(
            r#"
            SELECT task_type, COUNT(*) AS count
            FROM completed_tasks
            WHERE user_id = $1
            GROUP BY task_type
            ORDER BY count DESC, task_type
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Completions per day since `since` (inclusive), days without
    /// completions omitted
    pub async fn daily_counts_since(
        pool: &PgPool,
        user_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<DailyCount>, sqlx::Error> {
        sqlx::query_as::<_, DailyCount>(
            r#"
            SELECT (completed_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS count
            FROM completed_tasks
            WHERE user_id = $1 AND (completed_at AT TIME ZONE 'UTC')::date >= $2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }
}
