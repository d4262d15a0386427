/// Contests between teams
///
/// # Schema
///
/// ```sql
/// CREATE TABLE contests (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     start_date DATE NOT NULL,
///     end_date DATE NOT NULL,
///     status TEXT NOT NULL DEFAULT 'upcoming',
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     total_tasks INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE contest_teams (
///     contest_id UUID NOT NULL REFERENCES contests(id) ON DELETE CASCADE,
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     completed_tasks INTEGER NOT NULL DEFAULT 0,
///     PRIMARY KEY (contest_id, team_id)
/// );
/// ```
///
/// Deleting a contest cascades to `contest_teams`, `contest_tasks` and from
/// there to `contest_task_progress`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContestStatus {
    Upcoming,
    Active,
    Completed,
}

impl ContestStatus {
    /// Status of a contest running `start..=end` as seen on `today`
    pub fn from_dates(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Self {
        if today < start {
            ContestStatus::Upcoming
        } else if today > end {
            ContestStatus::Completed
        } else {
            ContestStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContestStatus::Upcoming => "upcoming",
            ContestStatus::Active => "active",
            ContestStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contest {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ContestStatus,
    pub created_by: Option<Uuid>,
    pub total_tasks: i32,
    pub created_at: DateTime<Utc>,
}

/// Contest with the ids and names of the teams entered
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContestWithTeams {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub contest: Contest,
    pub team_ids: Vec<Uuid>,
    pub team_names: Vec<String>,
}

/// Contest with its creator's display name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContestWithCreator {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub contest: Contest,
    pub created_by_name: Option<String>,
}

/// One row of a contest's standings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamStanding {
    pub id: Uuid,
    pub name: String,
    pub company: String,
    pub team_size: i64,
    pub completed_tasks: i64,
}

/// Fields for creating or replacing a contest
#[derive(Debug, Clone)]
pub struct ContestInput {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub team_ids: Vec<Uuid>,
}

const CONTEST_COLUMNS: &str =
    "id, name, description, start_date, end_date, status, created_by, total_tasks, created_at";

impl Contest {
    /// Creates a contest and enters the given teams
    pub async fn create(
        conn: &mut PgConnection,
        data: ContestInput,
        created_by: Uuid,
        today: NaiveDate,
    ) -> Result<Self, sqlx::Error> {
        let status = ContestStatus::from_dates(data.start_date, data.end_date, today);

        let contest = sqlx::query_as::<_, Contest>(&format!(
            "INSERT INTO contests (name, description, start_date, end_date, status, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {CONTEST_COLUMNS}"
        ))
        .bind(data.name)
        .bind(data.description)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(status)
        .bind(created_by)
        .fetch_one(&mut *conn)
        .await?;

        Self::set_teams(conn, contest.id, &data.team_ids).await?;
        Ok(contest)
    }

    /// Replaces a contest's fields and team list
    ///
    /// Teams that stay entered keep their `completed_tasks` counter.
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: ContestInput,
        today: NaiveDate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let status = ContestStatus::from_dates(data.start_date, data.end_date, today);

        let contest = sqlx::query_as::<_, Contest>(&format!(
            "UPDATE contests
             SET name = $2, description = $3, start_date = $4, end_date = $5, status = $6
             WHERE id = $1
             RETURNING {CONTEST_COLUMNS}"
        ))
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(status)
        .fetch_optional(&mut *conn)
        .await?;

        if contest.is_some() {
            Self::set_teams(conn, id, &data.team_ids).await?;
        }
        Ok(contest)
    }

    async fn set_teams(
        conn: &mut PgConnection,
        contest_id: Uuid,
        team_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM contest_teams WHERE contest_id = $1 AND NOT (team_id = ANY($2))")
            .bind(contest_id)
            .bind(team_ids)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO contest_teams (contest_id, team_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT (contest_id, team_id) DO NOTHING
            "#,
        )
        .bind(contest_id)
        .bind(team_ids)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Deletes a contest and, by cascade, everything hanging off it
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM contests WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contest>(&format!("SELECT {CONTEST_COLUMNS} FROM contests WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Contests created by `user_id`, latest start first
    pub async fn list_created_by(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<ContestWithTeams>, sqlx::Error> {
        sqlx::query_as::<_, ContestWithTeams>(
            r#"
            SELECT c.id, c.name, c.description, c.start_date, c.end_date, c.status,
                   c.created_by, c.total_tasks, c.created_at,
                   COALESCE(array_agg(t.id ORDER BY t.name) FILTER (WHERE t.id IS NOT NULL), '{}') AS team_ids,
                   COALESCE(array_agg(t.name::text ORDER BY t.name) FILTER (WHERE t.id IS NOT NULL), '{}') AS team_names
            FROM contests c
            LEFT JOIN contest_teams ct ON ct.contest_id = c.id
            LEFT JOIN teams t ON t.id = ct.team_id
            WHERE c.created_by = $1
            GROUP BY c.id
            ORDER BY c.start_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_with_creator(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<ContestWithCreator>, sqlx::Error> {
        sqlx::query_as::<_, ContestWithCreator>(
            r#"
            SELECT c.id, c.name, c.description, c.start_date, c.end_date, c.status,
                   c.created_by, c.total_tasks, c.created_at,
                   u.name AS created_by_name
            FROM contests c
            LEFT JOIN users u ON u.id = c.created_by
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Teams entered in the contest, ranked by completed contest tasks
    pub async fn standings(pool: &PgPool, id: Uuid) -> Result<Vec<TeamStanding>, sqlx::Error> {
        sqlx::query_as::<_, TeamStanding>(
            r#"
            SELECT t.id, t.name, t.company,
                   COUNT(DISTINCT tm.user_id) AS team_size,
                   COUNT(ctp.contest_task_id) FILTER (WHERE ctp.completed) AS completed_tasks
            FROM contest_teams ct
            JOIN teams t ON t.id = ct.team_id
            LEFT JOIN team_members tm ON tm.team_id = t.id
            LEFT JOIN contest_tasks cts ON cts.contest_id = ct.contest_id
            LEFT JOIN contest_task_progress ctp
                   ON ctp.contest_task_id = cts.id AND ctp.user_id = tm.user_id
            WHERE ct.contest_id = $1
            GROUP BY t.id, t.name, t.company
            ORDER BY completed_tasks DESC, team_size DESC
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }
}
