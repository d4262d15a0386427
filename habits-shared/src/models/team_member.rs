/// Team membership
///
/// # Schema
///
/// ```sql
/// CREATE TYPE team_role AS ENUM ('captain', 'member');
///
/// CREATE TABLE team_members (
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role team_role NOT NULL DEFAULT 'member',
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (team_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Role inside a single team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    /// Manages members, invitations and team settings
    Captain,
    Member,
}

impl Default for TeamRole {
    fn default() -> Self {
        TeamRole::Member
    }
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Captain => "captain",
            TeamRole::Member => "member",
        }
    }

    pub fn is_captain(&self) -> bool {
        matches!(self, TeamRole::Captain)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

/// A member row on the team detail page
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MemberStats {
    pub id: Uuid,
    pub name: String,
    pub role: TeamRole,
    pub total_tasks: i64,
    pub completed_tasks: i64,
}

impl TeamMember {
    /// Adds a user to a team
    ///
    /// A second insert for the same pair fails with a unique violation.
    pub async fn add<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (team_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(executor)
        .await
    }

    /// The user's role in the team, `None` when not a member
    pub async fn role_of<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamRole>, sqlx::Error> {
        sqlx::query_scalar("SELECT role FROM team_members WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn is_member<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        Ok(Self::role_of(executor, team_id, user_id).await?.is_some())
    }

    /// Removes a membership; returns false when there was none
    pub async fn remove<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Ids of the team's captains
    pub async fn captain_ids<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM team_members WHERE team_id = $1 AND role = 'captain'",
        )
        .bind(team_id)
        .fetch_all(executor)
        .await
    }

    /// Whether `captain_id` captains any team `member_id` belongs to
    pub async fn captains_member(
        pool: &PgPool,
        captain_id: Uuid,
        member_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM team_members cap
                JOIN team_members mem ON mem.team_id = cap.team_id
                WHERE cap.user_id = $1 AND cap.role = 'captain' AND mem.user_id = $2
            )
            "#,
        )
        .bind(captain_id)
        .bind(member_id)
        .fetch_one(pool)
        .await
    }

    /// Members of a team with their generic task counts
    pub async fn list_with_stats(
        pool: &PgPool,
        team_id: Uuid,
    ) -> Result<Vec<MemberStats>, sqlx::Error> {
        sqlx::query_as::<_, MemberStats>(
            r#"
            SELECT u.id, u.name, tm.role,
                   COUNT(DISTINCT ta.id) AS total_tasks,
                   COUNT(DISTINCT ta.id) FILTER (WHERE ta.status = 'completed') AS completed_tasks
            FROM team_members tm
            JOIN users u ON tm.user_id = u.id
            LEFT JOIN tasks ta ON ta.user_id = u.id
            WHERE tm.team_id = $1
            GROUP BY u.id, u.name, tm.role
            ORDER BY tm.role, u.name
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }
}
