/// Teams
///
/// A team is joined with a six-character code, owns goals and takes part in
/// contests.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     company VARCHAR(255) NOT NULL,
///     code CHAR(6) NOT NULL UNIQUE,
///     description TEXT,
///     avatar_url VARCHAR(512),
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::team_member::{TeamMember, TeamRole};

/// Length of a join code
pub const TEAM_CODE_LENGTH: usize = 6;

const TEAM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Attempts at finding an unused code before giving up
const MAX_CODE_ATTEMPTS: usize = 16;

/// Maximum rows returned by [`Team::search`]
pub const SEARCH_LIMIT: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub company: String,
    pub code: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Team row with aggregate counters, as shown in team lists
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub company: String,
    pub code: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub members_count: i64,
    pub total_goals: i64,
    pub completed_goals: i64,
    pub creator_name: Option<String>,
}

/// Search hit
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamSearchResult {
    pub id: Uuid,
    pub name: String,
    pub company: String,
}

/// A contest the team is entered in
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamContest {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct CreateTeam {
    pub name: String,
    pub company: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateTeam {
    pub name: String,
    pub company: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
}

/// Generates a random join code of [`TEAM_CODE_LENGTH`] uppercase
/// alphanumerics
pub fn generate_team_code() -> String {
    let mut rng = rand::thread_rng();
    (0..TEAM_CODE_LENGTH)
        .map(|_| TEAM_CODE_ALPHABET[rng.gen_range(0..TEAM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalizes user-typed join codes
pub fn normalize_team_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

const SUMMARY_SELECT: &str = r#"
    SELECT t.id, t.name, t.company, t.code, t.description, t.avatar_url,
           t.created_by, t.created_at,
           COUNT(DISTINCT tm.user_id) AS members_count,
           COUNT(DISTINCT g.id) AS total_goals,
           COUNT(DISTINCT g.id) FILTER (WHERE g.current_value >= g.target_value) AS completed_goals,
           creator.name AS creator_name
    FROM teams t
    LEFT JOIN team_members tm ON tm.team_id = t.id
    LEFT JOIN goals g ON g.team_id = t.id
    LEFT JOIN users creator ON creator.id = t.created_by
"#;

const SUMMARY_GROUP: &str = "GROUP BY t.id, creator.name";

impl Team {
    /// Creates a team with a fresh join code and makes the creator its captain
    ///
    /// Runs on the caller's connection; wrap it in a transaction so the team
    /// never exists without its captain.
    pub async fn create_with_captain(
        conn: &mut PgConnection,
        data: CreateTeam,
        creator_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let code = Self::unused_code(&mut *conn).await?;

        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (name, company, code, description, avatar_url, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, company, code, description, avatar_url, created_by, created_at
            "#,
        )
        .bind(data.name)
        .bind(data.company)
        .bind(&code)
        .bind(data.description)
        .bind(data.avatar_url)
        .bind(creator_id)
        .fetch_one(&mut *conn)
        .await?;

        TeamMember::add(&mut *conn, team.id, creator_id, TeamRole::Captain).await?;

        info!(team_id = %team.id, code = %team.code, "Team created");
        Ok(team)
    }

    async fn unused_code(conn: &mut PgConnection) -> Result<String, sqlx::Error> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_team_code();
            let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM teams WHERE code = $1)")
                .bind(&code)
                .fetch_one(&mut *conn)
                .await?;

            if !taken {
                return Ok(code);
            }
            debug!(code = %code, "Team code collision, retrying");
        }

        Err(sqlx::Error::Protocol(
            "could not allocate an unused team code".into(),
        ))
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, company, code, description, avatar_url, created_by, created_at
            FROM teams WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_code<'e>(
        executor: impl PgExecutor<'e>,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, company, code, description, avatar_url, created_by, created_at
            FROM teams WHERE code = $1
            "#,
        )
        .bind(normalize_team_code(code))
        .fetch_optional(executor)
        .await
    }

    /// Every team with counters, by name
    pub async fn list_summaries(pool: &PgPool) -> Result<Vec<TeamSummary>, sqlx::Error> {
        sqlx::query_as::<_, TeamSummary>(&format!("{SUMMARY_SELECT} {SUMMARY_GROUP} ORDER BY t.name"))
            .fetch_all(pool)
            .await
    }

    /// Teams the user belongs to, with counters
    ///
    /// Member counts cover the whole team, not just the requesting user.
    pub async fn list_summaries_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<TeamSummary>, sqlx::Error> {
        sqlx::query_as::<_, TeamSummary>(&format!(
            "{SUMMARY_SELECT}
             WHERE t.id IN (SELECT team_id FROM team_members WHERE user_id = $1)
             {SUMMARY_GROUP} ORDER BY t.name"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_summary<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<TeamSummary>, sqlx::Error> {
        sqlx::query_as::<_, TeamSummary>(&format!("{SUMMARY_SELECT} WHERE t.id = $1 {SUMMARY_GROUP}"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Case-insensitive name search, at most [`SEARCH_LIMIT`] rows
    pub async fn search(pool: &PgPool, term: &str) -> Result<Vec<TeamSearchResult>, sqlx::Error> {
        let pattern = format!("%{}%", escape_like(term.trim()));

        sqlx::query_as::<_, TeamSearchResult>(
            r#"
            SELECT id, name, company
            FROM teams
            WHERE name ILIKE $1
            ORDER BY name
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(SEARCH_LIMIT)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTeam,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"
            UPDATE teams
            SET name = $2, company = $3, description = $4, avatar_url = $5
            WHERE id = $1
            RETURNING id, name, company, code, description, avatar_url, created_by, created_at
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.company)
        .bind(data.description)
        .bind(data.avatar_url)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a team; members, goals, invitations and contest entries cascade
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Contests the team is entered in, latest end date first
    pub async fn contests(pool: &PgPool, id: Uuid) -> Result<Vec<TeamContest>, sqlx::Error> {
        sqlx::query_as::<_, TeamContest>(
            r#"
            SELECT c.id, c.name, c.start_date, c.end_date
            FROM contests c
            JOIN contest_teams ct ON ct.contest_id = c.id
            WHERE ct.team_id = $1
            ORDER BY c.end_date DESC
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }
}

/// Escapes `%`, `_` and `\` so user input matches literally inside LIKE
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..200 {
            let code = generate_team_code();
            assert_eq!(code.len(), TEAM_CODE_LENGTH);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generated_codes_vary() {
        let a = generate_team_code();
        let distinct = (0..20).map(|_| generate_team_code()).any(|c| c != a);
        assert!(distinct);
    }

    #[test]
    fn test_normalize_team_code() {
        assert_eq!(normalize_team_code("  ab12cd "), "AB12CD");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("run_club"), "run\\_club");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("plain"), "plain");
    }
}
