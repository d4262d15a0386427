/// Team goals
///
/// A goal accumulates every matching report from any team member. It is
/// complete once `current_value >= target_value`; reports keep adding to it
/// after that.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub current_value: f64,
    pub unit: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Compact goal row for the team detail page
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GoalProgress {
    pub name: String,
    pub target_value: f64,
    pub current_value: f64,
    pub unit: String,
}

#[derive(Debug, Clone)]
pub struct CreateGoal {
    pub team_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub unit: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Goal {
    pub fn is_completed(&self) -> bool {
        self.current_value >= self.target_value
    }

    pub async fn create(pool: &PgPool, data: CreateGoal) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Goal>(
            r#"
            INSERT INTO goals (team_id, name, description, target_value, unit, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, team_id, name, description, target_value, current_value, unit,
                      start_date, end_date, created_at
            "#,
        )
        .bind(data.team_id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.target_value)
        .bind(data.unit)
        .bind(data.start_date)
        .bind(data.end_date)
        .fetch_one(pool)
        .await
    }

    pub async fn list_for_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Goal>(
            r#"
            SELECT id, team_id, name, description, target_value, current_value, unit,
                   start_date, end_date, created_at
            FROM goals
            WHERE team_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    pub async fn progress_for_team(
        pool: &PgPool,
        team_id: Uuid,
    ) -> Result<Vec<GoalProgress>, sqlx::Error> {
        sqlx::query_as::<_, GoalProgress>(
            "SELECT name, target_value, current_value, unit FROM goals WHERE team_id = $1 ORDER BY name",
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    /// Adds `amount` to every goal named `goal_name` in any team the user
    /// belongs to; returns the number of goals touched
    pub async fn credit_user_teams<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        goal_name: &str,
        amount: f64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE goals g
            SET current_value = g.current_value + $3
            FROM team_members tm
            WHERE tm.team_id = g.team_id
              AND tm.user_id = $1
              AND g.name = $2
            "#,
        )
        .bind(user_id)
        .bind(goal_name)
        .bind(amount)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(current: f64, target: f64) -> Goal {
        Goal {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            name: "Water".to_string(),
            description: None,
            target_value: target,
            current_value: current,
            unit: "glasses".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_goal_completion_is_inclusive() {
        assert!(!goal(99.0, 100.0).is_completed());
        assert!(goal(100.0, 100.0).is_completed());
        assert!(goal(140.5, 100.0).is_completed());
    }
}
