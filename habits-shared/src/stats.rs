/// Leaderboards and personal analytics
///
/// Read-only aggregates over the completion log, badges and goals. Rows come
/// back already sorted; there is no pagination.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::badges::{self, CATALOG};
use crate::models::completed_task::{CompletedTask, DailyCount, TypeCount};

/// Days covered by the weekly activity series, today included
pub const ACTIVITY_DAYS: i64 = 7;

/// How many badges the analytics summary lists
pub const TOP_BADGES: usize = 3;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamRanking {
    pub id: Uuid,
    pub name: String,
    pub company: String,
    pub badge_count: i64,
    pub goals_completed: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IndividualRanking {
    pub id: Uuid,
    pub name: String,
    /// Comma-separated names of the user's teams, `None` without a team
    pub team_name: Option<String>,
    pub tasks_completed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Leaderboards {
    pub teams: Vec<TeamRanking>,
    pub individuals: Vec<IndividualRanking>,
}

/// Teams by completed goals, then by distinct badges earned by their members
pub async fn team_rankings(pool: &PgPool) -> Result<Vec<TeamRanking>, sqlx::Error> {
    sqlx::query_as::<_, TeamRanking>(
        r#"
        SELECT t.id, t.name, t.company,
               (SELECT COUNT(DISTINCT ub.badge_id)
                FROM team_members tm
                JOIN user_badges ub ON ub.user_id = tm.user_id
                WHERE tm.team_id = t.id) AS badge_count,
               (SELECT COUNT(*)
                FROM goals g
                WHERE g.team_id = t.id AND g.current_value >= g.target_value) AS goals_completed
        FROM teams t
        ORDER BY goals_completed DESC, badge_count DESC, t.name
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Users by number of completed personal tasks
pub async fn individual_rankings(pool: &PgPool) -> Result<Vec<IndividualRanking>, sqlx::Error> {
    sqlx::query_as::<_, IndividualRanking>(
        r#"
        SELECT u.id, u.name,
               (SELECT string_agg(t.name, ', ' ORDER BY t.name)
                FROM team_members tm
                JOIN teams t ON t.id = tm.team_id
                WHERE tm.user_id = u.id) AS team_name,
               (SELECT COUNT(*) FROM completed_tasks ct WHERE ct.user_id = u.id) AS tasks_completed
        FROM users u
        ORDER BY tasks_completed DESC, u.name
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn leaderboards(pool: &PgPool) -> Result<Leaderboards, sqlx::Error> {
    Ok(Leaderboards {
        teams: team_rankings(pool).await?,
        individuals: individual_rankings(pool).await?,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedValue {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeProgress {
    pub name: &'static str,
    /// Whole percent, 0 to 100
    pub progress: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayActivity {
    /// `YYYY-MM-DD`
    pub date: String,
    pub tasks: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub tasks_by_type: Vec<NamedValue>,
    pub badge_progress: Vec<BadgeProgress>,
    pub weekly_activity: Vec<DayActivity>,
}

/// Personal analytics for `user_id` as of `today`
pub async fn analytics(
    pool: &PgPool,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<Analytics, sqlx::Error> {
    let counts = CompletedTask::counts_by_type(pool, user_id).await?;
    let since = today - Duration::days(ACTIVITY_DAYS - 1);
    let daily = CompletedTask::daily_counts_since(pool, user_id, since).await?;

    Ok(Analytics {
        tasks_by_type: tasks_by_type(&counts),
        badge_progress: top_badge_progress(&counts),
        weekly_activity: weekly_activity(&daily, today),
    })
}

fn tasks_by_type(counts: &[TypeCount]) -> Vec<NamedValue> {
    counts
        .iter()
        .map(|row| NamedValue {
            name: row.task_type.clone(),
            value: row.count,
        })
        .collect()
}

/// The [`TOP_BADGES`] badges closest to completion, catalog order on ties
fn top_badge_progress(counts: &[TypeCount]) -> Vec<BadgeProgress> {
    let (map, total) = badges::tally(counts);

    let mut progress: Vec<BadgeProgress> = CATALOG
        .iter()
        .map(|badge| BadgeProgress {
            name: badge.name,
            progress: badges::progress_percent(badge, &map, total).round() as i64,
        })
        .collect();

    // stable sort keeps catalog order for equal progress
    progress.sort_by(|a, b| b.progress.cmp(&a.progress));
    progress.truncate(TOP_BADGES);
    progress
}

/// One entry per day of the window ending `today`, zero-filled
fn weekly_activity(daily: &[DailyCount], today: NaiveDate) -> Vec<DayActivity> {
    let by_day: HashMap<NaiveDate, i64> = daily.iter().map(|d| (d.day, d.count)).collect();

    (0..ACTIVITY_DAYS)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            DayActivity {
                date: day.format("%Y-%m-%d").to_string(),
                tasks: by_day.get(&day).copied().unwrap_or(0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn count(task_type: &str, count: i64) -> TypeCount {
        TypeCount {
            task_type: task_type.to_string(),
            count,
        }
    }

    #[test]
    fn test_weekly_activity_is_zero_filled() {
        let today = day(2025, 3, 10);
        let daily = vec![
            DailyCount { day: day(2025, 3, 4), count: 2 },
            DailyCount { day: day(2025, 3, 10), count: 1 },
        ];

        let week = weekly_activity(&daily, today);

        assert_eq!(week.len(), 7);
        assert_eq!(week[0], DayActivity { date: "2025-03-04".to_string(), tasks: 2 });
        assert_eq!(week[1].tasks, 0);
        assert_eq!(week[6], DayActivity { date: "2025-03-10".to_string(), tasks: 1 });
    }

    #[test]
    fn test_top_badge_progress() {
        let progress = top_badge_progress(&[count("Exercise", 5), count("Water", 3)]);

        assert_eq!(progress.len(), TOP_BADGES);
        assert_eq!(progress[0], BadgeProgress { name: "Exercise Novice", progress: 100 });
        assert_eq!(progress[1], BadgeProgress { name: "Hydration Starter", progress: 60 });
        assert_eq!(progress[2], BadgeProgress { name: "Health Novice", progress: 40 });
    }

    #[test]
    fn test_top_badge_progress_without_completions() {
        let progress = top_badge_progress(&[]);
        assert!(progress.iter().all(|b| b.progress == 0));
        assert_eq!(progress[0].name, "Exercise Novice");
    }

    #[test]
    fn test_analytics_serializes_camel_case() {
        let analytics = Analytics {
            tasks_by_type: tasks_by_type(&[count("Sleep", 4)]),
            badge_progress: vec![],
            weekly_activity: vec![],
        };

        let json = serde_json::to_value(&analytics).unwrap();
        assert_eq!(json["tasksByType"][0]["name"], "Sleep");
        assert_eq!(json["tasksByType"][0]["value"], 4);
        assert!(json.get("weeklyActivity").is_some());
        assert!(json.get("badgeProgress").is_some());
    }
}
