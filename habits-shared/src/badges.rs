/// Achievement badges
///
/// Badges are a static catalog: four activity categories (Exercise, Water,
/// Sleep, Steps) plus the reserved `Total` category, with five tiers each. Whether a user qualifies for a
/// badge depends only on how many tasks of each type they have completed, so
/// evaluation is a pure function over those counts. Persisting awards is the
/// caller's job (see [`crate::models::user_badge::UserBadge::award`]).
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use habits_shared::badges::evaluate;
///
/// let mut counts = HashMap::new();
/// counts.insert("Exercise".to_string(), 5);
///
/// let earned = evaluate(&counts, 5);
/// assert_eq!(earned.len(), 1);
/// assert_eq!(earned[0].name, "Exercise Novice");
/// ```

use std::collections::HashMap;

use serde::Serialize;

use crate::models::completed_task::TypeCount;

/// Reserved category matched against the total number of completions
pub const TOTAL_CATEGORY: &str = "Total";

/// What a badge asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Requirement {
    #[serde(rename = "type")]
    pub category: &'static str,
    pub count: i64,
}

/// A badge definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub requirement: Requirement,
}

impl Badge {
    pub fn is_total(&self) -> bool {
        self.requirement.category == TOTAL_CATEGORY
    }

    /// Count this badge is measured against
    fn relevant_count(&self, counts: &HashMap<String, i64>, total: i64) -> i64 {
        if self.is_total() {
            total
        } else {
            count_for(counts, self.requirement.category)
        }
    }
}

const fn badge(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: &'static str,
    count: i64,
) -> Badge {
    Badge {
        id,
        name,
        description,
        requirement: Requirement { category, count },
    }
}

pub static CATALOG: [Badge; 25] = [
    badge("exercise_beginner", "Exercise Novice", "Complete 5 exercise tasks", "Exercise", 5),
    badge("exercise_intermediate", "Fitness Enthusiast", "Complete 25 exercise tasks", "Exercise", 25),
    badge("exercise_advanced", "Workout Warrior", "Complete 50 exercise tasks", "Exercise", 50),
    badge("exercise_master", "Fitness Master", "Complete 100 exercise tasks", "Exercise", 100),
    badge("exercise_legend", "Exercise Legend", "Complete 250 exercise tasks", "Exercise", 250),
    badge("water_beginner", "Hydration Starter", "Complete 5 water intake tasks", "Water", 5),
    badge("water_intermediate", "Well-Hydrated", "Complete 25 water intake tasks", "Water", 25),
    badge("water_advanced", "Hydration Pro", "Complete 50 water intake tasks", "Water", 50),
    badge("water_master", "Hydration Master", "Complete 100 water intake tasks", "Water", 100),
    badge("water_legend", "Hydration Legend", "Complete 250 water intake tasks", "Water", 250),
    badge("sleep_beginner", "Sleep Tracker", "Complete 5 sleep tasks", "Sleep", 5),
    badge("sleep_intermediate", "Well-Rested", "Complete 25 sleep tasks", "Sleep", 25),
    badge("sleep_advanced", "Sleep Expert", "Complete 50 sleep tasks", "Sleep", 50),
    badge("sleep_master", "Sleep Master", "Complete 100 sleep tasks", "Sleep", 100),
    badge("sleep_legend", "Sleep Legend", "Complete 250 sleep tasks", "Sleep", 250),
    badge("steps_beginner", "Step Counter", "Complete 5 step tasks", "Steps", 5),
    badge("steps_intermediate", "Active Walker", "Complete 25 step tasks", "Steps", 25),
    badge("steps_advanced", "Step Champion", "Complete 50 step tasks", "Steps", 50),
    badge("steps_master", "Walking Master", "Complete 100 step tasks", "Steps", 100),
    badge("steps_legend", "Step Legend", "Complete 250 step tasks", "Steps", 250),
    badge("total_beginner", "Health Novice", "Complete 20 total tasks", TOTAL_CATEGORY, 20),
    badge("total_intermediate", "Health Enthusiast", "Complete 100 total tasks", TOTAL_CATEGORY, 100),
    badge("total_advanced", "Health Pro", "Complete 250 total tasks", TOTAL_CATEGORY, 250),
    badge("total_master", "Health Master", "Complete 500 total tasks", TOTAL_CATEGORY, 500),
    badge("total_legend", "Health Legend", "Complete 1000 total tasks", TOTAL_CATEGORY, 1000),
];

/// Looks up a badge by id
pub fn find(id: &str) -> Option<&'static Badge> {
    CATALOG.iter().find(|badge| badge.id == id)
}

/// Completions of `category`, matching task types case-insensitively
pub fn count_for(counts: &HashMap<String, i64>, category: &str) -> i64 {
    counts
        .iter()
        .filter(|(task_type, _)| task_type.eq_ignore_ascii_case(category))
        .map(|(_, count)| *count)
        .sum()
}

/// Folds per-type count rows into a map and the overall total
pub fn tally(rows: &[TypeCount]) -> (HashMap<String, i64>, i64) {
    let mut counts = HashMap::with_capacity(rows.len());
    let mut total = 0;
    for row in rows {
        *counts.entry(row.task_type.clone()).or_insert(0) += row.count;
        total += row.count;
    }
    (counts, total)
}

/// Every badge the counts qualify for, in catalog order
pub fn evaluate(counts: &HashMap<String, i64>, total: i64) -> Vec<&'static Badge> {
    CATALOG
        .iter()
        .filter(|badge| badge.relevant_count(counts, total) >= badge.requirement.count)
        .collect()
}

/// How far the counts are towards `badge`, as a percentage capped at 100
pub fn progress_percent(badge: &Badge, counts: &HashMap<String, i64>, total: i64) -> f64 {
    let count = badge.relevant_count(counts, total) as f64;
    let percent = count / badge.requirement.count as f64 * 100.0;
    percent.min(100.0)
}
