/// Progress reporting workflow
///
/// A report says "the user did `amount` of `task_type`". It fans out to
/// every place that tracks that habit:
///
/// 1. open personal tasks of that type are incremented, and the ones that
///    reach their goal are logged as completions
/// 2. team goals named after the type are incremented for all of the user's
///    teams
/// 3. contest tasks of that type in contests the user's teams are entered in
///    are incremented, and completions are credited to the teams
/// 4. badges are re-evaluated against the completion log
///
/// Every function here takes a `&mut PgConnection` so the caller decides the
/// transaction boundary; the API runs each report in a single transaction.
/// All increments are single-statement `x = x + n` updates and every
/// completion transition is claimed by a conditional `UPDATE`, so concurrent
/// reports never double count.

use sqlx::PgConnection;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::badges::{self, Badge};
use crate::models::completed_task::CompletedTask;
use crate::models::contest_task::{ContestTask, ContestTaskProgress};
use crate::models::goal::Goal;
use crate::models::notification::{messages, Notification, NotificationKind};
use crate::models::personal_task::{PersonalTask, UpdatePersonalTask};
use crate::models::user_badge::UserBadge;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Task type is required")]
    MissingTaskType,

    #[error("Progress increment must be a positive number, got {0}")]
    InvalidIncrement(f64),

    #[error("Contest task not found")]
    TaskNotFound,

    #[error("You are not participating in this contest")]
    NotParticipant,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A validated progress amount: finite and strictly positive
///
/// ```
/// use habits_shared::progress::ProgressIncrement;
///
/// assert!(ProgressIncrement::new(2.5).is_ok());
/// assert!(ProgressIncrement::new(0.0).is_err());
/// assert!(ProgressIncrement::new(f64::NAN).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressIncrement(f64);

impl ProgressIncrement {
    pub fn new(value: f64) -> Result<Self, ProgressError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(ProgressError::InvalidIncrement(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Trims a reported task type, rejecting blank ones
pub fn normalize_task_type(task_type: &str) -> Result<&str, ProgressError> {
    let trimmed = task_type.trim();
    if trimmed.is_empty() {
        Err(ProgressError::MissingTaskType)
    } else {
        Ok(trimmed)
    }
}

/// Everything a single report changed
#[derive(Debug, Default)]
pub struct ReportOutcome {
    /// Personal tasks that reached their goal with this report
    pub completed_tasks: Vec<PersonalTask>,
    /// Number of team goals incremented
    pub goals_credited: u64,
    /// Contest tasks the user completed with this report
    pub completed_contest_tasks: Vec<ContestTask>,
    /// Badges earned for the first time
    pub unlocked_badges: Vec<&'static Badge>,
}

/// Applies a report for `user_id`
pub async fn report_progress(
    conn: &mut PgConnection,
    user_id: Uuid,
    task_type: &str,
    increment: ProgressIncrement,
) -> Result<ReportOutcome, ProgressError> {
    let task_type = normalize_task_type(task_type)?;
    let amount = increment.value();
    let mut outcome = ReportOutcome::default();

    let completed = PersonalTask::increment_open_of_type(&mut *conn, user_id, task_type, amount).await?;
    for task in &completed {
        record_personal_completion(&mut *conn, user_id, task).await?;
    }
    outcome.completed_tasks = completed;

    outcome.goals_credited = Goal::credit_user_teams(&mut *conn, user_id, task_type, amount).await?;

    for task in ContestTask::matching_for_user(&mut *conn, user_id, task_type).await? {
        let progress = ContestTaskProgress::increment(&mut *conn, &task, user_id, amount).await?;
        if progress.completed && settle_contest_completion(&mut *conn, &task, user_id).await? {
            outcome.completed_contest_tasks.push(task);
        }
    }

    outcome.unlocked_badges = award_badges(&mut *conn, user_id).await?;

    info!(
        user_id = %user_id,
        task_type = %task_type,
        amount,
        completed_tasks = outcome.completed_tasks.len(),
        goals_credited = outcome.goals_credited,
        contest_tasks_completed = outcome.completed_contest_tasks.len(),
        badges_unlocked = outcome.unlocked_badges.len(),
        "Progress report processed"
    );

    Ok(outcome)
}

/// Logs a personal task completion and notifies its owner
pub async fn record_personal_completion(
    conn: &mut PgConnection,
    user_id: Uuid,
    task: &PersonalTask,
) -> Result<(), ProgressError> {
    CompletedTask::record(&mut *conn, user_id, &task.task_type).await?;
    Notification::create(
        &mut *conn,
        user_id,
        NotificationKind::TaskCompleted,
        &messages::task_completed(&task.task_type, &task.name),
        None,
    )
    .await?;

    debug!(user_id = %user_id, task_id = %task.id, "Personal task completed");
    Ok(())
}

/// Awards every badge the user's completion log qualifies for and notifies
/// them about the new ones
pub async fn award_badges(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<&'static Badge>, ProgressError> {
    let rows = CompletedTask::counts_by_type(&mut *conn, user_id).await?;
    let (counts, total) = badges::tally(&rows);

    let mut unlocked = Vec::new();
    for badge in badges::evaluate(&counts, total) {
        if UserBadge::award(&mut *conn, user_id, badge.id).await? {
            Notification::create(
                &mut *conn,
                user_id,
                NotificationKind::BadgeUnlocked,
                &messages::badge_unlocked(badge.name),
                None,
            )
            .await?;
            unlocked.push(badge);
        }
    }

    if !unlocked.is_empty() {
        info!(user_id = %user_id, count = unlocked.len(), "Badges unlocked");
    }
    Ok(unlocked)
}

/// Claims the completion of a contest task and, for the one caller that
/// wins the claim, notifies the user and credits their teams
async fn settle_contest_completion(
    conn: &mut PgConnection,
    task: &ContestTask,
    user_id: Uuid,
) -> Result<bool, ProgressError> {
    if !ContestTaskProgress::claim_completion(&mut *conn, task.id, user_id).await? {
        return Ok(false);
    }

    Notification::create(
        &mut *conn,
        user_id,
        NotificationKind::ContestTaskCompleted,
        &messages::contest_task_completed(&task.task_type),
        None,
    )
    .await?;
    let teams = ContestTaskProgress::credit_user_teams(&mut *conn, task.contest_id, user_id).await?;

    info!(
        user_id = %user_id,
        contest_task_id = %task.id,
        teams_credited = teams,
        "Contest task completed"
    );
    Ok(true)
}

/// Result of a direct contest task increment
#[derive(Debug)]
pub struct ContestProgressOutcome {
    pub progress: ContestTaskProgress,
    /// Whether the task is completed for this user (now or earlier)
    pub task_completed: bool,
    /// Whether this increment is the one that completed it
    pub newly_completed: bool,
}

/// Adds `increment` to the user's progress on one contest task
pub async fn apply_contest_increment(
    conn: &mut PgConnection,
    user_id: Uuid,
    task_id: Uuid,
    increment: ProgressIncrement,
) -> Result<ContestProgressOutcome, ProgressError> {
    let task = ContestTask::find_by_id(&mut *conn, task_id)
        .await?
        .ok_or(ProgressError::TaskNotFound)?;

    if !ContestTask::user_participates(&mut *conn, task.id, user_id).await? {
        return Err(ProgressError::NotParticipant);
    }

    let progress = ContestTaskProgress::increment(&mut *conn, &task, user_id, increment.value()).await?;
    let newly_completed =
        progress.completed && settle_contest_completion(&mut *conn, &task, user_id).await?;

    Ok(ContestProgressOutcome {
        task_completed: progress.completed,
        newly_completed,
        progress,
    })
}

/// Result of a personal task edit
#[derive(Debug)]
pub struct PersonalTaskOutcome {
    pub task: PersonalTask,
    pub newly_completed: bool,
    pub unlocked_badges: Vec<&'static Badge>,
}

/// Replaces a personal task; if the edit completes it, runs the same
/// completion and badge steps a report would
///
/// Returns `None` when the task is missing or not owned by `user_id`.
pub async fn update_personal_task(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: Uuid,
    data: UpdatePersonalTask,
) -> Result<Option<PersonalTaskOutcome>, ProgressError> {
    let Some(update) = PersonalTask::update(&mut *conn, id, user_id, data).await? else {
        return Ok(None);
    };

    let mut unlocked_badges = Vec::new();
    if update.newly_completed {
        record_personal_completion(&mut *conn, user_id, &update.task).await?;
        unlocked_badges = award_badges(&mut *conn, user_id).await?;
    }

    Ok(Some(PersonalTaskOutcome {
        task: update.task,
        newly_completed: update.newly_completed,
        unlocked_badges,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_accepts_positive_values() {
        assert_eq!(ProgressIncrement::new(5.0).unwrap().value(), 5.0);
        assert_eq!(ProgressIncrement::new(0.25).unwrap().value(), 0.25);
    }

    #[test]
    fn test_increment_rejects_non_positive_and_non_finite() {
        for value in [0.0, -0.0, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(
                matches!(ProgressIncrement::new(value), Err(ProgressError::InvalidIncrement(_))),
                "{value} accepted"
            );
        }
    }

    #[test]
    fn test_task_type_is_trimmed() {
        assert_eq!(normalize_task_type("  Water ").unwrap(), "Water");
        assert!(matches!(
            normalize_task_type("   "),
            Err(ProgressError::MissingTaskType)
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ProgressError::NotParticipant.to_string(),
            "You are not participating in this contest"
        );
        assert!(ProgressError::InvalidIncrement(-2.0).to_string().contains("-2"));
    }
}
