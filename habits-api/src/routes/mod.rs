/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Signup, signin and logout
/// - `users`: Current user, profiles, user list
/// - `tasks`: Generic progress counters and the progress report
/// - `personal_tasks`: Personal habit tasks
/// - `contest_tasks`: Contest tasks and contest progress
/// - `badges`: Badge catalog with the caller's progress
/// - `stats`: Leaderboards and personal analytics
/// - `teams`: Teams, membership and invitations
/// - `goals`: Team goals
/// - `contests`: Contests between teams
/// - `notifications`: In-app notifications

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod auth;
pub mod badges;
pub mod contest_tasks;
pub mod contests;
pub mod goals;
pub mod health;
pub mod notifications;
pub mod personal_tasks;
pub mod stats;
pub mod tasks;
pub mod teams;
pub mod users;

/// `?id=<uuid>` query string
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Uuid,
}

/// `{ "message": ... }` acknowledgement body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Current calendar date in UTC
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
