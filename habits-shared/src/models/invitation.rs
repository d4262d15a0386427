/// Team invitations
///
/// A captain invites a registered user by email. The invitee accepts or
/// declines through the invitation notification they received.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::team_member::TeamRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub team_id: Uuid,
    pub inviter_id: Uuid,
    pub invitee_email: String,
    pub role: TeamRole,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const INVITATION_COLUMNS: &str =
    "id, team_id, inviter_id, invitee_email, role, status, created_at, updated_at";

impl Invitation {
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        inviter_id: Uuid,
        invitee_email: &str,
        role: TeamRole,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(&format!(
            "INSERT INTO invitations (team_id, inviter_id, invitee_email, role, status)
             VALUES ($1, $2, $3, $4, 'pending')
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(team_id)
        .bind(inviter_id)
        .bind(invitee_email)
        .bind(role)
        .fetch_one(executor)
        .await
    }

    pub async fn has_pending<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        invitee_email: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invitations
                WHERE team_id = $1 AND invitee_email = $2 AND status = 'pending'
            )
            "#,
        )
        .bind(team_id)
        .bind(invitee_email)
        .fetch_one(executor)
        .await
    }

    /// Moves the pending invitation for (team, email) to `status`
    ///
    /// Returns the invitation as it was resolved, or `None` if nothing was
    /// pending.
    pub async fn resolve_pending<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        invitee_email: &str,
        status: InvitationStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(&format!(
            "UPDATE invitations
             SET status = $3, updated_at = NOW()
             WHERE id = (
                 SELECT id FROM invitations
                 WHERE team_id = $1 AND invitee_email = $2 AND status = 'pending'
                 ORDER BY created_at DESC
                 LIMIT 1
                 FOR UPDATE
             )
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(team_id)
        .bind(invitee_email)
        .bind(status)
        .fetch_optional(executor)
        .await
    }

    /// Drops every invitation of the user to the team
    pub async fn delete_for_user<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM invitations
            WHERE team_id = $1
              AND invitee_email = (SELECT email FROM users WHERE id = $2)
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
