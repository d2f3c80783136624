use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::{MembershipRow, MembershipStatus};

const SQL_INSERT_MEMBERSHIP: &str = r#"
INSERT INTO memberships (
  membership_id,
  team_id,
  hackathon_id,
  user_id,
  role,
  status,
  invited_by,
  message,
  requested_at,
  responded_at,
  expires_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const SQL_SELECT_MEMBERSHIP: &str = r#"
SELECT
  membership_id,
  team_id,
  hackathon_id,
  user_id,
  role,
  status,
  invited_by,
  message,
  requested_at,
  responded_at,
  expires_at
FROM memberships
"#;

const SQL_UPDATE_MEMBERSHIP_STATUS: &str = r#"
UPDATE memberships
SET status = ?2,
    responded_at = ?3
WHERE membership_id = ?1
  AND status = ?4
"#;

pub async fn insert_membership<'e, E>(exec: E, row: &MembershipRow) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_INSERT_MEMBERSHIP)
        .bind(&row.membership_id)
        .bind(&row.team_id)
        .bind(&row.hackathon_id)
        .bind(&row.user_id)
        .bind(row.role)
        .bind(row.status)
        .bind(&row.invited_by)
        .bind(&row.message)
        .bind(row.requested_at)
        .bind(row.responded_at)
        .bind(row.expires_at)
        .execute(exec)
        .await?;
    Ok(res.rows_affected())
}

pub async fn load_membership<'e, E>(exec: E, membership_id: &str) -> sqlx::Result<Option<MembershipRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{} WHERE membership_id = ?1 LIMIT 1", SQL_SELECT_MEMBERSHIP);
    sqlx::query_as::<_, MembershipRow>(&sql)
        .bind(membership_id)
        .fetch_optional(exec)
        .await
}

pub async fn find_active_in_hackathon<'e, E>(
    exec: E,
    hackathon_id: &str,
    user_id: &str,
) -> sqlx::Result<Option<MembershipRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE hackathon_id = ?1 AND user_id = ?2 AND status = ?3 LIMIT 1",
        SQL_SELECT_MEMBERSHIP
    );
    sqlx::query_as::<_, MembershipRow>(&sql)
        .bind(hackathon_id)
        .bind(user_id)
        .bind(MembershipStatus::Active)
        .fetch_optional(exec)
        .await
}

pub async fn find_pending_for_team<'e, E>(
    exec: E,
    team_id: &str,
    user_id: &str,
) -> sqlx::Result<Option<MembershipRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE team_id = ?1 AND user_id = ?2 AND status = ?3 LIMIT 1",
        SQL_SELECT_MEMBERSHIP
    );
    sqlx::query_as::<_, MembershipRow>(&sql)
        .bind(team_id)
        .bind(user_id)
        .bind(MembershipStatus::Pending)
        .fetch_optional(exec)
        .await
}

pub async fn list_for_team<'e, E>(
    exec: E,
    team_id: &str,
    status: Option<MembershipStatus>,
) -> sqlx::Result<Vec<MembershipRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE team_id = ?1 AND (?2 IS NULL OR status = ?2) ORDER BY requested_at ASC",
        SQL_SELECT_MEMBERSHIP
    );
    sqlx::query_as::<_, MembershipRow>(&sql)
        .bind(team_id)
        .bind(status)
        .fetch_all(exec)
        .await
}

pub async fn list_pending_in_hackathon<'e, E>(
    exec: E,
    hackathon_id: &str,
) -> sqlx::Result<Vec<MembershipRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE hackathon_id = ?1 AND status = ?2 ORDER BY requested_at ASC",
        SQL_SELECT_MEMBERSHIP
    );
    sqlx::query_as::<_, MembershipRow>(&sql)
        .bind(hackathon_id)
        .bind(MembershipStatus::Pending)
        .fetch_all(exec)
        .await
}

/// Everything still open that involves the user: invitations they received, requests
/// they sent.
pub async fn list_pending_for_user<'e, E>(exec: E, user_id: &str) -> sqlx::Result<Vec<MembershipRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE user_id = ?1 AND status = ?2 ORDER BY requested_at DESC",
        SQL_SELECT_MEMBERSHIP
    );
    sqlx::query_as::<_, MembershipRow>(&sql)
        .bind(user_id)
        .bind(MembershipStatus::Pending)
        .fetch_all(exec)
        .await
}

/// Guarded on the status the caller read; `false` means someone else moved it first.
pub async fn update_status<'e, E>(
    exec: E,
    membership_id: &str,
    expected: MembershipStatus,
    next: MembershipStatus,
    responded_at: DateTime<Utc>,
) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_UPDATE_MEMBERSHIP_STATUS)
        .bind(membership_id)
        .bind(next)
        .bind(responded_at)
        .bind(expected)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}
