use sqlx::SqliteExecutor;

use crate::models::{MembershipStatus, TeamRow, TeamStatus};

const SQL_INSERT_TEAM: &str = r#"
INSERT INTO teams (
  team_id,
  hackathon_id,
  leader_id,
  application_id,
  reservation_id,
  name,
  description,
  max_members,
  seats_used,
  active_members,
  status,
  created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const SQL_SELECT_TEAM: &str = r#"
SELECT
  t.team_id,
  t.hackathon_id,
  t.leader_id,
  t.application_id,
  t.reservation_id,
  t.name,
  t.description,
  t.max_members,
  t.seats_used,
  t.active_members,
  t.status,
  t.created_at
FROM teams t
"#;

// Per-team compare-and-swap: the seat is taken only if one is still open.
const SQL_TRY_CLAIM_SEAT: &str = r#"
UPDATE teams
SET seats_used = seats_used + 1,
    active_members = active_members + 1
WHERE team_id = ?1
  AND seats_used < max_members
  AND status != ?2
"#;

const SQL_MEMBER_LEFT: &str = r#"
UPDATE teams
SET active_members = active_members - 1,
    seats_used = seats_used - ?2
WHERE team_id = ?1
  AND active_members >= 1
"#;

const SQL_REFRESH_STATUS: &str = r#"
UPDATE teams
SET status = CASE
  WHEN status = ?2 THEN status
  WHEN seats_used >= max_members THEN ?3
  ELSE ?4
END
WHERE team_id = ?1
"#;

const SQL_CLOSE_AT_CURRENT_SIZE: &str = r#"
UPDATE teams
SET max_members = seats_used,
    status = ?2
WHERE team_id = ?1
  AND status != ?3
"#;

const SQL_DEACTIVATE_TEAM: &str = r#"
UPDATE teams
SET status = ?2,
    active_members = 0
WHERE team_id = ?1
"#;

pub async fn insert_team<'e, E>(exec: E, row: &TeamRow) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_INSERT_TEAM)
        .bind(&row.team_id)
        .bind(&row.hackathon_id)
        .bind(&row.leader_id)
        .bind(&row.application_id)
        .bind(&row.reservation_id)
        .bind(&row.name)
        .bind(&row.description)
        .bind(row.max_members)
        .bind(row.seats_used)
        .bind(row.active_members)
        .bind(row.status)
        .bind(row.created_at)
        .execute(exec)
        .await?;
    Ok(res.rows_affected())
}

pub async fn load_team<'e, E>(exec: E, team_id: &str) -> sqlx::Result<Option<TeamRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{} WHERE t.team_id = ?1 LIMIT 1", SQL_SELECT_TEAM);
    sqlx::query_as::<_, TeamRow>(&sql)
        .bind(team_id)
        .fetch_optional(exec)
        .await
}

pub async fn find_by_application<'e, E>(exec: E, application_id: &str) -> sqlx::Result<Option<TeamRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{} WHERE t.application_id = ?1 LIMIT 1", SQL_SELECT_TEAM);
    sqlx::query_as::<_, TeamRow>(&sql)
        .bind(application_id)
        .fetch_optional(exec)
        .await
}

pub async fn list_by_hackathon<'e, E>(
    exec: E,
    hackathon_id: &str,
    status: Option<TeamStatus>,
    limit: i64,
) -> sqlx::Result<Vec<TeamRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE t.hackathon_id = ?1 AND (?2 IS NULL OR t.status = ?2) ORDER BY t.created_at DESC LIMIT ?3",
        SQL_SELECT_TEAM
    );
    sqlx::query_as::<_, TeamRow>(&sql)
        .bind(hackathon_id)
        .bind(status)
        .bind(limit)
        .fetch_all(exec)
        .await
}

/// Teams the user leads or is currently an active member of.
pub async fn list_for_user<'e, E>(exec: E, user_id: &str) -> sqlx::Result<Vec<TeamRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE t.leader_id = ?1 OR EXISTS (\
           SELECT 1 FROM memberships m \
           WHERE m.team_id = t.team_id AND m.user_id = ?1 AND m.status = ?2\
         ) ORDER BY t.created_at DESC",
        SQL_SELECT_TEAM
    );
    sqlx::query_as::<_, TeamRow>(&sql)
        .bind(user_id)
        .bind(MembershipStatus::Active)
        .fetch_all(exec)
        .await
}

pub async fn try_claim_seat<'e, E>(exec: E, team_id: &str) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_TRY_CLAIM_SEAT)
        .bind(team_id)
        .bind(TeamStatus::Inactive)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

/// One fewer active member; `free_seat` also hands the seat back to the team.
pub async fn member_left<'e, E>(exec: E, team_id: &str, free_seat: bool) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_MEMBER_LEFT)
        .bind(team_id)
        .bind(i64::from(free_seat))
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn refresh_status<'e, E>(exec: E, team_id: &str) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_REFRESH_STATUS)
        .bind(team_id)
        .bind(TeamStatus::Inactive)
        .bind(TeamStatus::Full)
        .bind(TeamStatus::Looking)
        .execute(exec)
        .await?;
    Ok(res.rows_affected())
}

pub async fn update_details<'e, E>(
    exec: E,
    team_id: &str,
    name: Option<&str>,
    description: Option<&str>,
) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(
        "UPDATE teams SET name = COALESCE(?2, name), description = COALESCE(?3, description) WHERE team_id = ?1",
    )
    .bind(team_id)
    .bind(name)
    .bind(description)
    .execute(exec)
    .await?;
    Ok(res.rows_affected())
}

/// Shrinks the team to the seats it actually used, so no further seat can be claimed.
pub async fn close_at_current_size<'e, E>(exec: E, team_id: &str) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_CLOSE_AT_CURRENT_SIZE)
        .bind(team_id)
        .bind(TeamStatus::Full)
        .bind(TeamStatus::Inactive)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn deactivate<'e, E>(exec: E, team_id: &str) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_DEACTIVATE_TEAM)
        .bind(team_id)
        .bind(TeamStatus::Inactive)
        .execute(exec)
        .await?;
    Ok(res.rows_affected())
}
