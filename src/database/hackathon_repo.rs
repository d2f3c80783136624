use sqlx::SqliteExecutor;

use crate::models::HackathonRow;

const SQL_INSERT_HACKATHON: &str = r#"
INSERT INTO hackathons (
  hackathon_id,
  title,
  organizer_id,
  max_participants,
  confirmed_participants,
  reserved_units,
  min_team_size,
  max_team_size,
  registration_type,
  registration_start,
  registration_end,
  is_free,
  registration_fee_cents,
  created_at
) VALUES (?, ?, ?, ?, 0, 0, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const SQL_SELECT_HACKATHON: &str = r#"
SELECT
  hackathon_id,
  title,
  organizer_id,
  max_participants,
  confirmed_participants,
  reserved_units,
  min_team_size,
  max_team_size,
  registration_type,
  registration_start,
  registration_end,
  is_free,
  registration_fee_cents,
  created_at
FROM hackathons
"#;

// The check and the increment are one statement: two writers can never both see room
// for the same unit.
const SQL_TRY_RESERVE_UNITS: &str = r#"
UPDATE hackathons
SET reserved_units = reserved_units + ?2
WHERE hackathon_id = ?1
  AND confirmed_participants + reserved_units + ?2 <= max_participants
"#;

const SQL_COMMIT_RESERVED_UNITS: &str = r#"
UPDATE hackathons
SET confirmed_participants = confirmed_participants + ?2,
    reserved_units = reserved_units - ?2
WHERE hackathon_id = ?1
  AND reserved_units >= ?2
"#;

const SQL_RELEASE_RESERVED_UNITS: &str = r#"
UPDATE hackathons
SET reserved_units = reserved_units - ?2
WHERE hackathon_id = ?1
  AND reserved_units >= ?2
"#;

const SQL_UNCOMMIT_TO_RESERVED: &str = r#"
UPDATE hackathons
SET confirmed_participants = confirmed_participants - 1,
    reserved_units = reserved_units + 1
WHERE hackathon_id = ?1
  AND confirmed_participants >= 1
"#;

const SQL_UNCOMMIT_TO_POOL: &str = r#"
UPDATE hackathons
SET confirmed_participants = confirmed_participants - ?2
WHERE hackathon_id = ?1
  AND confirmed_participants >= ?2
"#;

pub async fn insert_hackathon<'e, E>(exec: E, row: &HackathonRow) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_INSERT_HACKATHON)
        .bind(&row.hackathon_id)
        .bind(&row.title)
        .bind(&row.organizer_id)
        .bind(row.max_participants)
        .bind(row.min_team_size)
        .bind(row.max_team_size)
        .bind(row.registration_type)
        .bind(row.registration_start)
        .bind(row.registration_end)
        .bind(row.is_free)
        .bind(row.registration_fee_cents)
        .bind(row.created_at)
        .execute(exec)
        .await?;
    Ok(res.rows_affected())
}

pub async fn load_hackathon<'e, E>(exec: E, hackathon_id: &str) -> sqlx::Result<Option<HackathonRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{} WHERE hackathon_id = ?1 LIMIT 1", SQL_SELECT_HACKATHON);
    sqlx::query_as::<_, HackathonRow>(&sql)
        .bind(hackathon_id)
        .fetch_optional(exec)
        .await
}

pub async fn list_hackathons<'e, E>(exec: E, limit: i64) -> sqlx::Result<Vec<HackathonRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} ORDER BY registration_start ASC, created_at ASC LIMIT ?1",
        SQL_SELECT_HACKATHON
    );
    sqlx::query_as::<_, HackathonRow>(&sql)
        .bind(limit)
        .fetch_all(exec)
        .await
}

pub async fn list_hackathon_ids<'e, E>(exec: E) -> sqlx::Result<Vec<String>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar::<_, String>("SELECT hackathon_id FROM hackathons ORDER BY created_at")
        .fetch_all(exec)
        .await
}

/// Returns `true` when the units fit and were added to `reserved_units`.
pub async fn try_reserve_units<'e, E>(exec: E, hackathon_id: &str, units: i64) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_TRY_RESERVE_UNITS)
        .bind(hackathon_id)
        .bind(units)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn commit_reserved_units<'e, E>(exec: E, hackathon_id: &str, units: i64) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_COMMIT_RESERVED_UNITS)
        .bind(hackathon_id)
        .bind(units)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn release_reserved_units<'e, E>(exec: E, hackathon_id: &str, units: i64) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_RELEASE_RESERVED_UNITS)
        .bind(hackathon_id)
        .bind(units)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn uncommit_to_reserved<'e, E>(exec: E, hackathon_id: &str) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_UNCOMMIT_TO_RESERVED)
        .bind(hackathon_id)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

/// Hands confirmed seats straight back to the general pool.
pub async fn uncommit_to_pool<'e, E>(exec: E, hackathon_id: &str, units: i64) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_UNCOMMIT_TO_POOL)
        .bind(hackathon_id)
        .bind(units)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}
