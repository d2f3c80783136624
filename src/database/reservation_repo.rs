use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::{ReservationRow, ReservationStatus};

const SQL_INSERT_RESERVATION: &str = r#"
INSERT INTO reservations (
  reservation_id,
  hackathon_id,
  units,
  committed_units,
  status,
  expires_at,
  created_at
) VALUES (?, ?, ?, 0, ?, ?, ?)
"#;

const SQL_SELECT_RESERVATION: &str = r#"
SELECT
  reservation_id,
  hackathon_id,
  units,
  committed_units,
  status,
  expires_at,
  created_at,
  settled_at
FROM reservations
"#;

const SQL_ADD_COMMITTED_UNITS: &str = r#"
UPDATE reservations
SET committed_units = committed_units + ?2,
    status = CASE WHEN committed_units + ?2 = units THEN ?3 ELSE status END,
    settled_at = CASE WHEN committed_units + ?2 = units THEN ?4 ELSE settled_at END
WHERE reservation_id = ?1
  AND status = ?5
  AND committed_units + ?2 <= units
"#;

const SQL_UNCOMMIT_UNIT: &str = r#"
UPDATE reservations
SET committed_units = committed_units - 1,
    status = ?2,
    settled_at = NULL
WHERE reservation_id = ?1
  AND status IN (?2, ?3)
  AND committed_units >= 1
"#;

const SQL_SETTLE_RESERVATION: &str = r#"
UPDATE reservations
SET status = ?2,
    settled_at = ?3
WHERE reservation_id = ?1
  AND status = ?4
"#;

pub async fn insert_reservation<'e, E>(exec: E, row: &ReservationRow) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_INSERT_RESERVATION)
        .bind(&row.reservation_id)
        .bind(&row.hackathon_id)
        .bind(row.units)
        .bind(row.status)
        .bind(row.expires_at)
        .bind(row.created_at)
        .execute(exec)
        .await?;
    Ok(res.rows_affected())
}

pub async fn load_reservation<'e, E>(
    exec: E,
    reservation_id: &str,
) -> sqlx::Result<Option<ReservationRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{} WHERE reservation_id = ?1 LIMIT 1", SQL_SELECT_RESERVATION);
    sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(reservation_id)
        .fetch_optional(exec)
        .await
}

pub async fn list_held_for_hackathon<'e, E>(
    exec: E,
    hackathon_id: &str,
) -> sqlx::Result<Vec<ReservationRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE hackathon_id = ?1 AND status = ?2 ORDER BY created_at ASC",
        SQL_SELECT_RESERVATION
    );
    sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(hackathon_id)
        .bind(ReservationStatus::Held)
        .fetch_all(exec)
        .await
}

/// Moves `units` from outstanding to committed; flips the row to `committed` once
/// nothing is outstanding. Returns `false` if the reservation is not held or too small.
pub async fn add_committed_units<'e, E>(
    exec: E,
    reservation_id: &str,
    units: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_ADD_COMMITTED_UNITS)
        .bind(reservation_id)
        .bind(units)
        .bind(ReservationStatus::Committed)
        .bind(now)
        .bind(ReservationStatus::Held)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

/// Turns one committed unit back into an outstanding one, reopening a fully committed
/// reservation. The caller checks the reservation has not run past its ttl.
pub async fn uncommit_unit<'e, E>(exec: E, reservation_id: &str) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_UNCOMMIT_UNIT)
        .bind(reservation_id)
        .bind(ReservationStatus::Held)
        .bind(ReservationStatus::Committed)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

/// Moves a held reservation to `status` (released/expired). No-op for anything else.
pub async fn settle_held<'e, E>(
    exec: E,
    reservation_id: &str,
    status: ReservationStatus,
    now: DateTime<Utc>,
) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_SETTLE_RESERVATION)
        .bind(reservation_id)
        .bind(status)
        .bind(now)
        .bind(ReservationStatus::Held)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}
