use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::{ApplicationRow, ApplicationStatus, PaymentStatus};

const SQL_INSERT_APPLICATION: &str = r#"
INSERT INTO applications (
  application_id,
  hackathon_id,
  applicant_id,
  application_type,
  status,
  payment_status,
  preferred_team_size,
  reservation_id,
  created_at,
  updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const SQL_SELECT_APPLICATION: &str = r#"
SELECT
  application_id,
  hackathon_id,
  applicant_id,
  application_type,
  status,
  payment_status,
  preferred_team_size,
  reservation_id,
  created_at,
  updated_at
FROM applications
"#;

const SQL_UPDATE_APPLICATION_STATE: &str = r#"
UPDATE applications
SET status = ?2,
    payment_status = ?3,
    updated_at = ?4
WHERE application_id = ?1
  AND status = ?5
"#;

const SQL_COUNT_BY_STATUS: &str = r#"
SELECT status, COUNT(*) AS total
FROM applications
WHERE hackathon_id = ?1
GROUP BY status
"#;

pub async fn insert_application<'e, E>(exec: E, row: &ApplicationRow) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_INSERT_APPLICATION)
        .bind(&row.application_id)
        .bind(&row.hackathon_id)
        .bind(&row.applicant_id)
        .bind(row.application_type)
        .bind(row.status)
        .bind(row.payment_status)
        .bind(row.preferred_team_size)
        .bind(&row.reservation_id)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(exec)
        .await?;
    Ok(res.rows_affected())
}

pub async fn load_application<'e, E>(
    exec: E,
    application_id: &str,
) -> sqlx::Result<Option<ApplicationRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{} WHERE application_id = ?1 LIMIT 1", SQL_SELECT_APPLICATION);
    sqlx::query_as::<_, ApplicationRow>(&sql)
        .bind(application_id)
        .fetch_optional(exec)
        .await
}

/// The application (if any) that currently holds or consumed a seat for this user.
pub async fn find_seat_holding<'e, E>(
    exec: E,
    hackathon_id: &str,
    applicant_id: &str,
) -> sqlx::Result<Option<ApplicationRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE hackathon_id = ?1 AND applicant_id = ?2 AND status IN (?3, ?4, ?5, ?6) LIMIT 1",
        SQL_SELECT_APPLICATION
    );
    sqlx::query_as::<_, ApplicationRow>(&sql)
        .bind(hackathon_id)
        .bind(applicant_id)
        .bind(ApplicationStatus::Applied)
        .bind(ApplicationStatus::PaymentPending)
        .bind(ApplicationStatus::TeamPending)
        .bind(ApplicationStatus::Confirmed)
        .fetch_optional(exec)
        .await
}

pub async fn find_by_reservation<'e, E>(
    exec: E,
    reservation_id: &str,
) -> sqlx::Result<Option<ApplicationRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{} WHERE reservation_id = ?1 LIMIT 1", SQL_SELECT_APPLICATION);
    sqlx::query_as::<_, ApplicationRow>(&sql)
        .bind(reservation_id)
        .fetch_optional(exec)
        .await
}

pub async fn list_by_applicant<'e, E>(exec: E, applicant_id: &str) -> sqlx::Result<Vec<ApplicationRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE applicant_id = ?1 ORDER BY created_at DESC",
        SQL_SELECT_APPLICATION
    );
    sqlx::query_as::<_, ApplicationRow>(&sql)
        .bind(applicant_id)
        .fetch_all(exec)
        .await
}

pub async fn list_by_hackathon<'e, E>(exec: E, hackathon_id: &str) -> sqlx::Result<Vec<ApplicationRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{} WHERE hackathon_id = ?1 ORDER BY created_at ASC",
        SQL_SELECT_APPLICATION
    );
    sqlx::query_as::<_, ApplicationRow>(&sql)
        .bind(hackathon_id)
        .fetch_all(exec)
        .await
}

/// Guarded on the status the caller read, so a stale writer changes nothing.
pub async fn update_state<'e, E>(
    exec: E,
    application_id: &str,
    expected: ApplicationStatus,
    status: ApplicationStatus,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_UPDATE_APPLICATION_STATE)
        .bind(application_id)
        .bind(status)
        .bind(payment_status)
        .bind(now)
        .bind(expected)
        .execute(exec)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn count_by_status<'e, E>(
    exec: E,
    hackathon_id: &str,
) -> sqlx::Result<Vec<(ApplicationStatus, i64)>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, (ApplicationStatus, i64)>(SQL_COUNT_BY_STATUS)
        .bind(hackathon_id)
        .fetch_all(exec)
        .await
}
