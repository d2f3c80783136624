use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::UsersRow;

// Email and name only ever fill in; a token without them does not wipe what we know.
const SQL_UPSERT_USER: &str = r#"
INSERT INTO users (user_id, email, name, created_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (user_id) DO UPDATE SET
  email = COALESCE(excluded.email, users.email),
  name = COALESCE(excluded.name, users.name)
"#;

const SQL_SELECT_USER: &str = r#"
SELECT
  user_id,
  email,
  name,
  created_at
FROM users
"#;

pub async fn upsert_user<'e, E>(
    exec: E,
    user_id: &str,
    email: Option<&str>,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_UPSERT_USER)
        .bind(user_id)
        .bind(email)
        .bind(name)
        .bind(now)
        .execute(exec)
        .await?;
    Ok(res.rows_affected())
}

pub async fn find_by_email<'e, E>(exec: E, email: &str) -> sqlx::Result<Option<UsersRow>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{} WHERE lower(email) = lower(?1) LIMIT 1", SQL_SELECT_USER);
    sqlx::query_as::<_, UsersRow>(&sql)
        .bind(email.trim())
        .fetch_optional(exec)
        .await
}
