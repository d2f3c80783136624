use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::database::user_repo;
use crate::error::{ArbitrationError, ArbitrationResult};

/// Records the caller on every authenticated request so invitations by email resolve.
pub async fn ensure_user(
    pool: &SqlitePool,
    user_id: &str,
    email: Option<&str>,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> ArbitrationResult<()> {
    let email = email.map(str::trim).filter(|e| !e.is_empty());
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    match user_repo::upsert_user(pool, user_id, email, name, now).await {
        Ok(_) => Ok(()),
        // Another account already claimed this email; keep the user without it.
        Err(err) if is_unique_violation(&err) => {
            user_repo::upsert_user(pool, user_id, None, name, now).await?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// An invitee is named by user id or by email; an email must belong to a known user.
pub async fn resolve_invitee(
    conn: &mut SqliteConnection,
    user_id: Option<&str>,
    email: Option<&str>,
) -> ArbitrationResult<String> {
    if let Some(user_id) = user_id.map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(user_id.to_string());
    }
    let email = email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ArbitrationError::Validation("invitee user_id or email is required".into()))?;
    if !email.contains('@') {
        return Err(ArbitrationError::Validation("invalid email address".into()));
    }
    let user = user_repo::find_by_email(&mut *conn, email)
        .await?
        .ok_or(ArbitrationError::NotFound("user"))?;
    Ok(user.user_id)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
