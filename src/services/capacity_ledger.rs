//! The only code that moves `confirmed_participants` and `reserved_units`.
//!
//! All functions take the connection of an open arbitration section.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use crate::database::{hackathon_repo, reservation_repo, team_repo};
use crate::error::{ArbitrationError, ArbitrationResult};
use crate::models::{ReservationRow, ReservationStatus, TeamRow};

/// Holds `units` slots through `expires_at`, or fails with no side effect.
pub async fn reserve(
    conn: &mut SqliteConnection,
    hackathon_id: &str,
    units: i64,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ArbitrationResult<ReservationRow> {
    if units <= 0 {
        return Err(ArbitrationError::Validation(
            "a reservation needs at least one unit".into(),
        ));
    }
    if expires_at < now {
        return Err(ArbitrationError::WindowClosed);
    }

    if !hackathon_repo::try_reserve_units(&mut *conn, hackathon_id, units).await? {
        let available = available_spots(conn, hackathon_id).await?;
        return Err(ArbitrationError::CapacityExceeded {
            requested: units,
            available,
        });
    }

    let row = ReservationRow {
        reservation_id: Uuid::new_v4().to_string(),
        hackathon_id: hackathon_id.to_string(),
        units,
        committed_units: 0,
        status: ReservationStatus::Held,
        expires_at,
        created_at: now,
        settled_at: None,
    };
    reservation_repo::insert_reservation(&mut *conn, &row).await?;
    info!(
        hackathon_id,
        reservation_id = %row.reservation_id,
        units,
        "reservation held"
    );
    Ok(row)
}

/// Commits everything still outstanding. Committing a committed reservation is a no-op.
pub async fn commit(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    now: DateTime<Utc>,
) -> ArbitrationResult<ReservationRow> {
    let row = load(conn, reservation_id).await?;
    match row.status {
        ReservationStatus::Committed => Ok(row),
        ReservationStatus::Held => {
            let outstanding = row.outstanding();
            commit_units(conn, reservation_id, outstanding, now).await?;
            load(conn, reservation_id).await
        }
        ReservationStatus::Released | ReservationStatus::Expired => Err(
            ArbitrationError::Conflict("reservation is no longer held".into()),
        ),
    }
}

/// Commits `units` of a held reservation, one team seat at a time for instance.
pub async fn commit_units(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    units: i64,
    now: DateTime<Utc>,
) -> ArbitrationResult<()> {
    let row = load(conn, reservation_id).await?;
    let outstanding = row.outstanding();
    if !row.is_live(now) || outstanding < units {
        return Err(ArbitrationError::CapacityExceeded {
            requested: units,
            available: if row.is_live(now) { outstanding } else { 0 },
        });
    }

    if !reservation_repo::add_committed_units(&mut *conn, reservation_id, units, now).await? {
        return Err(ArbitrationError::Conflict(
            "reservation changed while committing".into(),
        ));
    }
    if !hackathon_repo::commit_reserved_units(&mut *conn, &row.hackathon_id, units).await? {
        return Err(ArbitrationError::Conflict(
            "hackathon ledger changed while committing".into(),
        ));
    }
    info!(
        hackathon_id = %row.hackathon_id,
        reservation_id,
        units,
        "reservation units committed"
    );
    Ok(())
}

/// Frees whatever is still outstanding. Returns the number of units handed back.
pub async fn release(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    now: DateTime<Utc>,
) -> ArbitrationResult<i64> {
    let row = load(conn, reservation_id).await?;
    settle(conn, &row, ReservationStatus::Released, now).await
}

/// Expires every held reservation of the hackathon whose ttl has elapsed.
pub async fn sweep_expired(
    conn: &mut SqliteConnection,
    hackathon_id: &str,
    now: DateTime<Utc>,
) -> ArbitrationResult<Vec<ReservationRow>> {
    let held = reservation_repo::list_held_for_hackathon(&mut *conn, hackathon_id).await?;
    let mut expired = Vec::new();
    for row in held.into_iter().filter(|r| r.has_lapsed(now)) {
        let freed = settle(conn, &row, ReservationStatus::Expired, now).await?;
        info!(
            hackathon_id,
            reservation_id = %row.reservation_id,
            freed,
            "reservation expired"
        );
        expired.push(row);
    }
    Ok(expired)
}

/// `max_participants - confirmed_participants - live outstanding units`.
pub async fn available_spots(conn: &mut SqliteConnection, hackathon_id: &str) -> ArbitrationResult<i64> {
    let hackathon = hackathon_repo::load_hackathon(&mut *conn, hackathon_id)
        .await?
        .ok_or(ArbitrationError::NotFound("hackathon"))?;
    Ok(hackathon.available_spots())
}

/// Takes one seat from the team counter and commits one unit of the team reservation.
pub async fn claim_team_seat(
    conn: &mut SqliteConnection,
    team: &TeamRow,
    now: DateTime<Utc>,
) -> ArbitrationResult<()> {
    if !team_repo::try_claim_seat(&mut *conn, &team.team_id).await? {
        return Err(ArbitrationError::CapacityExceeded {
            requested: 1,
            available: 0,
        });
    }
    commit_units(conn, &team.reservation_id, 1, now).await
}

/// Un-commits one seat: back into the team reservation while it is still within its
/// ttl, otherwise back into the hackathon's general pool. Returns `true` when the team
/// got the seat back.
pub async fn return_team_seat(
    conn: &mut SqliteConnection,
    team: &TeamRow,
    now: DateTime<Utc>,
) -> ArbitrationResult<bool> {
    let reservation = load(conn, &team.reservation_id).await?;
    let reopenable = matches!(
        reservation.status,
        ReservationStatus::Held | ReservationStatus::Committed
    ) && !reservation.has_lapsed(now);

    let moved = if reopenable {
        reservation_repo::uncommit_unit(&mut *conn, &reservation.reservation_id).await?
            && hackathon_repo::uncommit_to_reserved(&mut *conn, &team.hackathon_id).await?
    } else {
        hackathon_repo::uncommit_to_pool(&mut *conn, &team.hackathon_id, 1).await?
    };
    if !moved {
        return Err(ArbitrationError::Conflict(
            "seat could not be returned to the ledger".into(),
        ));
    }
    info!(team_id = %team.team_id, reopenable, "team seat returned");
    Ok(reopenable)
}

/// Gives back every committed unit of a reservation whose team never formed.
pub async fn refund_committed(
    conn: &mut SqliteConnection,
    reservation_id: &str,
) -> ArbitrationResult<i64> {
    let row = load(conn, reservation_id).await?;
    if row.committed_units == 0 {
        return Ok(0);
    }
    if !hackathon_repo::uncommit_to_pool(&mut *conn, &row.hackathon_id, row.committed_units).await? {
        return Err(ArbitrationError::Conflict(
            "hackathon ledger changed while refunding".into(),
        ));
    }
    info!(
        hackathon_id = %row.hackathon_id,
        reservation_id,
        units = row.committed_units,
        "committed units refunded"
    );
    Ok(row.committed_units)
}

async fn settle(
    conn: &mut SqliteConnection,
    row: &ReservationRow,
    status: ReservationStatus,
    now: DateTime<Utc>,
) -> ArbitrationResult<i64> {
    if row.status != ReservationStatus::Held {
        return Ok(0);
    }
    let outstanding = row.outstanding();
    if !reservation_repo::settle_held(&mut *conn, &row.reservation_id, status, now).await? {
        return Ok(0);
    }
    if outstanding > 0
        && !hackathon_repo::release_reserved_units(&mut *conn, &row.hackathon_id, outstanding).await?
    {
        return Err(ArbitrationError::Conflict(
            "hackathon ledger changed while releasing".into(),
        ));
    }
    Ok(outstanding)
}

async fn load(conn: &mut SqliteConnection, reservation_id: &str) -> ArbitrationResult<ReservationRow> {
    reservation_repo::load_reservation(&mut *conn, reservation_id)
        .await?
        .ok_or(ArbitrationError::NotFound("reservation"))
}
