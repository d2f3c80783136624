use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{application_repo, hackathon_repo, membership_repo, payment_repo, team_repo};
use crate::error::{ArbitrationError, ArbitrationResult};
use crate::models::{
    ApplicationRow, ApplicationStatus, ApplicationType, HackathonRow, PaymentRow, PaymentStatus,
    TeamRow,
};
use crate::services::arbitration::ArbitrationEngine;
use crate::services::{capacity_ledger, team_service};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitApplication {
    pub application_type: ApplicationType,
    pub preferred_team_size: Option<i64>,
    pub team_name: Option<String>,
    pub team_description: Option<String>,
}

impl SubmitApplication {
    pub fn individual() -> Self {
        Self {
            application_type: ApplicationType::Individual,
            preferred_team_size: None,
            team_name: None,
            team_description: None,
        }
    }

    pub fn team_leader(team_size: i64) -> Self {
        Self {
            application_type: ApplicationType::TeamLeader,
            preferred_team_size: Some(team_size),
            team_name: None,
            team_description: None,
        }
    }
}

/// Completion callback from the payment gateway. Delivered at least once.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    pub payment_ref: String,
    pub amount_cents: i64,
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct ApplicationStats {
    pub hackathon_id: String,
    pub total: i64,
    pub applied: i64,
    pub payment_pending: i64,
    pub team_pending: i64,
    pub confirmed: i64,
    pub rejected: i64,
    pub expired: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LapseOutcome {
    Expired,
    Confirmed,
    Untouched,
}

pub async fn submit_application(
    engine: &ArbitrationEngine,
    user_id: &str,
    hackathon_id: &str,
    request: SubmitApplication,
) -> ArbitrationResult<ApplicationRow> {
    let application_type = request.application_type;
    let units = match application_type {
        ApplicationType::Individual => 1,
        ApplicationType::TeamLeader => request.preferred_team_size.ok_or_else(|| {
            ArbitrationError::Validation("preferred_team_size is required for team leaders".into())
        })?,
    };

    let mut section = engine.enter(hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let hackathon = hackathon_repo::load_hackathon(&mut *conn, hackathon_id)
        .await?
        .ok_or(ArbitrationError::NotFound("hackathon"))?;

    if !hackathon.window_open(now) {
        return Err(ArbitrationError::WindowClosed);
    }
    if !hackathon.registration_type.permits(application_type) {
        return Err(ArbitrationError::Validation(format!(
            "this hackathon does not accept {:?} registrations",
            application_type
        )));
    }
    if application_type == ApplicationType::TeamLeader
        && !(hackathon.min_team_size..=hackathon.max_team_size).contains(&units)
    {
        return Err(ArbitrationError::Validation(format!(
            "team size must be between {} and {}",
            hackathon.min_team_size, hackathon.max_team_size
        )));
    }
    if hackathon.organizer_id == user_id {
        return Err(ArbitrationError::OrganizerRestriction);
    }
    if is_seated(conn, hackathon_id, user_id).await? {
        return Err(ArbitrationError::AlreadyRegistered);
    }

    let expires_at = match (application_type, hackathon.is_free) {
        (ApplicationType::Individual, false) => {
            hackathon.registration_end.min(now + engine.settings().payment_window)
        }
        _ => hackathon.registration_end,
    };
    let reservation = capacity_ledger::reserve(conn, hackathon_id, units, expires_at, now).await?;

    let (status, payment_status) = match (application_type, hackathon.is_free) {
        (ApplicationType::Individual, true) => (ApplicationStatus::Confirmed, PaymentStatus::None),
        (ApplicationType::Individual, false) => {
            (ApplicationStatus::PaymentPending, PaymentStatus::Pending)
        }
        (ApplicationType::TeamLeader, true) => (ApplicationStatus::TeamPending, PaymentStatus::None),
        (ApplicationType::TeamLeader, false) => {
            (ApplicationStatus::TeamPending, PaymentStatus::Pending)
        }
    };
    let status = ApplicationStatus::Applied.transition(status)?;

    let mut application = ApplicationRow {
        application_id: Uuid::new_v4().to_string(),
        hackathon_id: hackathon_id.to_string(),
        applicant_id: user_id.to_string(),
        application_type,
        status,
        payment_status,
        preferred_team_size: units,
        reservation_id: Some(reservation.reservation_id.clone()),
        created_at: now,
        updated_at: now,
    };
    application_repo::insert_application(&mut *conn, &application).await?;

    match application_type {
        ApplicationType::Individual => {
            if hackathon.is_free {
                capacity_ledger::commit(conn, &reservation.reservation_id, now).await?;
            }
        }
        ApplicationType::TeamLeader => {
            let team = team_service::spawn_team(
                conn,
                &application,
                request.team_name.as_deref(),
                request.team_description.as_deref(),
                now,
            )
            .await?;
            if hackathon.is_free {
                capacity_ledger::commit_units(conn, &reservation.reservation_id, 1, now).await?;
            }
            if let Some(confirmed) = confirm_leader_if_complete(conn, &team, now).await? {
                application = confirmed;
            }
        }
    }

    section.commit().await?;
    info!(
        hackathon_id,
        user_id,
        application_id = %application.application_id,
        status = application.status.as_str(),
        units,
        "application submitted"
    );
    Ok(application)
}

pub async fn confirm_payment(
    engine: &ArbitrationEngine,
    user_id: &str,
    application_id: &str,
    payment: PaymentConfirmation,
) -> ArbitrationResult<ApplicationRow> {
    let payment_ref = payment.payment_ref.trim();
    if payment_ref.is_empty() {
        return Err(ArbitrationError::Validation("payment_ref is required".into()));
    }
    if payment.amount_cents < 0 {
        return Err(ArbitrationError::Validation("amount cannot be negative".into()));
    }

    let hackathon_id = application_repo::load_application(engine.pool(), application_id)
        .await?
        .ok_or(ArbitrationError::NotFound("application"))?
        .hackathon_id;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let application = load_application(conn, application_id).await?;
    if application.applicant_id != user_id {
        return Err(ArbitrationError::Authorization(
            "only the applicant can confirm a payment".into(),
        ));
    }

    if let Some(existing) = payment_repo::load_payment(&mut *conn, payment_ref).await? {
        if existing.application_id != application_id {
            return Err(ArbitrationError::Conflict(
                "payment reference already used for another application".into(),
            ));
        }
        // Redelivered callback: nothing changes.
        section.commit().await?;
        info!(application_id, payment_ref, "duplicate payment callback ignored");
        return Ok(application);
    }

    let hackathon = load_hackathon(conn, &hackathon_id).await?;
    if hackathon.is_free {
        return Err(ArbitrationError::Validation(
            "this hackathon does not take payments".into(),
        ));
    }
    if application.payment_status == PaymentStatus::Completed {
        return Err(ArbitrationError::Conflict(
            "application was already paid under a different reference".into(),
        ));
    }
    if !matches!(
        application.status,
        ApplicationStatus::PaymentPending | ApplicationStatus::TeamPending
    ) {
        return Err(ArbitrationError::Conflict(format!(
            "application is {} and no longer awaits payment",
            application.status.as_str()
        )));
    }
    if payment.amount_cents < hackathon.registration_fee_cents {
        return Err(ArbitrationError::PaymentRequired(format!(
            "fee is {} cents, received {}",
            hackathon.registration_fee_cents, payment.amount_cents
        )));
    }
    let reservation_id = application
        .reservation_id
        .clone()
        .ok_or_else(|| ArbitrationError::Conflict("application holds no reservation".into()))?;

    payment_repo::insert_payment(
        &mut *conn,
        &PaymentRow {
            payment_ref: payment_ref.to_string(),
            application_id: application_id.to_string(),
            amount_cents: payment.amount_cents,
            received_at: now,
        },
    )
    .await?;

    let updated = match application.application_type {
        ApplicationType::Individual => {
            capacity_ledger::commit(conn, &reservation_id, now).await?;
            apply_transition(
                conn,
                &application,
                ApplicationStatus::Confirmed,
                PaymentStatus::Completed,
                now,
            )
            .await?
        }
        ApplicationType::TeamLeader => {
            // Only the leader's own seat; member seats are committed as they join.
            capacity_ledger::commit_units(conn, &reservation_id, 1, now).await?;
            let paid = set_payment_status(conn, &application, PaymentStatus::Completed, now).await?;
            match team_repo::find_by_application(&mut *conn, application_id).await? {
                Some(team) => confirm_leader_if_complete(conn, &team, now)
                    .await?
                    .unwrap_or(paid),
                None => paid,
            }
        }
    };

    section.commit().await?;
    info!(
        application_id,
        payment_ref,
        status = updated.status.as_str(),
        "payment confirmed"
    );
    Ok(updated)
}

/// Gives up a pending application: the held reservation goes back to the pool.
/// Callable by the applicant (withdrawal) or the organizer (deadline enforcement).
pub async fn expire(
    engine: &ArbitrationEngine,
    user_id: &str,
    application_id: &str,
) -> ArbitrationResult<ApplicationRow> {
    let hackathon_id = application_repo::load_application(engine.pool(), application_id)
        .await?
        .ok_or(ArbitrationError::NotFound("application"))?
        .hackathon_id;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let application = load_application(conn, application_id).await?;
    let hackathon = load_hackathon(conn, &hackathon_id).await?;
    if application.applicant_id != user_id && hackathon.organizer_id != user_id {
        return Err(ArbitrationError::Authorization(
            "only the applicant or the organizer can expire an application".into(),
        ));
    }

    let expired = expire_in(conn, &application, now).await?;
    section.commit().await?;
    info!(application_id, user_id, "application expired");
    Ok(expired)
}

/// Organizer turns down an application that has not been confirmed yet. The held
/// reservation goes back to the pool; a leader's team is dissolved.
pub async fn reject_application(
    engine: &ArbitrationEngine,
    organizer_id: &str,
    application_id: &str,
) -> ArbitrationResult<ApplicationRow> {
    let hackathon_id = application_repo::load_application(engine.pool(), application_id)
        .await?
        .ok_or(ArbitrationError::NotFound("application"))?
        .hackathon_id;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let application = load_application(conn, application_id).await?;
    let hackathon = load_hackathon(conn, &hackathon_id).await?;
    if hackathon.organizer_id != organizer_id {
        return Err(ArbitrationError::Authorization(
            "only the organizer can reject an application".into(),
        ));
    }

    let rejected = close_in(conn, &application, ApplicationStatus::Rejected, now).await?;
    section.commit().await?;
    info!(application_id, organizer_id, "application rejected");
    Ok(rejected)
}

pub async fn list_mine(engine: &ArbitrationEngine, user_id: &str) -> ArbitrationResult<Vec<ApplicationRow>> {
    Ok(application_repo::list_by_applicant(engine.pool(), user_id).await?)
}

pub async fn get_application(
    engine: &ArbitrationEngine,
    user_id: &str,
    application_id: &str,
) -> ArbitrationResult<ApplicationRow> {
    let application = application_repo::load_application(engine.pool(), application_id)
        .await?
        .ok_or(ArbitrationError::NotFound("application"))?;
    if application.applicant_id == user_id {
        return Ok(application);
    }
    let hackathon = hackathon_repo::load_hackathon(engine.pool(), &application.hackathon_id)
        .await?
        .ok_or(ArbitrationError::NotFound("hackathon"))?;
    if hackathon.organizer_id != user_id {
        return Err(ArbitrationError::Authorization(
            "application belongs to someone else".into(),
        ));
    }
    Ok(application)
}

pub async fn list_for_hackathon(
    engine: &ArbitrationEngine,
    user_id: &str,
    hackathon_id: &str,
) -> ArbitrationResult<Vec<ApplicationRow>> {
    require_organizer(engine, user_id, hackathon_id).await?;
    Ok(application_repo::list_by_hackathon(engine.pool(), hackathon_id).await?)
}

pub async fn application_stats(
    engine: &ArbitrationEngine,
    user_id: &str,
    hackathon_id: &str,
) -> ArbitrationResult<ApplicationStats> {
    require_organizer(engine, user_id, hackathon_id).await?;
    let counts = application_repo::count_by_status(engine.pool(), hackathon_id).await?;

    let mut stats = ApplicationStats {
        hackathon_id: hackathon_id.to_string(),
        ..Default::default()
    };
    for (status, count) in counts {
        stats.total += count;
        let slot = match status {
            ApplicationStatus::Applied => &mut stats.applied,
            ApplicationStatus::PaymentPending => &mut stats.payment_pending,
            ApplicationStatus::TeamPending => &mut stats.team_pending,
            ApplicationStatus::Confirmed => &mut stats.confirmed,
            ApplicationStatus::Rejected => &mut stats.rejected,
            ApplicationStatus::Expired => &mut stats.expired,
        };
        *slot += count;
    }
    Ok(stats)
}

/// Seated = holds (or consumed) a registration seat, or is active in some team.
pub(crate) async fn is_seated(
    conn: &mut SqliteConnection,
    hackathon_id: &str,
    user_id: &str,
) -> ArbitrationResult<bool> {
    if application_repo::find_seat_holding(&mut *conn, hackathon_id, user_id)
        .await?
        .is_some()
    {
        return Ok(true);
    }
    Ok(membership_repo::find_active_in_hackathon(&mut *conn, hackathon_id, user_id)
        .await?
        .is_some())
}

/// Confirms the leader's application once the leader seat is paid for and the team has
/// no seats left to fill.
pub(crate) async fn confirm_leader_if_complete(
    conn: &mut SqliteConnection,
    team: &TeamRow,
    now: DateTime<Utc>,
) -> ArbitrationResult<Option<ApplicationRow>> {
    let Some(team) = team_repo::load_team(&mut *conn, &team.team_id).await? else {
        return Ok(None);
    };
    let application = load_application(conn, &team.application_id).await?;
    let complete = application.status == ApplicationStatus::TeamPending
        && application.seat_committed()
        && team.open_seats() == 0
        && team.derived_status() != crate::models::TeamStatus::Inactive;
    if !complete {
        return Ok(None);
    }
    let confirmed = apply_transition(
        conn,
        &application,
        ApplicationStatus::Confirmed,
        application.payment_status,
        now,
    )
    .await?;
    info!(
        team_id = %team.team_id,
        application_id = %confirmed.application_id,
        "team seated, leader application confirmed"
    );
    Ok(Some(confirmed))
}

/// Called by the sweep when an application's reservation ran past its ttl.
pub(crate) async fn settle_lapsed_application(
    conn: &mut SqliteConnection,
    application: &ApplicationRow,
    min_team_size: i64,
    now: DateTime<Utc>,
) -> ArbitrationResult<LapseOutcome> {
    match application.status {
        ApplicationStatus::PaymentPending => {
            apply_transition(
                conn,
                application,
                ApplicationStatus::Expired,
                application.payment_status,
                now,
            )
            .await?;
            Ok(LapseOutcome::Expired)
        }
        ApplicationStatus::TeamPending => {
            let team = team_repo::find_by_application(&mut *conn, &application.application_id).await?;
            let formed = application.seat_committed()
                && team
                    .as_ref()
                    .is_some_and(|t| t.active_members >= min_team_size);
            match team {
                Some(team) if formed => {
                    team_service::finalize_team(conn, &team, now).await?;
                    apply_transition(
                        conn,
                        application,
                        ApplicationStatus::Confirmed,
                        application.payment_status,
                        now,
                    )
                    .await?;
                    info!(
                        team_id = %team.team_id,
                        members = team.active_members,
                        "formation deadline reached, team confirmed at current size"
                    );
                    Ok(LapseOutcome::Confirmed)
                }
                _ => {
                    expire_in(conn, application, now).await?;
                    Ok(LapseOutcome::Expired)
                }
            }
        }
        _ => Ok(LapseOutcome::Untouched),
    }
}

async fn expire_in(
    conn: &mut SqliteConnection,
    application: &ApplicationRow,
    now: DateTime<Utc>,
) -> ArbitrationResult<ApplicationRow> {
    close_in(conn, application, ApplicationStatus::Expired, now).await
}

/// Ends a pending application as `expired` or `rejected`: the reservation is released
/// and a leader's team is torn down.
async fn close_in(
    conn: &mut SqliteConnection,
    application: &ApplicationRow,
    next: ApplicationStatus,
    now: DateTime<Utc>,
) -> ArbitrationResult<ApplicationRow> {
    application.status.transition(next)?;
    if let Some(reservation_id) = application.reservation_id.as_deref() {
        capacity_ledger::release(conn, reservation_id, now).await?;
    }
    let closed = apply_transition(conn, application, next, application.payment_status, now).await?;

    if application.application_type == ApplicationType::TeamLeader {
        if let Some(team) =
            team_repo::find_by_application(&mut *conn, &application.application_id).await?
        {
            warn!(
                team_id = %team.team_id,
                status = next.as_str(),
                "leader application closed, team deactivated"
            );
            team_service::deactivate_team(conn, &team, now).await?;
        }
    }
    Ok(closed)
}

async fn apply_transition(
    conn: &mut SqliteConnection,
    application: &ApplicationRow,
    next: ApplicationStatus,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
) -> ArbitrationResult<ApplicationRow> {
    let status = application.status.transition(next)?;
    if !application_repo::update_state(
        &mut *conn,
        &application.application_id,
        application.status,
        status,
        payment_status,
        now,
    )
    .await?
    {
        return Err(ArbitrationError::Conflict(
            "application changed concurrently".into(),
        ));
    }
    Ok(ApplicationRow {
        status,
        payment_status,
        updated_at: now,
        ..application.clone()
    })
}

async fn set_payment_status(
    conn: &mut SqliteConnection,
    application: &ApplicationRow,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
) -> ArbitrationResult<ApplicationRow> {
    if !application_repo::update_state(
        &mut *conn,
        &application.application_id,
        application.status,
        application.status,
        payment_status,
        now,
    )
    .await?
    {
        return Err(ArbitrationError::Conflict(
            "application changed concurrently".into(),
        ));
    }
    Ok(ApplicationRow {
        payment_status,
        updated_at: now,
        ..application.clone()
    })
}

async fn require_organizer(
    engine: &ArbitrationEngine,
    user_id: &str,
    hackathon_id: &str,
) -> ArbitrationResult<HackathonRow> {
    let hackathon = hackathon_repo::load_hackathon(engine.pool(), hackathon_id)
        .await?
        .ok_or(ArbitrationError::NotFound("hackathon"))?;
    if hackathon.organizer_id != user_id {
        return Err(ArbitrationError::Authorization(
            "only the organizer can view this".into(),
        ));
    }
    Ok(hackathon)
}

async fn load_application(
    conn: &mut SqliteConnection,
    application_id: &str,
) -> ArbitrationResult<ApplicationRow> {
    application_repo::load_application(&mut *conn, application_id)
        .await?
        .ok_or(ArbitrationError::NotFound("application"))
}

async fn load_hackathon(conn: &mut SqliteConnection, hackathon_id: &str) -> ArbitrationResult<HackathonRow> {
    hackathon_repo::load_hackathon(&mut *conn, hackathon_id)
        .await?
        .ok_or(ArbitrationError::NotFound("hackathon"))
}
