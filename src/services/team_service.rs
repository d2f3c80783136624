use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SeatReleasePolicy;
use crate::database::{
    application_repo, hackathon_repo, membership_repo, reservation_repo, team_repo,
};
use crate::error::{ArbitrationError, ArbitrationResult};
use crate::models::{
    ApplicationRow, ApplicationStatus, ApplicationType, HackathonRow, MembershipOrigin,
    MembershipRole, MembershipRow, MembershipStatus, TeamRow, TeamStatus,
};
use crate::services::arbitration::ArbitrationEngine;
use crate::services::{application_service, capacity_ledger, user_service};

const TEAM_LIST_LIMIT: i64 = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
    pub application_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InviteRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinRequest {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteeResponse {
    Accept,
    Decline,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: TeamRow,
    pub open_seats: i64,
    pub members: Vec<MembershipRow>,
}

/// Names (or renames) the team of a team-leader application. Submission already spawned
/// the team, so this normally just updates it; it only creates one if none exists yet.
pub async fn create_team(
    engine: &ArbitrationEngine,
    user_id: &str,
    request: NewTeam,
) -> ArbitrationResult<TeamRow> {
    let name = clean(request.name.as_deref());
    let description = clean(request.description.as_deref());
    if name.is_some_and(|n| n.chars().count() > 80) {
        return Err(ArbitrationError::Validation("team name is too long".into()));
    }

    let hackathon_id = application_repo::load_application(engine.pool(), &request.application_id)
        .await?
        .ok_or(ArbitrationError::NotFound("application"))?
        .hackathon_id;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let application = application_repo::load_application(&mut *conn, &request.application_id)
        .await?
        .ok_or(ArbitrationError::NotFound("application"))?;
    if application.applicant_id != user_id {
        return Err(ArbitrationError::Authorization(
            "only the applicant can manage this team".into(),
        ));
    }
    if application.application_type != ApplicationType::TeamLeader {
        return Err(ArbitrationError::Validation(
            "only team-leader applications have a team".into(),
        ));
    }

    let team = match team_repo::find_by_application(&mut *conn, &application.application_id).await? {
        Some(existing) => {
            team_repo::update_details(&mut *conn, &existing.team_id, name, description).await?;
            load_team(conn, &existing.team_id).await?
        }
        None => {
            if application.status != ApplicationStatus::TeamPending {
                return Err(ArbitrationError::Conflict(format!(
                    "application is {}",
                    application.status.as_str()
                )));
            }
            let team = spawn_team(conn, &application, name, description, now).await?;
            application_service::confirm_leader_if_complete(conn, &team, now).await?;
            load_team(conn, &team.team_id).await?
        }
    };

    section.commit().await?;
    info!(team_id = %team.team_id, user_id, "team details saved");
    Ok(team)
}

pub async fn request_join(
    engine: &ArbitrationEngine,
    user_id: &str,
    team_id: &str,
    request: JoinRequest,
) -> ArbitrationResult<MembershipRow> {
    let hackathon_id = team_hackathon(engine, team_id).await?;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let team = load_team(conn, team_id).await?;
    let hackathon = load_hackathon(conn, &hackathon_id).await?;
    check_open_for_candidates(&team, &hackathon, user_id, now)?;
    check_candidate(conn, &team, user_id).await?;

    let membership = new_membership(
        &team,
        user_id,
        None,
        clean(request.message.as_deref()),
        now,
        engine.settings().membership_ttl,
    );
    membership_repo::insert_membership(&mut *conn, &membership).await?;
    section.commit().await?;

    info!(
        team_id,
        user_id,
        membership_id = %membership.membership_id,
        "join request filed"
    );
    Ok(membership)
}

pub async fn invite_user(
    engine: &ArbitrationEngine,
    inviter_id: &str,
    team_id: &str,
    request: InviteRequest,
) -> ArbitrationResult<MembershipRow> {
    let hackathon_id = team_hackathon(engine, team_id).await?;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let team = load_team(conn, team_id).await?;
    if team.leader_id != inviter_id {
        return Err(ArbitrationError::Authorization(
            "only the team leader can invite".into(),
        ));
    }
    let invitee = user_service::resolve_invitee(
        conn,
        request.user_id.as_deref(),
        request.email.as_deref(),
    )
    .await?;
    if invitee == inviter_id {
        return Err(ArbitrationError::Validation(
            "the leader is already on the team".into(),
        ));
    }

    let hackathon = load_hackathon(conn, &hackathon_id).await?;
    check_open_for_candidates(&team, &hackathon, &invitee, now)?;
    check_candidate(conn, &team, &invitee).await?;

    let membership = new_membership(
        &team,
        &invitee,
        Some(inviter_id),
        clean(request.message.as_deref()),
        now,
        engine.settings().membership_ttl,
    );
    membership_repo::insert_membership(&mut *conn, &membership).await?;
    section.commit().await?;

    info!(
        team_id,
        inviter_id,
        invitee = %invitee,
        membership_id = %membership.membership_id,
        "invitation sent"
    );
    Ok(membership)
}

pub async fn respond_to_invitation(
    engine: &ArbitrationEngine,
    user_id: &str,
    membership_id: &str,
    response: InviteeResponse,
) -> ArbitrationResult<MembershipRow> {
    let hackathon_id = membership_hackathon(engine, membership_id).await?;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let membership = load_membership(conn, membership_id).await?;
    if membership.user_id != user_id {
        return Err(ArbitrationError::Authorization(
            "only the invitee can answer an invitation".into(),
        ));
    }
    if membership.origin() != MembershipOrigin::Invitation {
        return Err(ArbitrationError::Validation(
            "join requests are decided by the team leader".into(),
        ));
    }

    let updated = match response {
        InviteeResponse::Accept => activate(conn, &membership, now).await?,
        InviteeResponse::Decline => {
            close_pending(conn, &membership, MembershipStatus::Declined, now).await?
        }
    };
    section.commit().await?;

    info!(
        membership_id,
        user_id,
        status = updated.status.as_str(),
        "invitation answered"
    );
    Ok(updated)
}

pub async fn approve_join_request(
    engine: &ArbitrationEngine,
    leader_id: &str,
    membership_id: &str,
    decision: LeaderDecision,
) -> ArbitrationResult<MembershipRow> {
    let hackathon_id = membership_hackathon(engine, membership_id).await?;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let membership = load_membership(conn, membership_id).await?;
    let team = load_team(conn, &membership.team_id).await?;
    if team.leader_id != leader_id {
        return Err(ArbitrationError::Authorization(
            "only the team leader can decide join requests".into(),
        ));
    }
    if membership.origin() != MembershipOrigin::JoinRequest {
        return Err(ArbitrationError::Validation(
            "invitations are answered by the invitee".into(),
        ));
    }

    let updated = match decision {
        LeaderDecision::Approve => activate(conn, &membership, now).await?,
        LeaderDecision::Reject => {
            close_pending(conn, &membership, MembershipStatus::Rejected, now).await?
        }
    };
    section.commit().await?;

    info!(
        membership_id,
        leader_id,
        status = updated.status.as_str(),
        "join request decided"
    );
    Ok(updated)
}

pub async fn leave(
    engine: &ArbitrationEngine,
    user_id: &str,
    membership_id: &str,
) -> ArbitrationResult<MembershipRow> {
    let hackathon_id = membership_hackathon(engine, membership_id).await?;
    let policy = engine.settings().leave_policy;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let membership = load_membership(conn, membership_id).await?;
    if membership.user_id != user_id {
        return Err(ArbitrationError::Authorization(
            "only the member can leave".into(),
        ));
    }
    if membership.role == MembershipRole::Leader {
        return Err(ArbitrationError::Validation(
            "the team leader cannot leave; expire the application instead".into(),
        ));
    }

    let team = load_team(conn, &membership.team_id).await?;
    let (left, reopened) = release_member(conn, &team, &membership, policy, now).await?;
    section.commit().await?;

    info!(
        membership_id,
        team_id = %team.team_id,
        user_id,
        reopened,
        "member left team"
    );
    Ok(left)
}

/// Leader takes an active member off the team. The seat follows the same policy as a
/// voluntary leave.
pub async fn remove_member(
    engine: &ArbitrationEngine,
    leader_id: &str,
    membership_id: &str,
) -> ArbitrationResult<MembershipRow> {
    let hackathon_id = membership_hackathon(engine, membership_id).await?;
    let policy = engine.settings().leave_policy;

    let mut section = engine.enter(&hackathon_id).await?;
    let now = section.now();
    let conn = section.conn();

    let membership = load_membership(conn, membership_id).await?;
    let team = load_team(conn, &membership.team_id).await?;
    if team.leader_id != leader_id {
        return Err(ArbitrationError::Authorization(
            "only the team leader can remove members".into(),
        ));
    }
    if membership.role == MembershipRole::Leader {
        return Err(ArbitrationError::Validation(
            "the team leader cannot be removed".into(),
        ));
    }

    let (removed, reopened) = release_member(conn, &team, &membership, policy, now).await?;
    section.commit().await?;

    info!(
        membership_id,
        team_id = %team.team_id,
        leader_id,
        member = %membership.user_id,
        reopened,
        "member removed from team"
    );
    Ok(removed)
}

pub async fn get_team(engine: &ArbitrationEngine, team_id: &str) -> ArbitrationResult<TeamDetail> {
    let team = team_repo::load_team(engine.pool(), team_id)
        .await?
        .ok_or(ArbitrationError::NotFound("team"))?;
    let members =
        membership_repo::list_for_team(engine.pool(), team_id, Some(MembershipStatus::Active))
            .await?;
    Ok(TeamDetail {
        open_seats: team.open_seats(),
        team,
        members,
    })
}

pub async fn list_by_hackathon(
    engine: &ArbitrationEngine,
    hackathon_id: &str,
    status: Option<TeamStatus>,
) -> ArbitrationResult<Vec<TeamRow>> {
    hackathon_repo::load_hackathon(engine.pool(), hackathon_id)
        .await?
        .ok_or(ArbitrationError::NotFound("hackathon"))?;
    Ok(team_repo::list_by_hackathon(engine.pool(), hackathon_id, status, TEAM_LIST_LIMIT).await?)
}

pub async fn my_teams(engine: &ArbitrationEngine, user_id: &str) -> ArbitrationResult<Vec<TeamRow>> {
    Ok(team_repo::list_for_user(engine.pool(), user_id).await?)
}

/// Everything still open on the team: join requests waiting for the leader and
/// invitations waiting for an answer.
pub async fn pending_requests(
    engine: &ArbitrationEngine,
    leader_id: &str,
    team_id: &str,
) -> ArbitrationResult<Vec<MembershipRow>> {
    let team = team_repo::load_team(engine.pool(), team_id)
        .await?
        .ok_or(ArbitrationError::NotFound("team"))?;
    if team.leader_id != leader_id {
        return Err(ArbitrationError::Authorization(
            "only the team leader can see pending requests".into(),
        ));
    }
    Ok(membership_repo::list_for_team(engine.pool(), team_id, Some(MembershipStatus::Pending)).await?)
}

pub async fn my_memberships(
    engine: &ArbitrationEngine,
    user_id: &str,
) -> ArbitrationResult<Vec<MembershipRow>> {
    Ok(membership_repo::list_pending_for_user(engine.pool(), user_id).await?)
}

/// Creates the team of a freshly reserved team-leader application, leader seated.
pub(crate) async fn spawn_team(
    conn: &mut SqliteConnection,
    application: &ApplicationRow,
    name: Option<&str>,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> ArbitrationResult<TeamRow> {
    let reservation_id = application
        .reservation_id
        .as_deref()
        .ok_or_else(|| ArbitrationError::Conflict("application holds no reservation".into()))?;
    let reservation = reservation_repo::load_reservation(&mut *conn, reservation_id)
        .await?
        .ok_or(ArbitrationError::NotFound("reservation"))?;
    if !reservation.is_live(now) {
        return Err(ArbitrationError::Conflict(
            "the team reservation is no longer held".into(),
        ));
    }

    let team_id = Uuid::new_v4().to_string();
    let default_name = format!("Team {}", &team_id[..8]);
    let mut team = TeamRow {
        team_id,
        hackathon_id: application.hackathon_id.clone(),
        leader_id: application.applicant_id.clone(),
        application_id: application.application_id.clone(),
        reservation_id: reservation.reservation_id.clone(),
        name: name.map(str::to_string).unwrap_or(default_name),
        description: description.map(str::to_string),
        max_members: reservation.units,
        seats_used: 1,
        active_members: 1,
        status: TeamStatus::Looking,
        created_at: now,
    };
    team.status = team.derived_status();
    team_repo::insert_team(&mut *conn, &team).await?;

    let leader = MembershipRow {
        membership_id: Uuid::new_v4().to_string(),
        team_id: team.team_id.clone(),
        hackathon_id: team.hackathon_id.clone(),
        user_id: team.leader_id.clone(),
        role: MembershipRole::Leader,
        status: MembershipStatus::Active,
        invited_by: None,
        message: None,
        requested_at: now,
        responded_at: Some(now),
        expires_at: None,
    };
    membership_repo::insert_membership(&mut *conn, &leader).await?;

    info!(
        team_id = %team.team_id,
        hackathon_id = %team.hackathon_id,
        max_members = team.max_members,
        "team spawned"
    );
    Ok(team)
}

/// The one place a pending membership becomes active: exclusivity, the team seat and
/// the ledger commit all happen here, inside the caller's section.
pub(crate) async fn activate(
    conn: &mut SqliteConnection,
    membership: &MembershipRow,
    now: DateTime<Utc>,
) -> ArbitrationResult<MembershipRow> {
    let status = membership.status.transition(MembershipStatus::Active)?;
    let team = load_team(conn, &membership.team_id).await?;
    if team.status == TeamStatus::Inactive {
        return Err(ArbitrationError::Conflict("team is no longer active".into()));
    }
    if application_service::is_seated(conn, &membership.hackathon_id, &membership.user_id).await? {
        return Err(ArbitrationError::Conflict(
            "user is already seated in this hackathon".into(),
        ));
    }

    capacity_ledger::claim_team_seat(conn, &team, now).await?;
    if !membership_repo::update_status(
        &mut *conn,
        &membership.membership_id,
        MembershipStatus::Pending,
        status,
        now,
    )
    .await?
    {
        return Err(ArbitrationError::Conflict(
            "membership changed concurrently".into(),
        ));
    }
    team_repo::refresh_status(&mut *conn, &team.team_id).await?;
    application_service::confirm_leader_if_complete(conn, &team, now).await?;

    Ok(MembershipRow {
        status,
        responded_at: Some(now),
        ..membership.clone()
    })
}

/// Takes an active member off the team under `policy`. Returns the updated membership
/// and whether the seat went back to the team.
async fn release_member(
    conn: &mut SqliteConnection,
    team: &TeamRow,
    membership: &MembershipRow,
    policy: SeatReleasePolicy,
    now: DateTime<Utc>,
) -> ArbitrationResult<(MembershipRow, bool)> {
    membership.status.transition(MembershipStatus::Left)?;
    let reopened = match policy {
        SeatReleasePolicy::Spent => false,
        SeatReleasePolicy::Reopen => capacity_ledger::return_team_seat(conn, team, now).await?,
    };
    let left = vacate(conn, membership, reopened, now).await?;
    Ok((left, reopened))
}

/// `active -> left`, keeping the team counters in step. `free_seat` hands the seat
/// back to the team as well.
pub(crate) async fn vacate(
    conn: &mut SqliteConnection,
    membership: &MembershipRow,
    free_seat: bool,
    now: DateTime<Utc>,
) -> ArbitrationResult<MembershipRow> {
    let status = membership.status.transition(MembershipStatus::Left)?;
    if !membership_repo::update_status(
        &mut *conn,
        &membership.membership_id,
        MembershipStatus::Active,
        status,
        now,
    )
    .await?
    {
        return Err(ArbitrationError::Conflict(
            "membership changed concurrently".into(),
        ));
    }
    if !team_repo::member_left(&mut *conn, &membership.team_id, free_seat).await? {
        return Err(ArbitrationError::Conflict(
            "team counters changed concurrently".into(),
        ));
    }
    team_repo::refresh_status(&mut *conn, &membership.team_id).await?;
    Ok(MembershipRow {
        status,
        responded_at: Some(now),
        ..membership.clone()
    })
}

/// Tears down a team whose leader application expired: committed seats go back to the
/// pool, pending memberships expire and active ones are marked left.
pub(crate) async fn deactivate_team(
    conn: &mut SqliteConnection,
    team: &TeamRow,
    now: DateTime<Utc>,
) -> ArbitrationResult<()> {
    let refunded = capacity_ledger::refund_committed(conn, &team.reservation_id).await?;

    let memberships = membership_repo::list_for_team(&mut *conn, &team.team_id, None).await?;
    for membership in memberships {
        let next = match membership.status {
            MembershipStatus::Pending => MembershipStatus::Expired,
            MembershipStatus::Active => MembershipStatus::Left,
            _ => continue,
        };
        membership_repo::update_status(
            &mut *conn,
            &membership.membership_id,
            membership.status,
            next,
            now,
        )
        .await?;
    }
    team_repo::deactivate(&mut *conn, &team.team_id).await?;

    warn!(team_id = %team.team_id, refunded, "team deactivated");
    Ok(())
}

/// Closes a team at its current size once its formation deadline passed.
pub(crate) async fn finalize_team(
    conn: &mut SqliteConnection,
    team: &TeamRow,
    now: DateTime<Utc>,
) -> ArbitrationResult<()> {
    team_repo::close_at_current_size(&mut *conn, &team.team_id).await?;
    let pending =
        membership_repo::list_for_team(&mut *conn, &team.team_id, Some(MembershipStatus::Pending))
            .await?;
    for membership in pending {
        close_pending(conn, &membership, MembershipStatus::Expired, now).await?;
    }
    Ok(())
}

async fn close_pending(
    conn: &mut SqliteConnection,
    membership: &MembershipRow,
    next: MembershipStatus,
    now: DateTime<Utc>,
) -> ArbitrationResult<MembershipRow> {
    let status = membership.status.transition(next)?;
    if !membership_repo::update_status(
        &mut *conn,
        &membership.membership_id,
        MembershipStatus::Pending,
        status,
        now,
    )
    .await?
    {
        return Err(ArbitrationError::Conflict(
            "membership changed concurrently".into(),
        ));
    }
    Ok(MembershipRow {
        status,
        responded_at: Some(now),
        ..membership.clone()
    })
}

fn check_open_for_candidates(
    team: &TeamRow,
    hackathon: &HackathonRow,
    user_id: &str,
    now: DateTime<Utc>,
) -> ArbitrationResult<()> {
    if !hackathon.window_open(now) {
        return Err(ArbitrationError::WindowClosed);
    }
    if team.status == TeamStatus::Inactive {
        return Err(ArbitrationError::Conflict("team is no longer active".into()));
    }
    if team.open_seats() == 0 {
        return Err(ArbitrationError::CapacityExceeded {
            requested: 1,
            available: 0,
        });
    }
    if hackathon.organizer_id == user_id {
        return Err(ArbitrationError::OrganizerRestriction);
    }
    Ok(())
}

async fn check_candidate(
    conn: &mut SqliteConnection,
    team: &TeamRow,
    user_id: &str,
) -> ArbitrationResult<()> {
    if application_service::is_seated(conn, &team.hackathon_id, user_id).await? {
        return Err(ArbitrationError::AlreadyRegistered);
    }
    if membership_repo::find_pending_for_team(&mut *conn, &team.team_id, user_id)
        .await?
        .is_some()
    {
        return Err(ArbitrationError::Conflict(
            "a pending membership for this team already exists".into(),
        ));
    }
    Ok(())
}

fn new_membership(
    team: &TeamRow,
    user_id: &str,
    invited_by: Option<&str>,
    message: Option<&str>,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> MembershipRow {
    MembershipRow {
        membership_id: Uuid::new_v4().to_string(),
        team_id: team.team_id.clone(),
        hackathon_id: team.hackathon_id.clone(),
        user_id: user_id.to_string(),
        role: MembershipRole::Member,
        status: MembershipStatus::Pending,
        invited_by: invited_by.map(str::to_string),
        message: message.map(str::to_string),
        requested_at: now,
        responded_at: None,
        expires_at: Some(now + ttl),
    }
}

async fn team_hackathon(engine: &ArbitrationEngine, team_id: &str) -> ArbitrationResult<String> {
    Ok(team_repo::load_team(engine.pool(), team_id)
        .await?
        .ok_or(ArbitrationError::NotFound("team"))?
        .hackathon_id)
}

async fn membership_hackathon(
    engine: &ArbitrationEngine,
    membership_id: &str,
) -> ArbitrationResult<String> {
    Ok(membership_repo::load_membership(engine.pool(), membership_id)
        .await?
        .ok_or(ArbitrationError::NotFound("membership"))?
        .hackathon_id)
}

async fn load_team(conn: &mut SqliteConnection, team_id: &str) -> ArbitrationResult<TeamRow> {
    team_repo::load_team(&mut *conn, team_id)
        .await?
        .ok_or(ArbitrationError::NotFound("team"))
}

async fn load_membership(
    conn: &mut SqliteConnection,
    membership_id: &str,
) -> ArbitrationResult<MembershipRow> {
    membership_repo::load_membership(&mut *conn, membership_id)
        .await?
        .ok_or(ArbitrationError::NotFound("membership"))
}

async fn load_hackathon(conn: &mut SqliteConnection, hackathon_id: &str) -> ArbitrationResult<HackathonRow> {
    hackathon_repo::load_hackathon(&mut *conn, hackathon_id)
        .await?
        .ok_or(ArbitrationError::NotFound("hackathon"))
}

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
