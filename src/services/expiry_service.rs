//! The lazy sweep: runs at the top of every arbitration section.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use crate::database::{application_repo, hackathon_repo, membership_repo};
use crate::error::ArbitrationResult;
use crate::models::MembershipStatus;
use crate::services::application_service::{self, LapseOutcome};
use crate::services::capacity_ledger;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub reservations_expired: usize,
    pub applications_expired: usize,
    pub applications_confirmed: usize,
    pub memberships_expired: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == SweepReport::default()
    }

    pub fn absorb(&mut self, other: &SweepReport) {
        self.reservations_expired += other.reservations_expired;
        self.applications_expired += other.applications_expired;
        self.applications_confirmed += other.applications_confirmed;
        self.memberships_expired += other.memberships_expired;
    }
}

/// Expires lapsed reservations, settles the applications behind them and times out
/// pending memberships. Unknown hackathons sweep to an empty report.
pub async fn sweep_hackathon(
    conn: &mut SqliteConnection,
    hackathon_id: &str,
    now: DateTime<Utc>,
) -> ArbitrationResult<SweepReport> {
    let mut report = SweepReport::default();
    let Some(hackathon) = hackathon_repo::load_hackathon(&mut *conn, hackathon_id).await? else {
        return Ok(report);
    };

    let expired = capacity_ledger::sweep_expired(conn, hackathon_id, now).await?;
    report.reservations_expired = expired.len();

    for reservation in &expired {
        let Some(application) =
            application_repo::find_by_reservation(&mut *conn, &reservation.reservation_id).await?
        else {
            continue;
        };
        let outcome = application_service::settle_lapsed_application(
            conn,
            &application,
            hackathon.min_team_size,
            now,
        )
        .await?;
        match outcome {
            LapseOutcome::Expired => report.applications_expired += 1,
            LapseOutcome::Confirmed => report.applications_confirmed += 1,
            LapseOutcome::Untouched => {}
        }
    }

    let pending = membership_repo::list_pending_in_hackathon(&mut *conn, hackathon_id).await?;
    for membership in pending.into_iter().filter(|m| m.is_lapsed(now)) {
        if membership_repo::update_status(
            &mut *conn,
            &membership.membership_id,
            MembershipStatus::Pending,
            MembershipStatus::Expired,
            now,
        )
        .await?
        {
            report.memberships_expired += 1;
        }
    }

    if !report.is_empty() {
        info!(hackathon_id, ?report, "sweep settled lapsed state");
    }
    Ok(report)
}
