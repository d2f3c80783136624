use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ArbitrationError, ArbitrationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Active,
    Declined,
    Rejected,
    Expired,
    Left,
}

impl MembershipStatus {
    pub const ALL: [MembershipStatus; 6] = [
        MembershipStatus::Pending,
        MembershipStatus::Active,
        MembershipStatus::Declined,
        MembershipStatus::Rejected,
        MembershipStatus::Expired,
        MembershipStatus::Left,
    ];

    /// The one transition table for memberships.
    pub fn can_transition_to(self, next: MembershipStatus) -> bool {
        use MembershipStatus::*;
        matches!(
            (self, next),
            (Pending, Active | Declined | Rejected | Expired) | (Active, Left)
        )
    }

    pub fn transition(self, next: MembershipStatus) -> ArbitrationResult<MembershipStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ArbitrationError::Conflict(format!(
                "membership cannot move from {} to {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, MembershipStatus::Pending | MembershipStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Active => "active",
            MembershipStatus::Declined => "declined",
            MembershipStatus::Rejected => "rejected",
            MembershipStatus::Expired => "expired",
            MembershipStatus::Left => "left",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MembershipRole {
    Leader,
    Member,
}

/// Who started the membership, which decides who gets to resolve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOrigin {
    JoinRequest,
    Invitation,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MembershipRow {
    pub membership_id: String,
    pub team_id: String,
    pub hackathon_id: String,
    pub user_id: String,
    pub role: MembershipRole,
    pub status: MembershipStatus,
    pub invited_by: Option<String>,
    pub message: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl MembershipRow {
    pub fn origin(&self) -> MembershipOrigin {
        if self.invited_by.is_some() {
            MembershipOrigin::Invitation
        } else {
            MembershipOrigin::JoinRequest
        }
    }

    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == MembershipStatus::Pending && self.expires_at.is_some_and(|at| at <= now)
    }
}
