use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ArbitrationError, ArbitrationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApplicationType {
    Individual,
    TeamLeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    PaymentPending,
    TeamPending,
    Confirmed,
    Rejected,
    Expired,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Applied,
        ApplicationStatus::PaymentPending,
        ApplicationStatus::TeamPending,
        ApplicationStatus::Confirmed,
        ApplicationStatus::Rejected,
        ApplicationStatus::Expired,
    ];

    /// The one transition table for applications.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, next),
            (Applied, PaymentPending | TeamPending | Confirmed | Rejected)
                | (PaymentPending, Confirmed | Rejected | Expired)
                | (TeamPending, Confirmed | Rejected | Expired)
        )
    }

    pub fn transition(self, next: ApplicationStatus) -> ArbitrationResult<ApplicationStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ArbitrationError::Conflict(format!(
                "application cannot move from {} to {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Confirmed | ApplicationStatus::Rejected | ApplicationStatus::Expired
        )
    }

    /// Holds (or has consumed) capacity: blocks a second registration.
    pub fn holds_seat(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Applied
                | ApplicationStatus::PaymentPending
                | ApplicationStatus::TeamPending
                | ApplicationStatus::Confirmed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::PaymentPending => "payment_pending",
            ApplicationStatus::TeamPending => "team_pending",
            ApplicationStatus::Confirmed => "confirmed",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    None,
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ApplicationRow {
    pub application_id: String,
    pub hackathon_id: String,
    pub applicant_id: String,
    pub application_type: ApplicationType,
    pub status: ApplicationStatus,
    pub payment_status: PaymentStatus,
    pub preferred_team_size: i64,
    pub reservation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRow {
    /// Whether the applicant's own seat has been turned into a confirmed participant.
    pub fn seat_committed(&self) -> bool {
        self.payment_status != PaymentStatus::Pending
    }
}
