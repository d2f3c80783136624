use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TeamStatus {
    Looking,
    Full,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TeamRow {
    pub team_id: String,
    pub hackathon_id: String,
    pub leader_id: String,
    pub application_id: String,
    pub reservation_id: String,
    pub name: String,
    pub description: Option<String>,
    pub max_members: i64,
    /// Units drawn from the team reservation, leader included. Departed members keep
    /// their seat here unless the reopen policy hands it back.
    pub seats_used: i64,
    pub active_members: i64,
    pub status: TeamStatus,
    pub created_at: DateTime<Utc>,
}

impl TeamRow {
    pub fn open_seats(&self) -> i64 {
        (self.max_members - self.seats_used).max(0)
    }

    pub fn derived_status(&self) -> TeamStatus {
        if self.status == TeamStatus::Inactive {
            TeamStatus::Inactive
        } else if self.open_seats() == 0 {
            TeamStatus::Full
        } else {
            TeamStatus::Looking
        }
    }
}
