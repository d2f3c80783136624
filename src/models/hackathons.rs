use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ApplicationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RegistrationType {
    Individual,
    Team,
    Both,
}

impl RegistrationType {
    pub fn permits(self, application_type: ApplicationType) -> bool {
        matches!(
            (self, application_type),
            (RegistrationType::Both, _)
                | (RegistrationType::Individual, ApplicationType::Individual)
                | (RegistrationType::Team, ApplicationType::TeamLeader)
        )
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HackathonRow {
    pub hackathon_id: String,
    pub title: String,
    pub organizer_id: String,
    pub max_participants: i64,
    /// Only ever moved by the capacity ledger.
    pub confirmed_participants: i64,
    /// Outstanding units across all held reservations.
    pub reserved_units: i64,
    pub min_team_size: i64,
    pub max_team_size: i64,
    pub registration_type: RegistrationType,
    pub registration_start: DateTime<Utc>,
    pub registration_end: DateTime<Utc>,
    pub is_free: bool,
    pub registration_fee_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl HackathonRow {
    pub fn available_spots(&self) -> i64 {
        (self.max_participants - self.confirmed_participants - self.reserved_units).max(0)
    }

    pub fn window_open(&self, now: DateTime<Utc>) -> bool {
        now >= self.registration_start && now <= self.registration_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_type_gates_application_type() {
        assert!(RegistrationType::Both.permits(ApplicationType::Individual));
        assert!(RegistrationType::Both.permits(ApplicationType::TeamLeader));
        assert!(RegistrationType::Individual.permits(ApplicationType::Individual));
        assert!(!RegistrationType::Individual.permits(ApplicationType::TeamLeader));
        assert!(!RegistrationType::Team.permits(ApplicationType::Individual));
    }
}
