use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReservationStatus {
    Held,
    Committed,
    Released,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ReservationRow {
    pub reservation_id: String,
    pub hackathon_id: String,
    pub units: i64,
    pub committed_units: i64,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl ReservationRow {
    /// Units still held back from the pool.
    pub fn outstanding(&self) -> i64 {
        match self.status {
            ReservationStatus::Held => self.units - self.committed_units,
            _ => 0,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Held && !self.has_lapsed(now)
    }

    /// The ttl instant itself still belongs to the reservation, matching the inclusive
    /// end of the registration window.
    pub fn has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
