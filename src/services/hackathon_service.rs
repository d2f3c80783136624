use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::database::hackathon_repo;
use crate::error::{ArbitrationError, ArbitrationResult};
use crate::models::{HackathonRow, RegistrationType};
use crate::services::arbitration::ArbitrationEngine;
use crate::services::capacity_ledger;

const HACKATHON_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct NewHackathon {
    pub title: String,
    pub max_participants: i64,
    #[serde(default = "default_team_size")]
    pub min_team_size: i64,
    #[serde(default = "default_team_size")]
    pub max_team_size: i64,
    pub registration_type: RegistrationType,
    pub registration_start: DateTime<Utc>,
    pub registration_end: DateTime<Utc>,
    #[serde(default)]
    pub registration_fee_cents: i64,
}

fn default_team_size() -> i64 {
    1
}

impl NewHackathon {
    pub fn validate(&self) -> ArbitrationResult<()> {
        if self.title.trim().is_empty() {
            return Err(ArbitrationError::Validation("title is required".into()));
        }
        if self.max_participants < 1 {
            return Err(ArbitrationError::Validation(
                "max_participants must be at least 1".into(),
            ));
        }
        if self.min_team_size < 1 || self.min_team_size > self.max_team_size {
            return Err(ArbitrationError::Validation(
                "team sizes must satisfy 1 <= min_team_size <= max_team_size".into(),
            ));
        }
        if self.registration_end <= self.registration_start {
            return Err(ArbitrationError::Validation(
                "registration_end must be after registration_start".into(),
            ));
        }
        if self.registration_fee_cents < 0 {
            return Err(ArbitrationError::Validation("fee cannot be negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HackathonView {
    #[serde(flatten)]
    pub hackathon: HackathonRow,
    pub available_spots: i64,
    pub registration_open: bool,
}

impl HackathonView {
    fn at(hackathon: HackathonRow, now: DateTime<Utc>) -> Self {
        Self {
            available_spots: hackathon.available_spots(),
            registration_open: hackathon.window_open(now),
            hackathon,
        }
    }
}

pub async fn create_hackathon(
    engine: &ArbitrationEngine,
    organizer_id: &str,
    request: NewHackathon,
) -> ArbitrationResult<HackathonRow> {
    request.validate()?;
    let now = engine.now();
    let row = HackathonRow {
        hackathon_id: Uuid::new_v4().to_string(),
        title: request.title.trim().to_string(),
        organizer_id: organizer_id.to_string(),
        max_participants: request.max_participants,
        confirmed_participants: 0,
        reserved_units: 0,
        min_team_size: request.min_team_size,
        max_team_size: request.max_team_size,
        registration_type: request.registration_type,
        registration_start: request.registration_start,
        registration_end: request.registration_end,
        is_free: request.registration_fee_cents == 0,
        registration_fee_cents: request.registration_fee_cents,
        created_at: now,
    };
    hackathon_repo::insert_hackathon(engine.pool(), &row).await?;
    info!(
        hackathon_id = %row.hackathon_id,
        organizer_id,
        max_participants = row.max_participants,
        "hackathon created"
    );
    Ok(row)
}

/// Reads the hackathon after settling anything that lapsed, so the spot count is current.
pub async fn get_hackathon(
    engine: &ArbitrationEngine,
    hackathon_id: &str,
) -> ArbitrationResult<HackathonView> {
    let mut section = engine.enter(hackathon_id).await?;
    let now = section.now();
    let hackathon = hackathon_repo::load_hackathon(section.conn(), hackathon_id)
        .await?
        .ok_or(ArbitrationError::NotFound("hackathon"))?;
    section.commit().await?;
    Ok(HackathonView::at(hackathon, now))
}

pub async fn list_hackathons(engine: &ArbitrationEngine) -> ArbitrationResult<Vec<HackathonView>> {
    let now = engine.now();
    let rows = hackathon_repo::list_hackathons(engine.pool(), HACKATHON_LIST_LIMIT).await?;
    Ok(rows.into_iter().map(|h| HackathonView::at(h, now)).collect())
}

pub async fn available_spots(engine: &ArbitrationEngine, hackathon_id: &str) -> ArbitrationResult<i64> {
    let mut section = engine.enter(hackathon_id).await?;
    let spots = capacity_ledger::available_spots(section.conn(), hackathon_id).await?;
    section.commit().await?;
    Ok(spots)
}
