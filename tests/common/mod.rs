#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use hackmate::clock::ManualClock;
use hackmate::config::{ArbitrationSettings, SeatReleasePolicy};
use hackmate::database::{self, hackathon_repo, reservation_repo};
use hackmate::models::{HackathonRow, RegistrationType, ReservationRow};
use hackmate::services::ArbitrationEngine;

pub const ORGANIZER: &str = "organizer-1";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub struct TestEnv {
    pub engine: ArbitrationEngine,
    pub clock: Arc<ManualClock>,
    // Keeps the database file alive for file-backed environments.
    _dir: Option<TempDir>,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_settings(ArbitrationSettings::default()).await
    }

    pub async fn with_policy(policy: SeatReleasePolicy) -> Self {
        Self::with_settings(ArbitrationSettings {
            leave_policy: policy,
            ..ArbitrationSettings::default()
        })
        .await
    }

    pub async fn with_settings(settings: ArbitrationSettings) -> Self {
        let pool = database::connect_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = ArbitrationEngine::with_clock(pool, settings, clock.clone());
        Self {
            engine,
            clock,
            _dir: None,
        }
    }

    /// WAL database file behind a pool of several connections, as in production.
    pub async fn on_disk(max_connections: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("hackmate.db").display());
        let pool = database::connect(&url, max_connections).await.unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = ArbitrationEngine::with_clock(pool, ArbitrationSettings::default(), clock.clone());
        Self {
            engine,
            clock,
            _dir: Some(dir),
        }
    }

    pub async fn hackathon(&self, seed: HackathonSeed) -> HackathonRow {
        let row = HackathonRow {
            hackathon_id: seed.id.to_string(),
            title: format!("Hack {}", seed.id),
            organizer_id: ORGANIZER.to_string(),
            max_participants: seed.max_participants,
            confirmed_participants: 0,
            reserved_units: 0,
            min_team_size: seed.min_team_size,
            max_team_size: seed.max_team_size,
            registration_type: seed.registration_type,
            registration_start: t0() - Duration::days(1),
            registration_end: t0() + Duration::days(seed.open_days),
            is_free: seed.fee_cents == 0,
            registration_fee_cents: seed.fee_cents,
            created_at: t0() - Duration::days(2),
        };
        hackathon_repo::insert_hackathon(self.engine.pool(), &row)
            .await
            .unwrap();
        row
    }

    pub async fn load_hackathon(&self, id: &str) -> HackathonRow {
        hackathon_repo::load_hackathon(self.engine.pool(), id)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn reservation(&self, id: &str) -> ReservationRow {
        reservation_repo::load_reservation(self.engine.pool(), id)
            .await
            .unwrap()
            .unwrap()
    }
}

#[derive(Debug, Clone)]
pub struct HackathonSeed {
    pub id: &'static str,
    pub max_participants: i64,
    pub min_team_size: i64,
    pub max_team_size: i64,
    pub registration_type: RegistrationType,
    pub fee_cents: i64,
    pub open_days: i64,
}

impl HackathonSeed {
    pub fn free(id: &'static str, max_participants: i64) -> Self {
        Self {
            id,
            max_participants,
            min_team_size: 1,
            max_team_size: 5,
            registration_type: RegistrationType::Both,
            fee_cents: 0,
            open_days: 14,
        }
    }

    pub fn paid(id: &'static str, max_participants: i64, fee_cents: i64) -> Self {
        Self {
            fee_cents,
            ..Self::free(id, max_participants)
        }
    }

    pub fn teams(mut self, min: i64, max: i64) -> Self {
        self.min_team_size = min;
        self.max_team_size = max;
        self
    }

    pub fn only(mut self, registration_type: RegistrationType) -> Self {
        self.registration_type = registration_type;
        self
    }
}
