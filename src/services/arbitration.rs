//! Atomic check-and-mutate sections.
//!
//! Every decision that reads capacity or membership state and then writes it runs inside
//! an [`ArbitrationSection`]: the per-hackathon lock is held and a single database
//! transaction is open for the whole read-decide-write step. Counters are additionally
//! moved with conditional `UPDATE`s, so even a writer outside this process can never
//! push them past their bounds. Dropping a section without [`ArbitrationSection::commit`]
//! rolls back the decision; the sweep that ran on entry is already committed.
//!
//! Both transactions start as `BEGIN IMMEDIATE`, so writers on other connections queue on
//! the pool's busy timeout instead of failing mid-section.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::clock::{Clock, SystemClock};
use crate::config::ArbitrationSettings;
use crate::error::ArbitrationResult;
use crate::services::expiry_service::{self, SweepReport};

const LOCK_TABLE_PRUNE_AT: usize = 1024;

// Takes the write lock up front. A deferred transaction that has already read cannot wait
// for another connection's write to finish and fails with SQLITE_BUSY instead.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

#[derive(Default)]
struct LockTable {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.len() >= LOCK_TABLE_PRUNE_AT {
            // Only the table holds these: nobody owns or waits on them.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots.entry(key.to_string()).or_default().clone()
    }
}

/// Shared handle to the pool, the clock and the per-hackathon locks.
#[derive(Clone)]
pub struct ArbitrationEngine {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    settings: Arc<ArbitrationSettings>,
    locks: Arc<LockTable>,
}

impl ArbitrationEngine {
    pub fn new(pool: SqlitePool, settings: ArbitrationSettings) -> Self {
        Self::with_clock(pool, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, settings: ArbitrationSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            settings: Arc::new(settings),
            locks: Arc::new(LockTable::default()),
        }
    }

    /// For plain reads only. Never use this while holding a section.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn settings(&self) -> &ArbitrationSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Opens an atomic section over one hackathon's ledger, teams and memberships.
    /// Expired reservations and lapsed memberships are swept before the caller runs.
    pub async fn enter(&self, hackathon_id: &str) -> ArbitrationResult<ArbitrationSection> {
        let (section, _) = self.open(hackathon_id).await?;
        Ok(section)
    }

    /// Runs only the sweep for one hackathon and commits it.
    pub async fn sweep(&self, hackathon_id: &str) -> ArbitrationResult<SweepReport> {
        let (section, report) = self.open(hackathon_id).await?;
        section.commit().await?;
        Ok(report)
    }

    async fn open(&self, hackathon_id: &str) -> ArbitrationResult<(ArbitrationSection, SweepReport)> {
        let guard = self.locks.slot(hackathon_id).lock_owned().await;
        let now = self.clock.now();

        // The sweep commits on its own so a failed decision does not resurrect lapsed state.
        let mut sweep = self.pool.begin_with(BEGIN_WRITE).await?;
        let report = expiry_service::sweep_hackathon(&mut *sweep, hackathon_id, now).await?;
        sweep.commit().await?;

        let tx = self.pool.begin_with(BEGIN_WRITE).await?;
        let section = ArbitrationSection {
            tx,
            now,
            _guard: guard,
        };
        Ok((section, report))
    }
}

pub struct ArbitrationSection {
    // Declared before the guard: the transaction is rolled back before the lock opens.
    tx: Transaction<'static, Sqlite>,
    now: DateTime<Utc>,
    _guard: OwnedMutexGuard<()>,
}

impl ArbitrationSection {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// The instant every decision in this section is judged against.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub async fn commit(self) -> ArbitrationResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
