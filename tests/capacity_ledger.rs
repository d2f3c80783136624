mod common;

use chrono::Duration;

use common::{t0, HackathonSeed, TestEnv};
use hackmate::models::ReservationStatus;
use hackmate::services::capacity_ledger;
use hackmate::ArbitrationError;

#[tokio::test]
async fn reserve_holds_units_until_committed() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 10)).await;

    let mut section = env.engine.enter("h1").await.unwrap();
    let now = section.now();
    let held = capacity_ledger::reserve(section.conn(), "h1", 4, now + Duration::hours(1), now)
        .await
        .unwrap();
    assert_eq!(held.status, ReservationStatus::Held);
    assert_eq!(capacity_ledger::available_spots(section.conn(), "h1").await.unwrap(), 6);

    let committed = capacity_ledger::commit(section.conn(), &held.reservation_id, now)
        .await
        .unwrap();
    assert_eq!(committed.status, ReservationStatus::Committed);
    assert_eq!(committed.committed_units, 4);

    // Committing again changes nothing.
    capacity_ledger::commit(section.conn(), &held.reservation_id, now)
        .await
        .unwrap();
    section.commit().await.unwrap();

    let hackathon = env.load_hackathon("h1").await;
    assert_eq!(hackathon.confirmed_participants, 4);
    assert_eq!(hackathon.reserved_units, 0);
    assert_eq!(hackathon.available_spots(), 6);
}

#[tokio::test]
async fn reserve_beyond_capacity_changes_nothing() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 3)).await;

    let mut section = env.engine.enter("h1").await.unwrap();
    let now = section.now();
    capacity_ledger::reserve(section.conn(), "h1", 2, now + Duration::hours(1), now)
        .await
        .unwrap();
    let err = capacity_ledger::reserve(section.conn(), "h1", 2, now + Duration::hours(1), now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ArbitrationError::CapacityExceeded {
            requested: 2,
            available: 1
        }
    ));
    section.commit().await.unwrap();

    let hackathon = env.load_hackathon("h1").await;
    assert_eq!(hackathon.reserved_units, 2);
    assert_eq!(hackathon.confirmed_participants, 0);
}

#[tokio::test]
async fn reserve_rejects_empty_and_already_lapsed_requests() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 3)).await;

    let mut section = env.engine.enter("h1").await.unwrap();
    let now = section.now();
    let err = capacity_ledger::reserve(section.conn(), "h1", 0, now + Duration::hours(1), now)
        .await
        .unwrap_err();
    assert!(matches!(err, ArbitrationError::Validation(_)));

    let err = capacity_ledger::reserve(section.conn(), "h1", 1, now - Duration::seconds(1), now)
        .await
        .unwrap_err();
    assert!(matches!(err, ArbitrationError::WindowClosed));
}

#[tokio::test]
async fn reservation_is_live_through_its_ttl_instant() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 3)).await;

    let mut section = env.engine.enter("h1").await.unwrap();
    let now = section.now();
    let held = capacity_ledger::reserve(section.conn(), "h1", 2, now, now)
        .await
        .unwrap();
    assert!(held.is_live(now));
    assert!(!held.is_live(now + Duration::seconds(1)));
    section.commit().await.unwrap();

    assert_eq!(env.engine.sweep("h1").await.unwrap().reservations_expired, 0);
    env.clock.advance(Duration::seconds(1));
    assert_eq!(env.engine.sweep("h1").await.unwrap().reservations_expired, 1);
    assert_eq!(env.load_hackathon("h1").await.available_spots(), 3);
}

#[tokio::test]
async fn released_reservation_cannot_be_committed() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 5)).await;

    let mut section = env.engine.enter("h1").await.unwrap();
    let now = section.now();
    let held = capacity_ledger::reserve(section.conn(), "h1", 3, now + Duration::hours(1), now)
        .await
        .unwrap();
    capacity_ledger::commit_units(section.conn(), &held.reservation_id, 1, now)
        .await
        .unwrap();

    let freed = capacity_ledger::release(section.conn(), &held.reservation_id, now)
        .await
        .unwrap();
    assert_eq!(freed, 2);
    let err = capacity_ledger::commit(section.conn(), &held.reservation_id, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ArbitrationError::Conflict(_)));
    section.commit().await.unwrap();

    let hackathon = env.load_hackathon("h1").await;
    assert_eq!(hackathon.confirmed_participants, 1);
    assert_eq!(hackathon.reserved_units, 0);
}

#[tokio::test]
async fn entering_a_section_sweeps_lapsed_reservations() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 5)).await;

    let mut section = env.engine.enter("h1").await.unwrap();
    let now = section.now();
    let held = capacity_ledger::reserve(section.conn(), "h1", 2, now + Duration::hours(1), now)
        .await
        .unwrap();
    section.commit().await.unwrap();
    assert_eq!(env.load_hackathon("h1").await.available_spots(), 3);

    env.clock.set(t0() + Duration::hours(2));
    let report = env.engine.sweep("h1").await.unwrap();
    assert_eq!(report.reservations_expired, 1);

    let expired = env.reservation(&held.reservation_id).await;
    assert_eq!(expired.status, ReservationStatus::Expired);
    assert_eq!(expired.settled_at, Some(t0() + Duration::hours(2)));
    assert_eq!(env.load_hackathon("h1").await.available_spots(), 5);
}

#[tokio::test]
async fn dropped_section_rolls_back() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 5)).await;

    {
        let mut section = env.engine.enter("h1").await.unwrap();
        let now = section.now();
        capacity_ledger::reserve(section.conn(), "h1", 5, now + Duration::hours(1), now)
            .await
            .unwrap();
    }

    assert_eq!(env.load_hackathon("h1").await.available_spots(), 5);
}
