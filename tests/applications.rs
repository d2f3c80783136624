mod common;

use chrono::Duration;

use common::{t0, HackathonSeed, TestEnv, ORGANIZER};
use hackmate::models::{
    ApplicationStatus, ApplicationType, PaymentStatus, RegistrationType, ReservationStatus,
};
use hackmate::services::application_service::{self, PaymentConfirmation, SubmitApplication};
use hackmate::services::hackathon_service;
use hackmate::ArbitrationError;

fn payment(payment_ref: &str, amount_cents: i64) -> PaymentConfirmation {
    PaymentConfirmation {
        payment_ref: payment_ref.to_string(),
        amount_cents,
    }
}

#[tokio::test]
async fn free_individual_is_confirmed_immediately() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 10)).await;

    let app = application_service::submit_application(
        &env.engine,
        "alice",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();
    assert_eq!(app.status, ApplicationStatus::Confirmed);
    assert_eq!(app.payment_status, PaymentStatus::None);

    let hackathon = env.load_hackathon("h1").await;
    assert_eq!(hackathon.confirmed_participants, 1);
    assert_eq!(hackathon.reserved_units, 0);

    let refetched = application_service::get_application(&env.engine, "alice", &app.application_id)
        .await
        .unwrap();
    assert_eq!(refetched, app);
}

#[tokio::test]
async fn full_hackathon_rejects_without_state_change() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 10)).await;
    for i in 0..10 {
        application_service::submit_application(
            &env.engine,
            &format!("user-{i}"),
            "h1",
            SubmitApplication::individual(),
        )
        .await
        .unwrap();
    }

    let err = application_service::submit_application(
        &env.engine,
        "late",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ArbitrationError::CapacityExceeded {
            requested: 1,
            available: 0
        }
    ));

    let hackathon = env.load_hackathon("h1").await;
    assert_eq!(hackathon.confirmed_participants, 10);
    assert!(application_service::list_mine(&env.engine, "late")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn team_leader_needs_room_for_the_whole_team() {
    let env = TestEnv::new().await;
    env.hackathon(
        HackathonSeed::free("h1", 3)
            .teams(4, 6)
            .only(RegistrationType::Team),
    )
    .await;

    let err = application_service::submit_application(
        &env.engine,
        "lead",
        "h1",
        SubmitApplication::team_leader(4),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::CapacityExceeded { requested: 4, .. }));

    let hackathon = env.load_hackathon("h1").await;
    assert_eq!(hackathon.reserved_units, 0);
    assert_eq!(hackathon.available_spots(), 3);
}

#[tokio::test]
async fn submission_preconditions_are_checked() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::free("h1", 10).only(RegistrationType::Individual))
        .await;

    let err = application_service::submit_application(
        &env.engine,
        "lead",
        "h1",
        SubmitApplication::team_leader(2),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::Validation(_)));

    let err = application_service::submit_application(
        &env.engine,
        ORGANIZER,
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::OrganizerRestriction));

    application_service::submit_application(&env.engine, "bob", "h1", SubmitApplication::individual())
        .await
        .unwrap();
    let err = application_service::submit_application(
        &env.engine,
        "bob",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::AlreadyRegistered));

    env.clock.set(t0() + Duration::days(30));
    let err = application_service::submit_application(
        &env.engine,
        "carol",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::WindowClosed));

    let err = application_service::submit_application(
        &env.engine,
        "carol",
        "missing",
        SubmitApplication::individual(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::NotFound("hackathon")));
}

#[tokio::test]
async fn registration_end_is_inside_the_window() {
    let env = TestEnv::new().await;
    let hackathon = env.hackathon(HackathonSeed::paid("h1", 5, 1000)).await;
    env.hackathon(HackathonSeed::free("h2", 5)).await;
    env.clock.set(hackathon.registration_end);

    let paid = application_service::submit_application(
        &env.engine,
        "alice",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();
    assert_eq!(paid.status, ApplicationStatus::PaymentPending);
    let free = application_service::submit_application(
        &env.engine,
        "alice",
        "h2",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();
    assert_eq!(free.status, ApplicationStatus::Confirmed);

    env.clock.advance(Duration::seconds(1));
    let err = application_service::submit_application(
        &env.engine,
        "bob",
        "h2",
        SubmitApplication::individual(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::WindowClosed));

    env.engine.sweep("h1").await.unwrap();
    let lapsed = application_service::get_application(&env.engine, "alice", &paid.application_id)
        .await
        .unwrap();
    assert_eq!(lapsed.status, ApplicationStatus::Expired);
}

#[tokio::test]
async fn paid_individual_confirms_once_per_payment_ref() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::paid("h1", 5, 2500)).await;

    let app = application_service::submit_application(
        &env.engine,
        "alice",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();
    assert_eq!(app.status, ApplicationStatus::PaymentPending);
    assert_eq!(env.load_hackathon("h1").await.reserved_units, 1);

    let err = application_service::confirm_payment(
        &env.engine,
        "alice",
        &app.application_id,
        payment("pay-1", 1000),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::PaymentRequired(_)));

    let first = application_service::confirm_payment(
        &env.engine,
        "alice",
        &app.application_id,
        payment("pay-1", 2500),
    )
    .await
    .unwrap();
    assert_eq!(first.status, ApplicationStatus::Confirmed);
    assert_eq!(first.payment_status, PaymentStatus::Completed);

    let again = application_service::confirm_payment(
        &env.engine,
        "alice",
        &app.application_id,
        payment("pay-1", 2500),
    )
    .await
    .unwrap();
    assert_eq!(again.status, ApplicationStatus::Confirmed);
    assert_eq!(again.updated_at, first.updated_at);

    let hackathon = env.load_hackathon("h1").await;
    assert_eq!(hackathon.confirmed_participants, 1);
    assert_eq!(hackathon.reserved_units, 0);

    let err = application_service::confirm_payment(
        &env.engine,
        "alice",
        &app.application_id,
        payment("pay-2", 2500),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::Conflict(_)));
}

#[tokio::test]
async fn unpaid_application_expires_after_payment_window() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::paid("h1", 1, 2500)).await;

    let app = application_service::submit_application(
        &env.engine,
        "alice",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();
    let err = application_service::submit_application(
        &env.engine,
        "bob",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::CapacityExceeded { .. }));

    env.clock.advance(env.engine.settings().payment_window + Duration::minutes(1));
    let bob = application_service::submit_application(
        &env.engine,
        "bob",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();
    assert_eq!(bob.status, ApplicationStatus::PaymentPending);

    let expired = application_service::get_application(&env.engine, "alice", &app.application_id)
        .await
        .unwrap();
    assert_eq!(expired.status, ApplicationStatus::Expired);
    let reservation = env
        .reservation(app.reservation_id.as_deref().unwrap())
        .await;
    assert_eq!(reservation.status, ReservationStatus::Expired);

    let err = application_service::confirm_payment(
        &env.engine,
        "alice",
        &app.application_id,
        payment("late-pay", 2500),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ArbitrationError::Conflict(_)));
}

#[tokio::test]
async fn applicant_or_organizer_can_expire() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::paid("h1", 5, 1000)).await;

    let app = application_service::submit_application(
        &env.engine,
        "alice",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();

    let err = application_service::expire(&env.engine, "mallory", &app.application_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ArbitrationError::Authorization(_)));

    let expired = application_service::expire(&env.engine, ORGANIZER, &app.application_id)
        .await
        .unwrap();
    assert_eq!(expired.status, ApplicationStatus::Expired);
    assert_eq!(env.load_hackathon("h1").await.available_spots(), 5);

    // A fresh application is allowed once the old one no longer holds a seat.
    let again = application_service::submit_application(
        &env.engine,
        "alice",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();
    assert_eq!(again.application_type, ApplicationType::Individual);
}

#[tokio::test]
async fn organizer_rejects_unconfirmed_applications() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::paid("h1", 5, 1000)).await;

    let alice = application_service::submit_application(
        &env.engine,
        "alice",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();
    let bob = application_service::submit_application(
        &env.engine,
        "bob",
        "h1",
        SubmitApplication::individual(),
    )
    .await
    .unwrap();
    application_service::confirm_payment(&env.engine, "bob", &bob.application_id, payment("p-bob", 1000))
        .await
        .unwrap();
    assert_eq!(env.load_hackathon("h1").await.available_spots(), 3);

    let err = application_service::reject_application(&env.engine, "alice", &alice.application_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ArbitrationError::Authorization(_)));

    let rejected = application_service::reject_application(&env.engine, ORGANIZER, &alice.application_id)
        .await
        .unwrap();
    assert_eq!(rejected.status, ApplicationStatus::Rejected);
    assert_eq!(
        env.reservation(alice.reservation_id.as_deref().unwrap()).await.status,
        ReservationStatus::Released
    );
    assert_eq!(env.load_hackathon("h1").await.available_spots(), 4);

    let err = application_service::reject_application(&env.engine, ORGANIZER, &bob.application_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ArbitrationError::Conflict(_)));
    let err = application_service::reject_application(&env.engine, ORGANIZER, &alice.application_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ArbitrationError::Conflict(_)));

    let stats = application_service::application_stats(&env.engine, ORGANIZER, "h1")
        .await
        .unwrap();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.confirmed, 1);

    application_service::submit_application(&env.engine, "alice", "h1", SubmitApplication::individual())
        .await
        .unwrap();
}

#[tokio::test]
async fn organizer_sees_stats() {
    let env = TestEnv::new().await;
    env.hackathon(HackathonSeed::paid("h1", 5, 1000)).await;
    for user in ["a", "b", "c"] {
        application_service::submit_application(&env.engine, user, "h1", SubmitApplication::individual())
            .await
            .unwrap();
    }
    let mine = application_service::list_mine(&env.engine, "a").await.unwrap();
    application_service::confirm_payment(&env.engine, "a", &mine[0].application_id, payment("p-a", 1000))
        .await
        .unwrap();

    let err = application_service::application_stats(&env.engine, "a", "h1")
        .await
        .unwrap_err();
    assert!(matches!(err, ArbitrationError::Authorization(_)));

    let stats = application_service::application_stats(&env.engine, ORGANIZER, "h1")
        .await
        .unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.confirmed, 1);
    assert_eq!(stats.payment_pending, 2);

    let listed = application_service::list_for_hackathon(&env.engine, ORGANIZER, "h1")
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);

    assert_eq!(
        hackathon_service::available_spots(&env.engine, "h1").await.unwrap(),
        2
    );
    let view = hackathon_service::get_hackathon(&env.engine, "h1").await.unwrap();
    assert_eq!(view.available_spots, 2);
    assert!(view.registration_open);
}
