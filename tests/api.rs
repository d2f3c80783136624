mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{t0, TestEnv};
use hackmate::web;

fn token_for(user_id: &str) -> String {
    let payload = json!({ "sub": user_id, "email": format!("{user_id}@example.com") });
    format!(
        "eyJhbGciOiJub25lIn0.{}.sig",
        general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

async fn call(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("cookie", format!("access_token={}", token_for(user)));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let env = TestEnv::new().await;
    let app = web::router(env.engine.clone());

    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");

    let (status, body) = call(&app, "GET", "/hackathons", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn registration_flow_over_http() {
    let env = TestEnv::new().await;
    let app = web::router(env.engine.clone());

    let (status, hackathon) = call(
        &app,
        "POST",
        "/hackathons",
        Some("org"),
        Some(json!({
            "title": "Rust Weekend",
            "max_participants": 2,
            "min_team_size": 2,
            "max_team_size": 3,
            "registration_type": "both",
            "registration_start": t0() - Duration::days(1),
            "registration_end": t0() + Duration::days(5),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let hackathon_id = hackathon["hackathon_id"].as_str().unwrap().to_string();
    assert_eq!(hackathon["is_free"], true);

    let submit = format!("/hackathons/{hackathon_id}/applications");
    let (status, app_body) = call(
        &app,
        "POST",
        &submit,
        Some("alice"),
        Some(json!({ "application_type": "individual" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app_body["status"], "confirmed");

    let (status, body) = call(
        &app,
        "POST",
        &submit,
        Some("alice"),
        Some(json!({ "application_type": "individual" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_registered");

    let (status, body) = call(
        &app,
        "POST",
        &submit,
        Some("org"),
        Some(json!({ "application_type": "individual" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "organizer_restriction");

    let (status, body) = call(
        &app,
        "POST",
        &submit,
        Some("bob"),
        Some(json!({ "application_type": "team_leader", "preferred_team_size": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "capacity_exceeded");

    let (status, view) = call(&app, "GET", &format!("/hackathons/{hackathon_id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["available_spots"], 1);
    assert_eq!(view["confirmed_participants"], 1);

    let (status, stats) = call(
        &app,
        "GET",
        &format!("/hackathons/{hackathon_id}/applications/stats"),
        Some("org"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["confirmed"], 1);

    let (status, _) = call(
        &app,
        "GET",
        &format!("/hackathons/{hackathon_id}/applications/stats"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, mine) = call(&app, "GET", "/applications/mine", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, "GET", "/applications/nope", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_flow_over_http() {
    let env = TestEnv::new().await;
    let app = web::router(env.engine.clone());

    let (_, hackathon) = call(
        &app,
        "POST",
        "/hackathons",
        Some("org"),
        Some(json!({
            "title": "Team Jam",
            "max_participants": 10,
            "min_team_size": 2,
            "max_team_size": 2,
            "registration_type": "team",
            "registration_start": t0() - Duration::days(1),
            "registration_end": t0() + Duration::days(5),
        })),
    )
    .await;
    let hackathon_id = hackathon["hackathon_id"].as_str().unwrap().to_string();

    let (status, lead_app) = call(
        &app,
        "POST",
        &format!("/hackathons/{hackathon_id}/applications"),
        Some("lead"),
        Some(json!({
            "application_type": "team_leader",
            "preferred_team_size": 2,
            "team_name": "Borrow Checkers",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(lead_app["status"], "team_pending");

    let (_, teams) = call(
        &app,
        "GET",
        &format!("/hackathons/{hackathon_id}/teams?status=looking"),
        Some("bob"),
        None,
    )
    .await;
    let team = &teams.as_array().unwrap()[0];
    assert_eq!(team["name"], "Borrow Checkers");
    let team_id = team["team_id"].as_str().unwrap().to_string();

    // Bob is known by email once he has made any authenticated call.
    let (status, invitation) = call(
        &app,
        "POST",
        &format!("/teams/{team_id}/invitations"),
        Some("lead"),
        Some(json!({ "email": "bob@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let membership_id = invitation["membership_id"].as_str().unwrap().to_string();

    let (status, accepted) = call(
        &app,
        "POST",
        &format!("/memberships/{membership_id}/response"),
        Some("bob"),
        Some(json!({ "action": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "active");

    let (_, detail) = call(&app, "GET", &format!("/teams/{team_id}"), Some("bob"), None).await;
    assert_eq!(detail["status"], "full");
    assert_eq!(detail["open_seats"], 0);
    assert_eq!(detail["members"].as_array().unwrap().len(), 2);

    let lead_app_id = lead_app["application_id"].as_str().unwrap();
    let (_, refreshed) = call(&app, "GET", &format!("/applications/{lead_app_id}"), Some("lead"), None).await;
    assert_eq!(refreshed["status"], "confirmed");

    let (status, body) = call(
        &app,
        "POST",
        &format!("/teams/{team_id}/join"),
        Some("carol"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "capacity_exceeded");

    let (status, left) = call(
        &app,
        "POST",
        &format!("/memberships/{membership_id}/leave"),
        Some("bob"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(left["status"], "left");
}

#[tokio::test]
async fn leader_and_organizer_decisions_over_http() {
    let env = TestEnv::new().await;
    let app = web::router(env.engine.clone());

    let (_, hackathon) = call(
        &app,
        "POST",
        "/hackathons",
        Some("org"),
        Some(json!({
            "title": "Ferris Cup",
            "max_participants": 10,
            "min_team_size": 2,
            "max_team_size": 3,
            "registration_type": "team",
            "registration_start": t0() - Duration::days(1),
            "registration_end": t0() + Duration::days(5),
        })),
    )
    .await;
    let hackathon_id = hackathon["hackathon_id"].as_str().unwrap().to_string();

    let (_, lead_app) = call(
        &app,
        "POST",
        &format!("/hackathons/{hackathon_id}/applications"),
        Some("lead"),
        Some(json!({ "application_type": "team_leader", "preferred_team_size": 3 })),
    )
    .await;
    let lead_app_id = lead_app["application_id"].as_str().unwrap().to_string();
    let (_, teams) = call(&app, "GET", "/teams/mine", Some("lead"), None).await;
    let team_id = teams[0]["team_id"].as_str().unwrap().to_string();

    let (status, request) = call(&app, "POST", &format!("/teams/{team_id}/join"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let membership_id = request["membership_id"].as_str().unwrap().to_string();
    let (_, approved) = call(
        &app,
        "POST",
        &format!("/memberships/{membership_id}/decision"),
        Some("lead"),
        Some(json!({ "action": "approve" })),
    )
    .await;
    assert_eq!(approved["status"], "active");

    let remove = format!("/memberships/{membership_id}/remove");
    let (status, body) = call(&app, "POST", &remove, Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "authorization_error");
    let (status, removed) = call(&app, "POST", &remove, Some("lead"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["status"], "left");

    let reject = format!("/applications/{lead_app_id}/reject");
    let (status, _) = call(&app, "POST", &reject, Some("lead"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, rejected) = call(&app, "POST", &reject, Some("org"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");

    let (_, detail) = call(&app, "GET", &format!("/teams/{team_id}"), Some("org"), None).await;
    assert_eq!(detail["status"], "inactive");

    let (_, stats) = call(
        &app,
        "GET",
        &format!("/hackathons/{hackathon_id}/applications/stats"),
        Some("org"),
        None,
    )
    .await;
    assert_eq!(stats["rejected"], 1);
}
