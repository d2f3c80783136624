use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::error::ArbitrationResult;
use crate::models::{MembershipRow, TeamRow, TeamStatus};
use crate::services::team_service::{self, InviteRequest, JoinRequest, NewTeam, TeamDetail};
use crate::services::ArbitrationEngine;
use crate::web::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize, Default)]
pub struct TeamListQuery {
    pub status: Option<TeamStatus>,
}

pub async fn list_handler(
    Extension(_auth_user): Extension<AuthenticatedUser>,
    Path(hackathon_id): Path<String>,
    Query(query): Query<TeamListQuery>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<Vec<TeamRow>>> {
    let teams = team_service::list_by_hackathon(&engine, &hackathon_id, query.status).await?;
    Ok(Json(teams))
}

pub async fn create_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(engine): State<ArbitrationEngine>,
    Json(body): Json<NewTeam>,
) -> ArbitrationResult<(StatusCode, Json<TeamRow>)> {
    let team = team_service::create_team(&engine, &auth_user.id, body).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn mine_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<Vec<TeamRow>>> {
    Ok(Json(team_service::my_teams(&engine, &auth_user.id).await?))
}

pub async fn detail_handler(
    Extension(_auth_user): Extension<AuthenticatedUser>,
    Path(team_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<TeamDetail>> {
    Ok(Json(team_service::get_team(&engine, &team_id).await?))
}

pub async fn join_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(team_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
    body: Option<Json<JoinRequest>>,
) -> ArbitrationResult<(StatusCode, Json<MembershipRow>)> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let membership = team_service::request_join(&engine, &auth_user.id, &team_id, request).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

pub async fn invite_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(team_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
    Json(body): Json<InviteRequest>,
) -> ArbitrationResult<(StatusCode, Json<MembershipRow>)> {
    let membership = team_service::invite_user(&engine, &auth_user.id, &team_id, body).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

pub async fn requests_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(team_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<Vec<MembershipRow>>> {
    let pending = team_service::pending_requests(&engine, &auth_user.id, &team_id).await?;
    Ok(Json(pending))
}
