use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::error::ArbitrationResult;
use crate::models::MembershipRow;
use crate::services::team_service::{self, InviteeResponse, LeaderDecision};
use crate::services::ArbitrationEngine;
use crate::web::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub action: LeaderDecision,
}

#[derive(Debug, Deserialize)]
pub struct ResponseBody {
    pub action: InviteeResponse,
}

pub async fn mine_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<Vec<MembershipRow>>> {
    Ok(Json(team_service::my_memberships(&engine, &auth_user.id).await?))
}

pub async fn decision_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(membership_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
    Json(body): Json<DecisionBody>,
) -> ArbitrationResult<Json<MembershipRow>> {
    let membership =
        team_service::approve_join_request(&engine, &auth_user.id, &membership_id, body.action)
            .await?;
    Ok(Json(membership))
}

pub async fn response_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(membership_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
    Json(body): Json<ResponseBody>,
) -> ArbitrationResult<Json<MembershipRow>> {
    let membership =
        team_service::respond_to_invitation(&engine, &auth_user.id, &membership_id, body.action)
            .await?;
    Ok(Json(membership))
}

pub async fn leave_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(membership_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<MembershipRow>> {
    Ok(Json(team_service::leave(&engine, &auth_user.id, &membership_id).await?))
}

pub async fn remove_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(membership_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<MembershipRow>> {
    let membership = team_service::remove_member(&engine, &auth_user.id, &membership_id).await?;
    Ok(Json(membership))
}
